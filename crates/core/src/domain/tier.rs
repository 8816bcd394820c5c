use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::customer::CustomerBehaviorProfile;

/// Behavioral tier driving the discount policy. Tiers are derived, never
/// stored: every request reclassifies from the current behavior profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    VipPlatinum,
    VipGold,
    RegularLoyal,
    RegularActive,
    BudgetConscious,
    NewCustomer,
    AtRisk,
}

impl Tier {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::VipPlatinum => "VIP Platinum",
            Self::VipGold => "VIP Gold",
            Self::RegularLoyal => "Regular Loyal",
            Self::RegularActive => "Regular Active",
            Self::BudgetConscious => "Budget Conscious",
            Self::NewCustomer => "New Customer",
            Self::AtRisk => "At Risk",
        }
    }

    /// Discount ceiling before per-customer adjustments.
    pub fn base_max_discount_pct(&self) -> u8 {
        match self {
            Self::VipPlatinum => 25,
            Self::VipGold => 20,
            Self::RegularLoyal => 15,
            Self::RegularActive => 10,
            Self::BudgetConscious => 8,
            Self::NewCustomer => 12,
            Self::AtRisk => 20,
        }
    }

    pub fn min_spent_threshold(&self) -> Decimal {
        match self {
            Self::VipPlatinum => Decimal::from(2000),
            Self::VipGold => Decimal::from(1000),
            Self::RegularLoyal => Decimal::from(500),
            Self::RegularActive => Decimal::from(200),
            _ => Decimal::ZERO,
        }
    }

    pub fn min_orders_threshold(&self) -> u32 {
        match self {
            Self::VipPlatinum => 50,
            Self::VipGold => 25,
            Self::RegularLoyal => 10,
            Self::RegularActive => 5,
            _ => 0,
        }
    }

    pub fn max_days_since_last_order(&self) -> i64 {
        match self {
            Self::VipPlatinum => 30,
            Self::VipGold => 60,
            Self::RegularLoyal => 90,
            Self::RegularActive => 120,
            Self::NewCustomer => 30,
            Self::BudgetConscious | Self::AtRisk => 365,
        }
    }

    /// How many negotiation attempts this tier is allowed per calendar month.
    pub fn monthly_attempt_cap(&self) -> u32 {
        match self {
            Self::VipPlatinum => 10,
            Self::VipGold => 8,
            Self::RegularLoyal => 6,
            Self::RegularActive => 5,
            Self::AtRisk => 8,
            Self::NewCustomer | Self::BudgetConscious => 3,
        }
    }

    pub fn strategy(&self) -> StrategyLabel {
        match self {
            Self::VipPlatinum => StrategyLabel::HighlyAccommodating,
            Self::VipGold => StrategyLabel::Accommodating,
            Self::RegularLoyal => StrategyLabel::Standard,
            Self::RegularActive => StrategyLabel::Cautious,
            Self::BudgetConscious => StrategyLabel::ValueFocused,
            Self::NewCustomer => StrategyLabel::AcquisitionFocused,
            Self::AtRisk => StrategyLabel::RetentionFocused,
        }
    }
}

/// Negotiation persona the text responder is instructed with, one per tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyLabel {
    HighlyAccommodating,
    Accommodating,
    Standard,
    Cautious,
    ValueFocused,
    AcquisitionFocused,
    RetentionFocused,
}

impl StrategyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighlyAccommodating => "HIGHLY_ACCOMMODATING",
            Self::Accommodating => "ACCOMMODATING",
            Self::Standard => "STANDARD",
            Self::Cautious => "CAUTIOUS",
            Self::ValueFocused => "VALUE_FOCUSED",
            Self::AcquisitionFocused => "ACQUISITION_FOCUSED",
            Self::RetentionFocused => "RETENTION_FOCUSED",
        }
    }
}

/// Spend/recency ladder evaluated top-down after the at-risk and new-customer
/// special cases. First satisfied tier wins.
const TIER_LADDER: &[Tier] =
    &[Tier::VipPlatinum, Tier::VipGold, Tier::RegularLoyal, Tier::RegularActive];

const AT_RISK_IDLE_DAYS: i64 = 120;
const NEW_CUSTOMER_TENURE_DAYS: i64 = 30;
const NEW_CUSTOMER_MAX_ORDERS: u32 = 3;

/// Classifies a customer into exactly one tier. Pure and total: any profile
/// yields a tier, with `BudgetConscious` as the terminal default. Absent
/// dates count as zero elapsed days.
pub fn classify_tier(profile: &CustomerBehaviorProfile, now: DateTime<Utc>) -> Tier {
    let days_since_last = days_since(profile.last_order_date, now);
    let days_since_first = days_since(profile.first_order_date, now);

    if profile.last_order_date.is_some()
        && days_since_last > AT_RISK_IDLE_DAYS
        && profile.total_orders > 0
    {
        return Tier::AtRisk;
    }

    if days_since_first < NEW_CUSTOMER_TENURE_DAYS || profile.total_orders < NEW_CUSTOMER_MAX_ORDERS
    {
        return Tier::NewCustomer;
    }

    for tier in TIER_LADDER {
        if profile.total_spent >= tier.min_spent_threshold()
            && profile.total_orders >= tier.min_orders_threshold()
            && days_since_last <= tier.max_days_since_last_order()
        {
            return *tier;
        }
    }

    Tier::BudgetConscious
}

pub(crate) fn days_since(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    date.map(|d| (now - d).num_days()).unwrap_or(0)
}
