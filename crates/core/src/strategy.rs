use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::capability::{clamp_discount, NegotiationCapability, MIN_DISCOUNT_PCT};
use crate::domain::tier::{StrategyLabel, Tier};

/// Winter holidays and the summer peak. Offers tighten during these months.
pub const SEASONAL_PEAK_MONTHS: [u32; 4] = [12, 1, 6, 7];

const LARGE_CART_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
const HIGH_LIFETIME_SPEND_THRESHOLD: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
const REPEAT_ATTEMPT_GRACE: u32 = 2;

pub fn is_seasonal_peak(now: DateTime<Utc>) -> bool {
    SEASONAL_PEAK_MONTHS.contains(&now.month())
}

/// Request-scoped facts the strategy decision weighs on top of the
/// customer's standing capability.
#[derive(Clone, Debug)]
pub struct StrategyInput {
    pub capability: NegotiationCapability,
    pub cart_value: Decimal,
    pub total_spent: Decimal,
    pub has_recent_purchase: bool,
    pub attempts_this_month: u32,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub final_discount_pct: u8,
    pub strategy: StrategyLabel,
    pub should_make_offer: bool,
    pub minimum_cart_value: Decimal,
}

/// Adjusts the capability ceiling with request context, in order: large-cart
/// bonus, lifetime-value bonus, repeat-attempt penalty, seasonal-peak
/// penalty; then clamps. After the clamp the floor guarantees an offer for
/// any eligible request.
pub fn determine_strategy(input: &StrategyInput) -> StrategyDecision {
    let mut pct = i16::from(input.capability.adjusted_max_discount_pct);

    if input.cart_value > LARGE_CART_THRESHOLD {
        pct += 2;
    }
    if input.total_spent > HIGH_LIFETIME_SPEND_THRESHOLD {
        pct += 1;
    }
    if input.has_recent_purchase && input.attempts_this_month > REPEAT_ATTEMPT_GRACE {
        pct -= 2;
    }
    if is_seasonal_peak(input.now) {
        pct -= 1;
    }

    let final_discount_pct = clamp_discount(pct);
    StrategyDecision {
        final_discount_pct,
        strategy: input.capability.strategy,
        should_make_offer: final_discount_pct >= MIN_DISCOUNT_PCT,
        minimum_cart_value: if input.capability.tier == Tier::VipPlatinum {
            Decimal::from(15)
        } else {
            Decimal::from(25)
        },
    }
}
