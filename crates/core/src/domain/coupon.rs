use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::customer::CustomerId;

/// Alphabet for generated code suffixes: 36 uppercase alphanumerics.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_SUFFIX_LEN: usize = 6;

/// Modulus for the timestamp fallback code used after repeated collisions.
pub const FALLBACK_CODE_MODULUS: i64 = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    Percentage,
    FixedAmount,
    FreeShipping,
    Bogo,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
            Self::FreeShipping => "free_shipping",
            Self::Bogo => "bogo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "percentage" => Some(Self::Percentage),
            "fixed_amount" => Some(Self::FixedAmount),
            "free_shipping" => Some(Self::FreeShipping),
            "bogo" => Some(Self::Bogo),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponSource {
    AiNegotiation,
    ManualAdmin,
    EmailCampaign,
    LoyaltyReward,
    WelcomeBonus,
}

impl CouponSource {
    /// Human-recognizable code prefix per issuance channel.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            Self::AiNegotiation => "NEG",
            Self::ManualAdmin => "ADM",
            Self::EmailCampaign => "EML",
            Self::LoyaltyReward => "BACK",
            Self::WelcomeBonus => "WELCOME",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiNegotiation => "ai_negotiation",
            Self::ManualAdmin => "manual_admin",
            Self::EmailCampaign => "email_campaign",
            Self::LoyaltyReward => "loyalty_reward",
            Self::WelcomeBonus => "welcome_bonus",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ai_negotiation" => Some(Self::AiNegotiation),
            "manual_admin" => Some(Self::ManualAdmin),
            "email_campaign" => Some(Self::EmailCampaign),
            "loyalty_reward" => Some(Self::LoyaltyReward),
            "welcome_bonus" => Some(Self::WelcomeBonus),
            _ => None,
        }
    }
}

/// A redeemable discount instrument. The code is globally unique and
/// immutable once issued; only usage increments and expiry sweeps mutate a
/// coupon, and nothing in this engine deletes one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub coupon_code: String,
    pub coupon_type: CouponType,
    pub discount_value: Decimal,
    pub minimum_order_value: Decimal,
    pub customer_id: Option<CustomerId>,
    pub source: CouponSource,
    pub expiration_date: DateTime<Utc>,
    pub max_uses: u32,
    pub current_uses: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expiration_date && self.current_uses < self.max_uses
    }

    /// Monetary discount this coupon grants against `order_total`.
    /// Percentage amounts round half-up to currency precision; fixed amounts
    /// never exceed the order total; free shipping and BOGO are handled by
    /// the caller and price out at zero here.
    pub fn discount_amount(&self, order_total: Decimal) -> Decimal {
        match self.coupon_type {
            CouponType::Percentage => (order_total * self.discount_value / Decimal::from(100))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            CouponType::FixedAmount => self.discount_value.min(order_total),
            CouponType::FreeShipping | CouponType::Bogo => Decimal::ZERO,
        }
    }
}

/// Issuance parameters; the store turns this into a persisted [`Coupon`]
/// with a freshly generated unique code.
#[derive(Clone, Debug)]
pub struct CouponIssueSpec {
    pub customer_id: Option<CustomerId>,
    pub coupon_type: CouponType,
    pub discount_value: Decimal,
    pub minimum_order_value: Decimal,
    pub source: CouponSource,
    pub ttl: Duration,
    pub max_uses: u32,
}

impl CouponIssueSpec {
    /// Single-use percentage coupon from a negotiation offer, 48h urgency
    /// window.
    pub fn negotiation(
        customer_id: CustomerId,
        discount_pct: u8,
        minimum_order_value: Decimal,
    ) -> Self {
        Self {
            customer_id: Some(customer_id),
            coupon_type: CouponType::Percentage,
            discount_value: Decimal::from(discount_pct),
            minimum_order_value,
            source: CouponSource::AiNegotiation,
            ttl: Duration::hours(48),
            max_uses: 1,
        }
    }

    /// 15% first-purchase coupon, 30-day window, $25 minimum.
    pub fn welcome(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            coupon_type: CouponType::Percentage,
            discount_value: Decimal::from(15),
            minimum_order_value: Decimal::from(25),
            source: CouponSource::WelcomeBonus,
            ttl: Duration::days(30),
            max_uses: 1,
        }
    }

    /// Win-back coupon for at-risk customers; short 14-day window for
    /// urgency, $30 minimum.
    pub fn retention(customer_id: CustomerId, discount_pct: u8) -> Self {
        Self {
            customer_id: Some(customer_id),
            coupon_type: CouponType::Percentage,
            discount_value: Decimal::from(discount_pct),
            minimum_order_value: Decimal::from(30),
            source: CouponSource::LoyaltyReward,
            ttl: Duration::days(14),
            max_uses: 1,
        }
    }

    pub fn build(&self, coupon_code: String, now: DateTime<Utc>) -> Coupon {
        Coupon {
            coupon_code,
            coupon_type: self.coupon_type,
            discount_value: self.discount_value,
            minimum_order_value: self.minimum_order_value,
            customer_id: self.customer_id.clone(),
            source: self.source,
            expiration_date: now + self.ttl,
            max_uses: self.max_uses,
            current_uses: 0,
            is_active: true,
            created_at: now,
        }
    }
}

/// Prefix plus six random symbols from [`CODE_ALPHABET`].
pub fn random_code(prefix: &str, rng: &mut impl Rng) -> String {
    let mut code = String::with_capacity(prefix.len() + CODE_SUFFIX_LEN);
    code.push_str(prefix);
    for _ in 0..CODE_SUFFIX_LEN {
        let idx = rng.gen_range(0..CODE_ALPHABET.len());
        code.push(CODE_ALPHABET[idx] as char);
    }
    code
}

/// Last-resort code after repeated collisions: prefix plus the current epoch
/// millis modulo one million. Not rechecked for uniqueness by the caller;
/// the storage unique constraint is the only backstop on this path.
pub fn fallback_code(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}{}", now.timestamp_millis().rem_euclid(FALLBACK_CODE_MODULUS))
}

/// Why a coupon was refused, ordered by the validation short-circuit chain.
#[derive(Clone, Debug, PartialEq)]
pub enum CouponRejection {
    NotFound,
    ExpiredOrInactive,
    WrongCustomer,
    BelowMinimum { minimum: Decimal },
}

impl CouponRejection {
    pub fn reason(&self) -> String {
        match self {
            Self::NotFound => "coupon code not found".to_string(),
            Self::ExpiredOrInactive => "coupon is expired or inactive".to_string(),
            Self::WrongCustomer => "coupon is not valid for this customer".to_string(),
            Self::BelowMinimum { minimum } => {
                format!("minimum order amount of ${minimum} required")
            }
        }
    }
}

/// Result of validating a coupon code against an order. A rejection is a
/// normal structured answer, never an error.
#[derive(Clone, Debug, PartialEq)]
pub struct CouponValidation {
    pub valid: bool,
    pub coupon: Option<Coupon>,
    pub discount_amount: Decimal,
    pub rejection: Option<CouponRejection>,
}

impl CouponValidation {
    fn accepted(coupon: Coupon, discount_amount: Decimal) -> Self {
        Self { valid: true, coupon: Some(coupon), discount_amount, rejection: None }
    }

    fn refused(rejection: CouponRejection, coupon: Option<Coupon>) -> Self {
        Self { valid: false, coupon, discount_amount: Decimal::ZERO, rejection: Some(rejection) }
    }
}

/// Validation chain, first failing check wins: code exists, coupon still
/// valid, customer matches (a `None` owner is a public coupon), order meets
/// the minimum. All checks pass: compute the discount amount.
pub fn validate_coupon(
    found: Option<Coupon>,
    customer_id: &CustomerId,
    order_total: Decimal,
    now: DateTime<Utc>,
) -> CouponValidation {
    let Some(coupon) = found else {
        return CouponValidation::refused(CouponRejection::NotFound, None);
    };
    if !coupon.is_valid(now) {
        return CouponValidation::refused(CouponRejection::ExpiredOrInactive, Some(coupon));
    }
    if coupon.customer_id.as_ref().is_some_and(|owner| owner != customer_id) {
        return CouponValidation::refused(CouponRejection::WrongCustomer, Some(coupon));
    }
    if order_total < coupon.minimum_order_value {
        let minimum = coupon.minimum_order_value;
        return CouponValidation::refused(CouponRejection::BelowMinimum { minimum }, Some(coupon));
    }
    let discount_amount = coupon.discount_amount(order_total);
    CouponValidation::accepted(coupon, discount_amount)
}

/// Issuance/redemption aggregates for a coupon source over a date range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponUsageStats {
    pub generated: u64,
    pub used: u64,
    pub total_discount_granted: Decimal,
}

impl CouponUsageStats {
    pub fn usage_rate(&self) -> f64 {
        if self.generated == 0 {
            0.0
        } else {
            self.used as f64 / self.generated as f64
        }
    }
}
