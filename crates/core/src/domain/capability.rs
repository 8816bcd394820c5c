use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::customer::{CustomerBehaviorProfile, PriceSensitivity};
use super::tier::{StrategyLabel, Tier};

pub const MIN_DISCOUNT_PCT: u8 = 5;
pub const MAX_DISCOUNT_PCT: u8 = 30;

const HIGH_AOV_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
const HIGH_AOV_BONUS: i16 = 2;
const HIGH_SENSITIVITY_PENALTY: i16 = 3;

/// Per-request negotiation ceiling for one customer: how deep the discount
/// may go and how many attempts remain this month. Ephemeral, recomputed on
/// every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationCapability {
    pub tier: Tier,
    pub adjusted_max_discount_pct: u8,
    pub attempts_remaining: u32,
    pub strategy: StrategyLabel,
}

impl NegotiationCapability {
    pub fn can_negotiate(&self) -> bool {
        self.attempts_remaining > 0
    }
}

/// Starts from the tier's base ceiling, applies the per-customer
/// adjustments in order, and clamps into `[MIN_DISCOUNT_PCT,
/// MAX_DISCOUNT_PCT]`. `monthly_negotiation_count` must come from a
/// profile that already had its monthly reset applied.
pub fn calculate_capability(
    tier: Tier,
    profile: &CustomerBehaviorProfile,
    monthly_negotiation_count: u32,
) -> NegotiationCapability {
    let mut adjusted = i16::from(tier.base_max_discount_pct());

    if profile.average_order_value > HIGH_AOV_THRESHOLD {
        adjusted += HIGH_AOV_BONUS;
    }
    if profile.price_sensitivity == PriceSensitivity::High {
        adjusted = (adjusted - HIGH_SENSITIVITY_PENALTY).max(i16::from(MIN_DISCOUNT_PCT));
    }

    NegotiationCapability {
        tier,
        adjusted_max_discount_pct: clamp_discount(adjusted),
        attempts_remaining: tier.monthly_attempt_cap().saturating_sub(monthly_negotiation_count),
        strategy: tier.strategy(),
    }
}

pub fn clamp_discount(pct: i16) -> u8 {
    pct.clamp(i16::from(MIN_DISCOUNT_PCT), i16::from(MAX_DISCOUNT_PCT)) as u8
}
