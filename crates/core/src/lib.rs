pub mod config;
pub mod domain;
pub mod errors;
pub mod strategy;

pub use domain::capability::{
    calculate_capability, clamp_discount, NegotiationCapability, MAX_DISCOUNT_PCT,
    MIN_DISCOUNT_PCT,
};
pub use domain::coupon::{
    fallback_code, random_code, validate_coupon, Coupon, CouponIssueSpec, CouponRejection,
    CouponSource, CouponType, CouponUsageStats, CouponValidation,
};
pub use domain::customer::{CustomerBehaviorProfile, CustomerId, PriceSensitivity};
pub use domain::negotiation::{
    month_start, NegotiationOutcome, NegotiationProfile, BLOCK_WINDOW_DAYS,
    REJECTION_BLOCK_THRESHOLD,
};
pub use domain::tier::{classify_tier, StrategyLabel, Tier};
pub use errors::{ApplicationError, DomainError};
pub use strategy::{determine_strategy, is_seasonal_peak, StrategyDecision, StrategyInput};
