use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use haggle_core::domain::coupon::{
    validate_coupon, Coupon, CouponIssueSpec, CouponSource, CouponUsageStats, CouponValidation,
};
use haggle_core::domain::customer::CustomerId;
use haggle_core::domain::negotiation::{NegotiationOutcome, NegotiationProfile};

pub mod coupon;
pub mod memory;
pub mod negotiation;

pub use coupon::SqlCouponStore;
pub use memory::{InMemoryCouponStore, InMemoryNegotiationProfileStore};
pub use negotiation::SqlNegotiationProfileStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("coupon code `{code}` already exists")]
    DuplicateCouponCode { code: String },
    #[error("coupon `{code}` not found")]
    CouponNotFound { code: String },
    #[error("coupon `{code}` has no remaining uses")]
    UsageExhausted { code: String },
}

/// Storage for issued coupons. The coupon code is the primary key; issuance
/// is the only insert path and usage accounting is the only mutation apart
/// from the expiry sweep.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Generates a unique code for `spec` and persists the coupon. Retries
    /// on code collision before falling back to a timestamp-derived code;
    /// a collision on the fallback surfaces as `DuplicateCouponCode`.
    async fn issue(
        &self,
        spec: &CouponIssueSpec,
        now: DateTime<Utc>,
    ) -> Result<Coupon, RepositoryError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError>;

    /// Looks up `code` and runs the full validation chain against the order.
    async fn validate(
        &self,
        code: &str,
        customer_id: &CustomerId,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CouponValidation, RepositoryError> {
        let found = self.find_by_code(code).await?;
        Ok(validate_coupon(found, customer_id, order_total, now))
    }

    /// Consumes one use, atomically with respect to concurrent redemptions.
    /// Fails with `UsageExhausted` once `current_uses` reaches `max_uses`.
    async fn use_coupon(&self, code: &str) -> Result<(), RepositoryError>;

    /// Deactivates every active coupon whose expiry has passed. Returns the
    /// number of coupons swept.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Issuance/redemption aggregates for one source since `since`.
    async fn usage_stats(
        &self,
        source: CouponSource,
        since: DateTime<Utc>,
    ) -> Result<CouponUsageStats, RepositoryError>;
}

/// Storage for per-customer negotiation state. Profiles are created lazily
/// and never deleted.
#[async_trait]
pub trait NegotiationProfileStore: Send + Sync {
    /// Loads the profile, creating it on first contact. Applies and persists
    /// any due monthly reset so callers always see a current counter.
    async fn get_or_create(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<NegotiationProfile, RepositoryError>;

    async fn find(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<NegotiationProfile>, RepositoryError>;

    /// Applies one attempt and its outcome as a single atomic update:
    /// monthly reset if due, counter increments, run-length bookkeeping and
    /// any block transition. Returns the updated profile.
    async fn record_attempt(
        &self,
        customer_id: &CustomerId,
        outcome: NegotiationOutcome,
        now: DateTime<Utc>,
    ) -> Result<NegotiationProfile, RepositoryError>;

    async fn save(&self, profile: &NegotiationProfile) -> Result<(), RepositoryError>;
}

pub(crate) fn datetime_from_millis(
    millis: i64,
    column: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    use chrono::TimeZone;
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        RepositoryError::Decode(format!("column `{column}` holds out-of-range millis: {millis}"))
    })
}

pub(crate) fn decimal_from_text(raw: &str, column: &str) -> Result<Decimal, RepositoryError> {
    raw.parse().map_err(|_| {
        RepositoryError::Decode(format!("column `{column}` is not a decimal: `{raw}`"))
    })
}
