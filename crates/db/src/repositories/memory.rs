use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use haggle_core::domain::coupon::{
    fallback_code, random_code, Coupon, CouponIssueSpec, CouponSource, CouponUsageStats,
};
use haggle_core::domain::customer::CustomerId;
use haggle_core::domain::negotiation::{NegotiationOutcome, NegotiationProfile};

use super::{CouponStore, NegotiationProfileStore, RepositoryError};
use crate::repositories::coupon::DEFAULT_CODE_RETRY_LIMIT;

#[derive(Default)]
pub struct InMemoryCouponStore {
    coupons: RwLock<HashMap<String, Coupon>>,
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn issue(
        &self,
        spec: &CouponIssueSpec,
        now: DateTime<Utc>,
    ) -> Result<Coupon, RepositoryError> {
        let prefix = spec.source.code_prefix();
        let mut coupons = self.coupons.write().await;
        for _ in 0..DEFAULT_CODE_RETRY_LIMIT {
            let code = {
                let mut rng = rand::thread_rng();
                random_code(prefix, &mut rng)
            };
            if coupons.contains_key(&code) {
                continue;
            }
            let coupon = spec.build(code.clone(), now);
            coupons.insert(code, coupon.clone());
            return Ok(coupon);
        }

        let code = fallback_code(prefix, now);
        if coupons.contains_key(&code) {
            return Err(RepositoryError::DuplicateCouponCode { code });
        }
        let coupon = spec.build(code.clone(), now);
        coupons.insert(code, coupon.clone());
        Ok(coupon)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let coupons = self.coupons.read().await;
        Ok(coupons.get(code).cloned())
    }

    async fn use_coupon(&self, code: &str) -> Result<(), RepositoryError> {
        let mut coupons = self.coupons.write().await;
        let Some(coupon) = coupons.get_mut(code) else {
            return Err(RepositoryError::CouponNotFound { code: code.to_string() });
        };
        if !coupon.is_active || coupon.current_uses >= coupon.max_uses {
            return Err(RepositoryError::UsageExhausted { code: code.to_string() });
        }
        coupon.current_uses += 1;
        Ok(())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut coupons = self.coupons.write().await;
        let mut swept = 0;
        for coupon in coupons.values_mut() {
            if coupon.is_active && coupon.expiration_date <= now {
                coupon.is_active = false;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn usage_stats(
        &self,
        source: CouponSource,
        since: DateTime<Utc>,
    ) -> Result<CouponUsageStats, RepositoryError> {
        let coupons = self.coupons.read().await;
        let mut stats =
            CouponUsageStats { generated: 0, used: 0, total_discount_granted: Decimal::ZERO };
        for coupon in coupons.values() {
            if coupon.source != source || coupon.created_at < since {
                continue;
            }
            stats.generated += 1;
            if coupon.current_uses > 0 {
                stats.used += 1;
                stats.total_discount_granted += coupon.discount_value;
            }
        }
        Ok(stats)
    }
}

#[derive(Default)]
pub struct InMemoryNegotiationProfileStore {
    profiles: RwLock<HashMap<String, NegotiationProfile>>,
}

#[async_trait]
impl NegotiationProfileStore for InMemoryNegotiationProfileStore {
    async fn get_or_create(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<NegotiationProfile, RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(customer_id.0.clone())
            .or_insert_with(|| NegotiationProfile::new(customer_id.clone(), now));
        profile.reset_monthly_count_if_needed(now);
        Ok(profile.clone())
    }

    async fn find(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<NegotiationProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&customer_id.0).cloned())
    }

    async fn record_attempt(
        &self,
        customer_id: &CustomerId,
        outcome: NegotiationOutcome,
        now: DateTime<Utc>,
    ) -> Result<NegotiationProfile, RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(customer_id.0.clone())
            .or_insert_with(|| NegotiationProfile::new(customer_id.clone(), now));
        profile.reset_monthly_count_if_needed(now);
        profile.increment_attempt(now);
        profile.record_outcome(outcome, now);
        Ok(profile.clone())
    }

    async fn save(&self, profile: &NegotiationProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.customer_id.0.clone(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use haggle_core::domain::coupon::{CouponIssueSpec, CouponSource};
    use haggle_core::domain::customer::CustomerId;
    use haggle_core::domain::negotiation::NegotiationOutcome;

    use crate::repositories::{
        CouponStore, InMemoryCouponStore, InMemoryNegotiationProfileStore, NegotiationProfileStore,
        RepositoryError,
    };

    fn customer() -> CustomerId {
        CustomerId("cust-42".to_string())
    }

    #[tokio::test]
    async fn issued_coupon_round_trips_and_validates() {
        let store = InMemoryCouponStore::default();
        let now = Utc::now();
        let spec = CouponIssueSpec::negotiation(customer(), 18, Decimal::from(25));

        let issued = store.issue(&spec, now).await.expect("issue coupon");
        assert!(issued.coupon_code.starts_with("NEG"));

        let found = store.find_by_code(&issued.coupon_code).await.expect("find coupon");
        assert_eq!(found, Some(issued.clone()));

        let validation = store
            .validate(&issued.coupon_code, &customer(), Decimal::from(80), now)
            .await
            .expect("validate coupon");
        assert!(validation.valid);
        assert_eq!(validation.discount_amount, Decimal::new(1440, 2));
    }

    #[tokio::test]
    async fn single_use_coupon_exhausts_after_one_redemption() {
        let store = InMemoryCouponStore::default();
        let now = Utc::now();
        let spec = CouponIssueSpec::negotiation(customer(), 10, Decimal::from(25));
        let issued = store.issue(&spec, now).await.expect("issue coupon");

        store.use_coupon(&issued.coupon_code).await.expect("first use");
        let second = store.use_coupon(&issued.coupon_code).await;
        assert!(matches!(second, Err(RepositoryError::UsageExhausted { .. })));
    }

    #[tokio::test]
    async fn retention_coupon_is_issued_with_win_back_terms() {
        let store = InMemoryCouponStore::default();
        let now = Utc::now();
        let spec = CouponIssueSpec::retention(customer(), 20);

        let issued = store.issue(&spec, now).await.expect("issue coupon");
        assert!(issued.coupon_code.starts_with("BACK"));
        assert_eq!(issued.source, CouponSource::LoyaltyReward);
        assert_eq!(issued.expiration_date, now + Duration::days(14));

        // $30 win-back minimum gates smaller carts.
        let too_small = store
            .validate(&issued.coupon_code, &customer(), Decimal::from(25), now)
            .await
            .expect("validate small order");
        assert!(!too_small.valid);
        let accepted = store
            .validate(&issued.coupon_code, &customer(), Decimal::from(60), now)
            .await
            .expect("validate good order");
        assert!(accepted.valid);
        assert_eq!(accepted.discount_amount, Decimal::from(12));
    }

    #[tokio::test]
    async fn expiry_sweep_deactivates_only_past_due_coupons() {
        let store = InMemoryCouponStore::default();
        let now = Utc::now();
        let stale = store
            .issue(&CouponIssueSpec::negotiation(customer(), 10, Decimal::from(25)), now)
            .await
            .expect("issue stale coupon");
        store
            .issue(
                &CouponIssueSpec::welcome(CustomerId("cust-new".to_string())),
                now,
            )
            .await
            .expect("issue fresh coupon");

        // 48h negotiation TTL has lapsed; the 30-day welcome TTL has not.
        let swept = store.deactivate_expired(now + Duration::days(3)).await.expect("sweep");
        assert_eq!(swept, 1);
        let stale = store.find_by_code(&stale.coupon_code).await.expect("find").expect("exists");
        assert!(!stale.is_active);
    }

    #[tokio::test]
    async fn usage_stats_are_scoped_to_source_and_window() {
        let store = InMemoryCouponStore::default();
        let now = Utc::now();
        let used = store
            .issue(&CouponIssueSpec::negotiation(customer(), 20, Decimal::from(25)), now)
            .await
            .expect("issue used coupon");
        store
            .issue(&CouponIssueSpec::negotiation(customer(), 12, Decimal::from(25)), now)
            .await
            .expect("issue unused coupon");
        store
            .issue(&CouponIssueSpec::welcome(CustomerId("cust-new".to_string())), now)
            .await
            .expect("issue other-source coupon");
        store.use_coupon(&used.coupon_code).await.expect("redeem");

        let stats = store
            .usage_stats(CouponSource::AiNegotiation, now - Duration::days(1))
            .await
            .expect("stats");
        assert_eq!(stats.generated, 2);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.total_discount_granted, Decimal::from(20));
        assert_eq!(stats.usage_rate(), 0.5);
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_within_a_month() {
        let store = InMemoryNegotiationProfileStore::default();
        let now = Utc::now();

        let first = store.get_or_create(&customer(), now).await.expect("create profile");
        assert_eq!(first.negotiation_attempts, 0);

        store
            .record_attempt(&customer(), NegotiationOutcome::OfferMade, now)
            .await
            .expect("record attempt");

        let second = store.get_or_create(&customer(), now).await.expect("reload profile");
        assert_eq!(second.negotiation_attempts, 1);
        assert_eq!(second.monthly_negotiation_count, 1);
    }

    #[tokio::test]
    async fn record_attempt_drives_the_block_state_machine() {
        let store = InMemoryNegotiationProfileStore::default();
        let now = Utc::now();

        for _ in 0..4 {
            let profile = store
                .record_attempt(&customer(), NegotiationOutcome::Rejected, now)
                .await
                .expect("record rejection");
            assert!(!profile.is_blocked(now));
        }
        let profile = store
            .record_attempt(&customer(), NegotiationOutcome::Rejected, now)
            .await
            .expect("record fifth rejection");
        assert!(profile.is_blocked(now));
        assert!(!profile.is_blocked(now + Duration::days(8)));
    }
}
