use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use haggle_agent::{NegotiationResponder, PromptContext};
use haggle_core::domain::coupon::CouponIssueSpec;
use haggle_core::{
    calculate_capability, classify_tier, determine_strategy, ApplicationError, NegotiationOutcome,
    StrategyInput,
};
use haggle_db::repositories::{CouponStore, NegotiationProfileStore, RepositoryError};

use crate::context::{has_recent_purchase, CustomerDirectory, NegotiationRequest};
use crate::response::{
    standard_alternatives, NegotiationResponse, BLOCKED_MESSAGE, MONTHLY_LIMIT_MESSAGE,
};

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Runs one negotiation request through the pipeline. Context failures
/// degrade to an apology without touching state; persistence failures after
/// eligibility has passed are surfaced to the caller.
pub struct NegotiationOrchestrator {
    customers: Arc<dyn CustomerDirectory>,
    profiles: Arc<dyn NegotiationProfileStore>,
    coupons: Arc<dyn CouponStore>,
    responder: NegotiationResponder,
    coupon_ttl: Duration,
}

impl NegotiationOrchestrator {
    pub fn new(
        customers: Arc<dyn CustomerDirectory>,
        profiles: Arc<dyn NegotiationProfileStore>,
        coupons: Arc<dyn CouponStore>,
        responder: NegotiationResponder,
    ) -> Self {
        Self { customers, profiles, coupons, responder, coupon_ttl: Duration::hours(48) }
    }

    pub fn with_coupon_ttl(mut self, coupon_ttl: Duration) -> Self {
        self.coupon_ttl = coupon_ttl;
        self
    }

    pub async fn negotiate(
        &self,
        request: &NegotiationRequest,
    ) -> Result<NegotiationResponse, ApplicationError> {
        self.negotiate_at(request, Utc::now()).await
    }

    pub async fn negotiate_at(
        &self,
        request: &NegotiationRequest,
        now: DateTime<Utc>,
    ) -> Result<NegotiationResponse, ApplicationError> {
        let correlation_id = Uuid::new_v4();

        // Build context. A directory failure is the customer's storefront
        // being degraded, not their fault; apologize and change nothing.
        let behavior = match self.customers.behavior_profile(&request.customer_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => haggle_core::CustomerBehaviorProfile::empty(request.customer_id.clone()),
            Err(error) => {
                let degraded = ApplicationError::Integration(error.to_string());
                tracing::error!(
                    event_name = "negotiation_context_failed",
                    correlation_id = %correlation_id,
                    customer_id = %request.customer_id,
                    error = %degraded,
                    "customer directory lookup failed"
                );
                return Ok(NegotiationResponse::apologetic(degraded.user_message()));
            }
        };
        let profile =
            self.profiles.get_or_create(&request.customer_id, now).await.map_err(persistence)?;

        // Eligibility.
        if profile.is_blocked(now) {
            tracing::info!(
                event_name = "negotiation_declined_blocked",
                correlation_id = %correlation_id,
                customer_id = %request.customer_id,
                block_until = ?profile.block_until_date,
                "declined: customer is blocked from negotiation"
            );
            return Ok(NegotiationResponse::declined(BLOCKED_MESSAGE, None));
        }

        let tier = classify_tier(&behavior, now);
        let capability = calculate_capability(tier, &behavior, profile.monthly_negotiation_count);
        if !capability.can_negotiate() {
            tracing::info!(
                event_name = "negotiation_declined_monthly_cap",
                correlation_id = %correlation_id,
                customer_id = %request.customer_id,
                tier = tier.display_name(),
                monthly_count = profile.monthly_negotiation_count,
                "declined: monthly attempt cap reached"
            );
            return Ok(NegotiationResponse::declined(
                MONTHLY_LIMIT_MESSAGE,
                Some(tier.display_name().to_string()),
            ));
        }

        // Strategy.
        let cart_value = request.cart_value();
        let decision = determine_strategy(&StrategyInput {
            capability: capability.clone(),
            cart_value,
            total_spent: behavior.total_spent,
            has_recent_purchase: has_recent_purchase(&behavior, now),
            attempts_this_month: profile.monthly_negotiation_count,
            now,
        });

        // Maybe issue a coupon. The coupon lands before the attempt is
        // recorded so a bookkeeping failure never strands a promised code.
        let coupon = if decision.should_make_offer {
            let mut spec = CouponIssueSpec::negotiation(
                request.customer_id.clone(),
                decision.final_discount_pct,
                decision.minimum_cart_value,
            );
            spec.ttl = self.coupon_ttl;
            Some(self.coupons.issue(&spec, now).await.map_err(persistence)?)
        } else {
            None
        };

        // Record the outcome.
        let outcome = if coupon.is_some() {
            NegotiationOutcome::OfferMade
        } else {
            NegotiationOutcome::NoOffer
        };
        let updated = self
            .profiles
            .record_attempt(&request.customer_id, outcome, now)
            .await
            .map_err(persistence)?;

        // Respond.
        let customer_name = if behavior.display_name.trim().is_empty() {
            request.customer_id.0.clone()
        } else {
            behavior.display_name.clone()
        };
        let prompt = PromptContext {
            customer_name,
            tier_display: tier.display_name().to_string(),
            strategy: decision.strategy,
            total_spent: behavior.total_spent,
            total_orders: behavior.total_orders,
            cart_value,
            cart_summary: request.cart_summary(),
            final_discount_pct: decision.final_discount_pct,
            attempts_this_month: updated.monthly_negotiation_count,
            minimum_order_value: decision.minimum_cart_value,
            should_make_offer: coupon.is_some(),
            coupon_code: coupon.as_ref().map(|coupon| coupon.coupon_code.clone()),
            offer_ttl_hours: self.coupon_ttl.num_hours(),
        };
        let message = self.responder.respond(&prompt, &request.message).await;

        let attempts_remaining =
            tier.monthly_attempt_cap().saturating_sub(updated.monthly_negotiation_count);
        let eligible_for_future = !updated.is_blocked(now) && attempts_remaining > 0;
        tracing::info!(
            event_name = "negotiation_completed",
            correlation_id = %correlation_id,
            customer_id = %request.customer_id,
            tier = tier.display_name(),
            offer_made = coupon.is_some(),
            discount_pct = decision.final_discount_pct,
            attempts_remaining,
            "negotiation attempt completed"
        );

        Ok(NegotiationResponse {
            message,
            offer_made: coupon.is_some(),
            coupon_code: coupon.as_ref().map(|coupon| coupon.coupon_code.clone()),
            discount_percentage: coupon.as_ref().map(|_| decision.final_discount_pct),
            expiration_time: coupon.as_ref().map(|coupon| coupon.expiration_date),
            customer_tier: Some(tier.display_name().to_string()),
            attempts_remaining,
            eligible_for_future,
            alternative_offers: if coupon.is_some() { Vec::new() } else { standard_alternatives() },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use haggle_agent::{NegotiationResponder, NullLlmClient};
    use haggle_core::domain::coupon::CouponSource;
    use haggle_core::{
        ApplicationError, CustomerBehaviorProfile, CustomerId, NegotiationOutcome,
        NegotiationProfile,
    };
    use haggle_db::repositories::{
        CouponStore, InMemoryCouponStore, InMemoryNegotiationProfileStore, NegotiationProfileStore,
        RepositoryError,
    };

    use super::NegotiationOrchestrator;
    use crate::context::{CartItem, CustomerDirectory, NegotiationRequest, StaticCustomerDirectory};
    use crate::response::{BLOCKED_MESSAGE, MONTHLY_LIMIT_MESSAGE};

    struct FailingDirectory;

    #[async_trait]
    impl CustomerDirectory for FailingDirectory {
        async fn behavior_profile(
            &self,
            _customer_id: &CustomerId,
        ) -> anyhow::Result<Option<CustomerBehaviorProfile>> {
            anyhow::bail!("crm is down")
        }
    }

    struct FailingProfileStore;

    #[async_trait]
    impl NegotiationProfileStore for FailingProfileStore {
        async fn get_or_create(
            &self,
            _customer_id: &CustomerId,
            _now: DateTime<Utc>,
        ) -> Result<NegotiationProfile, RepositoryError> {
            Err(RepositoryError::Decode("negotiation_profile row is corrupt".to_string()))
        }

        async fn find(
            &self,
            _customer_id: &CustomerId,
        ) -> Result<Option<NegotiationProfile>, RepositoryError> {
            Err(RepositoryError::Decode("negotiation_profile row is corrupt".to_string()))
        }

        async fn record_attempt(
            &self,
            _customer_id: &CustomerId,
            _outcome: NegotiationOutcome,
            _now: DateTime<Utc>,
        ) -> Result<NegotiationProfile, RepositoryError> {
            Err(RepositoryError::Decode("negotiation_profile row is corrupt".to_string()))
        }

        async fn save(&self, _profile: &NegotiationProfile) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("negotiation_profile row is corrupt".to_string()))
        }
    }

    fn off_peak() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap()
    }

    fn customer() -> CustomerId {
        CustomerId("cust-77".to_string())
    }

    fn platinum_behavior(now: DateTime<Utc>) -> CustomerBehaviorProfile {
        CustomerBehaviorProfile {
            customer_id: customer(),
            display_name: "dana".to_string(),
            total_orders: 60,
            total_spent: Decimal::from(2500),
            average_order_value: Decimal::new(4167, 2),
            first_order_date: Some(now - Duration::days(700)),
            last_order_date: Some(now - Duration::days(5)),
            price_sensitivity: haggle_core::PriceSensitivity::Medium,
        }
    }

    fn request(cart_total_dollars: u32) -> NegotiationRequest {
        NegotiationRequest {
            customer_id: customer(),
            message: "any chance of a better price?".to_string(),
            cart_items: vec![CartItem {
                product_name: "Mango Box".to_string(),
                quantity: 1,
                unit_price: Decimal::from(cart_total_dollars),
            }],
        }
    }

    fn wiring(
        directory: Arc<dyn CustomerDirectory>,
    ) -> (NegotiationOrchestrator, Arc<InMemoryCouponStore>, Arc<InMemoryNegotiationProfileStore>)
    {
        let coupons = Arc::new(InMemoryCouponStore::default());
        let profiles = Arc::new(InMemoryNegotiationProfileStore::default());
        let responder =
            NegotiationResponder::new(Arc::new(NullLlmClient), StdDuration::from_millis(50));
        let orchestrator = NegotiationOrchestrator::new(
            directory,
            profiles.clone(),
            coupons.clone(),
            responder,
        );
        (orchestrator, coupons, profiles)
    }

    #[tokio::test]
    async fn platinum_offer_flows_end_to_end() {
        let now = off_peak();
        let directory =
            Arc::new(StaticCustomerDirectory::with_profiles([platinum_behavior(now)]));
        let (orchestrator, coupons, profiles) = wiring(directory);

        let response =
            orchestrator.negotiate_at(&request(150), now).await.expect("negotiate");

        // Base 25, +2 large cart, +1 lifetime spend over $1000.
        assert!(response.offer_made);
        assert_eq!(response.discount_percentage, Some(28));
        assert_eq!(response.customer_tier.as_deref(), Some("VIP Platinum"));
        assert_eq!(response.attempts_remaining, 9);
        assert!(response.eligible_for_future);
        assert_eq!(response.expiration_time, Some(now + Duration::hours(48)));

        let code = response.coupon_code.expect("coupon code");
        assert!(code.starts_with("NEG"));
        assert!(response.message.contains(&code), "fallback copy must carry the issued code");

        let issued = coupons.find_by_code(&code).await.expect("find").expect("stored");
        assert_eq!(issued.discount_value, Decimal::from(28));
        assert_eq!(issued.minimum_order_value, Decimal::from(15));

        let profile = profiles.find(&customer()).await.expect("find").expect("profile");
        assert_eq!(profile.negotiation_attempts, 1);
        assert_eq!(profile.last_outcome, Some(NegotiationOutcome::OfferMade));
    }

    #[tokio::test]
    async fn unknown_customer_negotiates_as_new_customer() {
        let now = off_peak();
        let (orchestrator, _, _) = wiring(Arc::new(StaticCustomerDirectory::default()));

        let response = orchestrator.negotiate_at(&request(40), now).await.expect("negotiate");

        assert!(response.offer_made);
        assert_eq!(response.customer_tier.as_deref(), Some("New Customer"));
        assert_eq!(response.discount_percentage, Some(12));
        assert_eq!(response.attempts_remaining, 2);
    }

    #[tokio::test]
    async fn configured_ttl_drives_both_expiry_and_copy() {
        let now = off_peak();
        let directory = Arc::new(StaticCustomerDirectory::with_profiles([platinum_behavior(now)]));
        let (orchestrator, _, _) = wiring(directory);
        let orchestrator = orchestrator.with_coupon_ttl(Duration::hours(24));

        let response = orchestrator.negotiate_at(&request(150), now).await.expect("negotiate");

        assert!(response.offer_made);
        assert_eq!(response.expiration_time, Some(now + Duration::hours(24)));
        assert!(response.message.contains("expires in 24 hours"));
        assert!(!response.message.contains("48"));
    }

    #[tokio::test]
    async fn blocked_customer_is_declined_without_state_changes() {
        let now = off_peak();
        let directory =
            Arc::new(StaticCustomerDirectory::with_profiles([platinum_behavior(now)]));
        let (orchestrator, coupons, profiles) = wiring(directory);

        for _ in 0..5 {
            profiles
                .record_attempt(&customer(), NegotiationOutcome::Rejected, now)
                .await
                .expect("seed rejection");
        }

        let response = orchestrator.negotiate_at(&request(150), now).await.expect("negotiate");

        assert_eq!(response.message, BLOCKED_MESSAGE);
        assert!(!response.offer_made);
        assert!(!response.eligible_for_future);

        let profile = profiles.find(&customer()).await.expect("find").expect("profile");
        assert_eq!(profile.negotiation_attempts, 5, "the declined request is not recorded");
        let stats = coupons
            .usage_stats(CouponSource::AiNegotiation, now - Duration::days(1))
            .await
            .expect("stats");
        assert_eq!(stats.generated, 0);
    }

    #[tokio::test]
    async fn monthly_cap_declines_further_attempts() {
        let now = off_peak();
        let (orchestrator, coupons, profiles) =
            wiring(Arc::new(StaticCustomerDirectory::default()));

        // New-customer cap is 3 attempts per month.
        for _ in 0..3 {
            profiles
                .record_attempt(&customer(), NegotiationOutcome::OfferMade, now)
                .await
                .expect("seed attempt");
        }

        let response = orchestrator.negotiate_at(&request(40), now).await.expect("negotiate");

        assert_eq!(response.message, MONTHLY_LIMIT_MESSAGE);
        assert_eq!(response.customer_tier.as_deref(), Some("New Customer"));
        assert!(!response.offer_made);
        let stats = coupons
            .usage_stats(CouponSource::AiNegotiation, now - Duration::days(1))
            .await
            .expect("stats");
        assert_eq!(stats.generated, 0);
    }

    #[tokio::test]
    async fn cap_resets_open_the_next_month() {
        let april = off_peak();
        let may = Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap();
        let (orchestrator, _, profiles) = wiring(Arc::new(StaticCustomerDirectory::default()));

        for _ in 0..3 {
            profiles
                .record_attempt(&customer(), NegotiationOutcome::OfferMade, april)
                .await
                .expect("seed attempt");
        }
        let capped = orchestrator.negotiate_at(&request(40), april).await.expect("negotiate");
        assert_eq!(capped.message, MONTHLY_LIMIT_MESSAGE);

        let next_month = orchestrator.negotiate_at(&request(40), may).await.expect("negotiate");
        assert!(next_month.offer_made);
    }

    #[tokio::test]
    async fn directory_failure_degrades_to_an_apology() {
        let now = off_peak();
        let (orchestrator, coupons, profiles) = wiring(Arc::new(FailingDirectory));

        let response = orchestrator.negotiate_at(&request(150), now).await.expect("negotiate");

        assert!(!response.offer_made);
        assert!(response.customer_tier.is_none());
        assert!(response.eligible_for_future);
        let expected = ApplicationError::Integration("crm is down".to_string());
        assert_eq!(response.message, expected.user_message());
        assert!(!response.message.contains("crm"), "internals never reach the customer");

        assert!(profiles.find(&customer()).await.expect("find").is_none());
        let stats = coupons
            .usage_stats(CouponSource::AiNegotiation, now - Duration::days(1))
            .await
            .expect("stats");
        assert_eq!(stats.generated, 0);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_a_persistence_error() {
        let now = off_peak();
        let directory = Arc::new(StaticCustomerDirectory::with_profiles([platinum_behavior(now)]));
        let coupons = Arc::new(InMemoryCouponStore::default());
        let responder =
            NegotiationResponder::new(Arc::new(NullLlmClient), StdDuration::from_millis(50));
        let orchestrator = NegotiationOrchestrator::new(
            directory,
            Arc::new(FailingProfileStore),
            coupons,
            responder,
        );

        let error = orchestrator
            .negotiate_at(&request(150), now)
            .await
            .expect_err("store failure must not degrade silently");
        assert!(matches!(error, ApplicationError::Persistence(_)));
        assert!(!error.user_message().contains("row"), "internals never reach the customer");
    }
}
