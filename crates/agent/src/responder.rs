use std::sync::Arc;
use std::time::Duration;

use crate::llm::LlmClient;
use crate::prompt::PromptContext;

/// Turns a decided offer into customer-facing copy, with a hard wall-clock
/// bound on the language model. Responding never fails; the worst case is
/// the deterministic template.
pub struct NegotiationResponder {
    llm: Arc<dyn LlmClient>,
    reply_timeout: Duration,
}

impl NegotiationResponder {
    pub fn new(llm: Arc<dyn LlmClient>, reply_timeout: Duration) -> Self {
        Self { llm, reply_timeout }
    }

    pub async fn respond(&self, context: &PromptContext, customer_message: &str) -> String {
        let prompt =
            format!("{}\n\nCUSTOMER MESSAGE:\n{customer_message}", context.system_prompt());
        match tokio::time::timeout(self.reply_timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                tracing::warn!(
                    event_name = "llm_empty_completion",
                    "language model returned empty text, using fallback copy"
                );
                self.fallback(context)
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    event_name = "llm_completion_failed",
                    error = %error,
                    "language model call failed, using fallback copy"
                );
                self.fallback(context)
            }
            Err(_) => {
                tracing::warn!(
                    event_name = "llm_completion_timeout",
                    timeout_ms = self.reply_timeout.as_millis() as u64,
                    "language model call timed out, using fallback copy"
                );
                self.fallback(context)
            }
        }
    }

    /// Template copy carrying the same offer the model would have presented.
    pub fn fallback(&self, context: &PromptContext) -> String {
        match (&context.coupon_code, context.should_make_offer) {
            (Some(code), true) => format!(
                "Hi {name}! Thanks for reaching out about pricing.\n\n\
                 As a valued {tier} customer, I can offer you a {pct}% discount on your \
                 current order.\n\n\
                 Use code {code} at checkout - this offer expires in {ttl} hours!\n\n\
                 Would you like to proceed with this exclusive offer?",
                name = context.customer_name,
                tier = context.tier_display,
                pct = context.final_discount_pct,
                code = code,
                ttl = context.offer_ttl_hours,
            ),
            _ => format!(
                "Hi {name}! I appreciate you reaching out.\n\n\
                 While I can't offer a discount on your current order, I have some great \
                 alternatives:\n\
                 - Free shipping on orders over $50\n\
                 - Loyalty points that add up to future savings\n\
                 - Bundle deals that give you more value\n\n\
                 Would any of these options work better for you?",
                name = context.customer_name,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use haggle_core::StrategyLabel;

    use super::NegotiationResponder;
    use crate::llm::LlmClient;
    use crate::prompt::PromptContext;

    struct CannedClient(&'static str);

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            bail!("connection refused")
        }
    }

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok("too late".to_string())
        }
    }

    fn context(code: Option<&str>) -> PromptContext {
        PromptContext {
            customer_name: "dana".to_string(),
            tier_display: "Regular Loyal".to_string(),
            strategy: StrategyLabel::Standard,
            total_spent: Decimal::from(600),
            total_orders: 12,
            cart_value: Decimal::from(70),
            cart_summary: "1x Berry Basket".to_string(),
            final_discount_pct: 15,
            attempts_this_month: 1,
            minimum_order_value: Decimal::from(25),
            should_make_offer: code.is_some(),
            coupon_code: code.map(str::to_string),
            offer_ttl_hours: 48,
        }
    }

    #[test]
    fn fallback_with_offer_carries_the_issued_code() {
        let responder =
            NegotiationResponder::new(Arc::new(FailingClient), Duration::from_millis(100));
        let copy = responder.fallback(&context(Some("NEG7H2K4M")));
        assert!(copy.contains("NEG7H2K4M"));
        assert!(copy.contains("15% discount"));
        assert!(copy.contains("48 hours"));
    }

    #[test]
    fn fallback_quotes_the_configured_expiry_window() {
        let responder =
            NegotiationResponder::new(Arc::new(FailingClient), Duration::from_millis(100));
        let mut ctx = context(Some("NEG7H2K4M"));
        ctx.offer_ttl_hours = 24;
        let copy = responder.fallback(&ctx);
        assert!(copy.contains("expires in 24 hours"));
        assert!(!copy.contains("48"));
    }

    #[test]
    fn fallback_without_offer_lists_alternatives() {
        let responder =
            NegotiationResponder::new(Arc::new(FailingClient), Duration::from_millis(100));
        let copy = responder.fallback(&context(None));
        assert!(copy.contains("Free shipping"));
        assert!(!copy.contains("discount on your current order.\n"));
    }

    #[tokio::test]
    async fn model_copy_is_used_when_the_model_answers() {
        let responder = NegotiationResponder::new(
            Arc::new(CannedClient("Great news, dana!")),
            Duration::from_millis(100),
        );
        let copy = responder.respond(&context(Some("NEG7H2K4M")), "any chance of a deal?").await;
        assert_eq!(copy, "Great news, dana!");
    }

    #[tokio::test]
    async fn model_failure_degrades_to_the_template() {
        let responder =
            NegotiationResponder::new(Arc::new(FailingClient), Duration::from_millis(100));
        let copy = responder.respond(&context(Some("NEG7H2K4M")), "any chance of a deal?").await;
        assert!(copy.contains("NEG7H2K4M"));
    }

    #[tokio::test]
    async fn model_timeout_degrades_to_the_template() {
        let responder = NegotiationResponder::new(Arc::new(SlowClient), Duration::from_millis(50));
        let copy = responder.respond(&context(Some("NEG7H2K4M")), "any chance of a deal?").await;
        assert!(copy.contains("NEG7H2K4M"));
    }

    #[tokio::test]
    async fn empty_model_copy_degrades_to_the_template() {
        let responder =
            NegotiationResponder::new(Arc::new(CannedClient("   ")), Duration::from_millis(100));
        let copy = responder.respond(&context(Some("NEG7H2K4M")), "any chance of a deal?").await;
        assert!(copy.contains("NEG7H2K4M"));
    }
}
