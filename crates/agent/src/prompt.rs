use rust_decimal::Decimal;

use haggle_core::StrategyLabel;

/// Everything the copy layer may talk about. The numbers here are already
/// final; the prompt instructs the model to present them, not renegotiate
/// them.
#[derive(Clone, Debug)]
pub struct PromptContext {
    pub customer_name: String,
    pub tier_display: String,
    pub strategy: StrategyLabel,
    pub total_spent: Decimal,
    pub total_orders: u32,
    pub cart_value: Decimal,
    pub cart_summary: String,
    pub final_discount_pct: u8,
    pub attempts_this_month: u32,
    pub minimum_order_value: Decimal,
    pub should_make_offer: bool,
    pub coupon_code: Option<String>,
    /// Validity window of the issued coupon; the copy layer must quote this
    /// rather than assume a fixed urgency window.
    pub offer_ttl_hours: i64,
}

impl PromptContext {
    pub fn system_prompt(&self) -> String {
        format!(
            "SYSTEM INSTRUCTION: You are the store's AI sales negotiator. You are friendly, \
             professional, and customer-focused.\n\
             \n\
             CUSTOMER CONTEXT:\n\
             - Name: {name}\n\
             - Tier: {tier}\n\
             - Total Spent: ${spent} | Orders: {orders}\n\
             - Cart Value: ${cart}\n\
             - Cart Items: {items}\n\
             - Negotiation Strategy: {strategy}\n\
             - Attempts This Month: {attempts}\n\
             \n\
             NEGOTIATION RULES:\n\
             1. Always acknowledge the customer's loyalty or status appropriately\n\
             2. {offer_line}\n\
             3. Never invent a discount, coupon code, or expiration beyond what is stated here\n\
             4. If no discount is possible, suggest alternatives (bundles, free shipping, loyalty points)\n\
             5. Create urgency with the {ttl}-hour expiration\n\
             6. Always end with a clear call to action\n\
             \n\
             PERSONALITY: {persona}\n\
             \n\
             Be conversational, use emojis sparingly, and make the customer feel valued.",
            name = self.customer_name,
            tier = self.tier_display,
            spent = self.total_spent,
            orders = self.total_orders,
            cart = self.cart_value,
            items = self.cart_summary,
            strategy = self.strategy.as_str(),
            attempts = self.attempts_this_month,
            ttl = self.offer_ttl_hours,
            offer_line = self.offer_line(),
            persona = self.persona_line(),
        )
    }

    fn offer_line(&self) -> String {
        match (&self.coupon_code, self.should_make_offer) {
            (Some(code), true) => format!(
                "Present exactly a {pct}% discount with the already-issued coupon code {code} \
                 (minimum order ${minimum}, expires in {ttl} hours)",
                pct = self.final_discount_pct,
                code = code,
                minimum = self.minimum_order_value,
                ttl = self.offer_ttl_hours,
            ),
            _ => "No discount is available for this request; present the alternatives instead"
                .to_string(),
        }
    }

    fn persona_line(&self) -> &'static str {
        match self.strategy {
            StrategyLabel::HighlyAccommodating => {
                "Almost always say yes, very generous, use premium language"
            }
            StrategyLabel::Accommodating => "Usually say yes, good offers, friendly and helpful",
            StrategyLabel::Standard => "Balanced approach, fair offers, professional",
            StrategyLabel::Cautious => "More selective, smaller offers, focus on value",
            StrategyLabel::ValueFocused => "Emphasize value over price, suggest alternatives",
            StrategyLabel::AcquisitionFocused => "Focus on building the relationship, educational",
            StrategyLabel::RetentionFocused => {
                "Generous to win the customer back, acknowledge their absence"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use haggle_core::StrategyLabel;

    use super::PromptContext;

    fn context() -> PromptContext {
        PromptContext {
            customer_name: "dana".to_string(),
            tier_display: "VIP Gold".to_string(),
            strategy: StrategyLabel::Accommodating,
            total_spent: Decimal::from(1200),
            total_orders: 30,
            cart_value: Decimal::from(85),
            cart_summary: "2x Mango Box, 1x Citrus Crate".to_string(),
            final_discount_pct: 20,
            attempts_this_month: 2,
            minimum_order_value: Decimal::from(25),
            should_make_offer: true,
            coupon_code: Some("NEGQX41ZP".to_string()),
            offer_ttl_hours: 48,
        }
    }

    #[test]
    fn system_prompt_embeds_the_issued_code_and_ceiling() {
        let prompt = context().system_prompt();
        assert!(prompt.contains("NEGQX41ZP"));
        assert!(prompt.contains("20% discount"));
        assert!(prompt.contains("ACCOMMODATING"));
        assert!(prompt.contains("minimum order $25"));
        assert!(prompt.contains("expires in 48 hours"));
    }

    #[test]
    fn system_prompt_quotes_the_configured_expiry_window() {
        let mut ctx = context();
        ctx.offer_ttl_hours = 24;
        let prompt = ctx.system_prompt();
        assert!(prompt.contains("expires in 24 hours"));
        assert!(prompt.contains("24-hour expiration"));
        assert!(!prompt.contains("48"));
    }

    #[test]
    fn prompt_without_offer_steers_to_alternatives() {
        let mut ctx = context();
        ctx.should_make_offer = false;
        ctx.coupon_code = None;
        let prompt = ctx.system_prompt();
        assert!(prompt.contains("No discount is available"));
        assert!(!prompt.contains("NEGQX41ZP"));
    }
}
