use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What goes back to the customer. `message` is the conversational copy;
/// the structured fields let the caller render the offer without parsing
/// the copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationResponse {
    pub message: String,
    pub offer_made: bool,
    pub coupon_code: Option<String>,
    pub discount_percentage: Option<u8>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub customer_tier: Option<String>,
    pub attempts_remaining: u32,
    pub eligible_for_future: bool,
    pub alternative_offers: Vec<String>,
}

pub const BLOCKED_MESSAGE: &str =
    "You've reached your negotiation limit. Please try again later.";
pub const MONTHLY_LIMIT_MESSAGE: &str = "You've reached your monthly negotiation limit.";

impl NegotiationResponse {
    /// Refusal on eligibility grounds. No offer, but the alternatives keep
    /// the conversation constructive.
    pub fn declined(message: &str, customer_tier: Option<String>) -> Self {
        Self {
            message: message.to_string(),
            offer_made: false,
            coupon_code: None,
            discount_percentage: None,
            expiration_time: None,
            customer_tier,
            attempts_remaining: 0,
            eligible_for_future: false,
            alternative_offers: standard_alternatives(),
        }
    }

    /// Graceful degradation when context cannot be built. The message comes
    /// from [`haggle_core::ApplicationError::user_message`]; it deliberately
    /// says nothing about the customer's standing.
    pub fn apologetic(message: &str) -> Self {
        Self {
            message: message.to_string(),
            offer_made: false,
            coupon_code: None,
            discount_percentage: None,
            expiration_time: None,
            customer_tier: None,
            attempts_remaining: 0,
            eligible_for_future: true,
            alternative_offers: Vec::new(),
        }
    }
}

/// Non-discount sweeteners offered when no coupon is issued.
pub fn standard_alternatives() -> Vec<String> {
    vec![
        "Free shipping on orders over $50".to_string(),
        "Double loyalty points on this purchase".to_string(),
        "Bundle deals that give you more value".to_string(),
    ]
}
