use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Willingness to walk away over price, as observed by the surrounding
/// storefront. High-sensitivity customers get a reduced discount ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSensitivity {
    Low,
    Medium,
    High,
}

/// Aggregate purchasing metrics for one customer. Owned and mutated by the
/// surrounding application after each fulfilled order; the negotiation
/// engine only ever reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerBehaviorProfile {
    pub customer_id: CustomerId,
    pub display_name: String,
    pub total_orders: u32,
    pub total_spent: Decimal,
    pub average_order_value: Decimal,
    pub first_order_date: Option<DateTime<Utc>>,
    pub last_order_date: Option<DateTime<Utc>>,
    pub price_sensitivity: PriceSensitivity,
}

impl CustomerBehaviorProfile {
    /// Baseline profile for a customer the storefront has no history for.
    /// Classifies as a new customer.
    pub fn empty(customer_id: CustomerId) -> Self {
        Self {
            display_name: customer_id.0.clone(),
            customer_id,
            total_orders: 0,
            total_spent: Decimal::ZERO,
            average_order_value: Decimal::ZERO,
            first_order_date: None,
            last_order_date: None,
            price_sensitivity: PriceSensitivity::Medium,
        }
    }
}
