use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use haggle_core::{CustomerBehaviorProfile, CustomerId};

/// How recently a purchase must have landed to count as "recent" for the
/// repeat-attempt penalty.
pub const RECENT_PURCHASE_WINDOW_DAYS: i64 = 30;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// One inbound haggling message plus the cart it is about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationRequest {
    pub customer_id: CustomerId,
    pub message: String,
    pub cart_items: Vec<CartItem>,
}

impl NegotiationRequest {
    pub fn cart_value(&self) -> Decimal {
        self.cart_items.iter().map(CartItem::line_total).sum()
    }

    pub fn cart_summary(&self) -> String {
        if self.cart_items.is_empty() {
            return "empty cart".to_string();
        }
        self.cart_items
            .iter()
            .map(|item| format!("{}x {}", item.quantity, item.product_name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Source of customer purchase history. An unknown customer is not an
/// error; the orchestrator substitutes an empty profile.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn behavior_profile(
        &self,
        customer_id: &CustomerId,
    ) -> anyhow::Result<Option<CustomerBehaviorProfile>>;
}

pub fn has_recent_purchase(profile: &CustomerBehaviorProfile, now: DateTime<Utc>) -> bool {
    profile
        .last_order_date
        .map_or(false, |last| now - last <= Duration::days(RECENT_PURCHASE_WINDOW_DAYS))
}

/// Directory backed by a map, for wiring tests and demos.
#[derive(Default)]
pub struct StaticCustomerDirectory {
    profiles: RwLock<HashMap<String, CustomerBehaviorProfile>>,
}

impl StaticCustomerDirectory {
    pub fn with_profiles(profiles: impl IntoIterator<Item = CustomerBehaviorProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.customer_id.0.clone(), profile))
            .collect();
        Self { profiles: RwLock::new(profiles) }
    }

    pub async fn insert(&self, profile: CustomerBehaviorProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.customer_id.0.clone(), profile);
    }
}

#[async_trait]
impl CustomerDirectory for StaticCustomerDirectory {
    async fn behavior_profile(
        &self,
        customer_id: &CustomerId,
    ) -> anyhow::Result<Option<CustomerBehaviorProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&customer_id.0).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use haggle_core::{CustomerBehaviorProfile, CustomerId};

    use super::{has_recent_purchase, CartItem, NegotiationRequest};

    fn request() -> NegotiationRequest {
        NegotiationRequest {
            customer_id: CustomerId("cust-1".to_string()),
            message: "any deal for me?".to_string(),
            cart_items: vec![
                CartItem {
                    product_name: "Mango Box".to_string(),
                    quantity: 2,
                    unit_price: Decimal::new(2450, 2),
                },
                CartItem {
                    product_name: "Citrus Crate".to_string(),
                    quantity: 1,
                    unit_price: Decimal::new(3100, 2),
                },
            ],
        }
    }

    #[test]
    fn cart_value_sums_line_totals() {
        assert_eq!(request().cart_value(), Decimal::new(8000, 2));
    }

    #[test]
    fn cart_summary_reads_naturally() {
        assert_eq!(request().cart_summary(), "2x Mango Box, 1x Citrus Crate");
        let empty = NegotiationRequest { cart_items: vec![], ..request() };
        assert_eq!(empty.cart_summary(), "empty cart");
    }

    #[test]
    fn recent_purchase_window_is_thirty_days() {
        let now = Utc::now();
        let mut profile = CustomerBehaviorProfile::empty(CustomerId("cust-1".to_string()));
        assert!(!has_recent_purchase(&profile, now));

        profile.last_order_date = Some(now - Duration::days(29));
        assert!(has_recent_purchase(&profile, now));

        profile.last_order_date = Some(now - Duration::days(31));
        assert!(!has_recent_purchase(&profile, now));
    }
}
