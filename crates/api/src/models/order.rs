//! Order models and pricing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mercantile_core::{OrderId, OrderStatus, ProductId, UserId};

/// A customer order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Sum of line price x quantity, snapshotted at creation.
    pub total_price: Decimal,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Shipping destination returned by the payment gateway, if any.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub shipping: ShippingAddress,
    /// Checkout session id from the payment gateway. Unique: a redelivered
    /// webhook for the same session never creates a second order.
    pub payment_session_id: Option<String>,
    /// When payment completed.
    pub paid_at: Option<DateTime<Utc>>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// Shipping destination fields stored inline on the order row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingAddress {
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_country: Option<String>,
    pub shipping_postal: Option<String>,
}

/// One line of an order. `price` is a snapshot of the product price at
/// order-creation time, not a live reference.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    /// Referenced product.
    pub product_id: ProductId,
    /// Ordered quantity, always >= 1.
    pub quantity: i32,
    /// Unit price snapshot.
    pub price: Decimal,
}

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    /// The order itself.
    #[serde(flatten)]
    pub order: Order,
    /// Line items.
    pub items: Vec<OrderItem>,
}

/// Compute an order total from its line items.
#[must_use]
pub fn total_price(items: &[OrderItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(price: &str, quantity: i32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(1),
            quantity,
            price: price.parse().unwrap(),
        }
    }

    #[test]
    fn test_total_price() {
        // [{price:10, qty:2}, {price:5, qty:1}] => 25
        let items = vec![item("10", 2), item("5", 1)];
        assert_eq!(total_price(&items), Decimal::from(25));
    }

    #[test]
    fn test_total_price_empty() {
        assert_eq!(total_price(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_total_price_fractional() {
        let items = vec![item("19.99", 3)];
        assert_eq!(total_price(&items), "59.97".parse::<Decimal>().unwrap());
    }
}
