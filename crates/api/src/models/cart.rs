//! Cart item models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use mercantile_core::{CartItemId, ProductId, UserId};

/// One (user, product) row in a cart.
///
/// At most one row exists per (user, product) pair; re-adding a product
/// replaces the quantity rather than accumulating it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartItem {
    /// Unique cart item ID.
    pub id: CartItemId,
    /// Owning user.
    pub user_id: UserId,
    /// Referenced product.
    pub product_id: ProductId,
    /// Selected quantity, always >= 1.
    pub quantity: i32,
    /// When the item was first added.
    pub created_at: DateTime<Utc>,
    /// When the quantity was last changed.
    pub updated_at: DateTime<Utc>,
}

/// A cart item joined with the product fields the cart page displays.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartItemWithProduct {
    /// Unique cart item ID.
    pub id: CartItemId,
    /// Referenced product.
    pub product_id: ProductId,
    /// Product display name.
    pub name: String,
    /// Current unit price.
    pub price: Decimal,
    /// Product cover image URL.
    pub image_cover: String,
    /// Selected quantity.
    pub quantity: i32,
}
