//! Domain models backing the API.
//!
//! These structs map one-to-one onto database rows (`sqlx::FromRow`) and
//! define the JSON shapes the API serves. Request payloads live next to
//! their route handlers.

pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use cart::{CartItem, CartItemWithProduct};
pub use order::{Order, OrderItem, OrderWithItems, ShippingAddress};
pub use product::Product;
pub use review::{Review, ReviewWithNames};
pub use user::User;
