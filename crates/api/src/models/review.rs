//! Review models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercantile_core::{ProductId, ReviewId, UserId};

/// A product review. One per (user, product) pair.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    /// Unique review ID.
    pub id: ReviewId,
    /// Review author.
    pub user_id: UserId,
    /// Reviewed product.
    pub product_id: ProductId,
    /// Rating, 0-10.
    pub rate: i16,
    /// Optional free-form comment.
    pub comment: Option<String>,
    /// When the review was created.
    pub created_at: DateTime<Utc>,
    /// When the review was last edited.
    pub updated_at: DateTime<Utc>,
}

/// A review joined with the author and product names for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewWithNames {
    /// The review itself.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    /// Author display name.
    pub user_name: String,
    /// Product display name.
    pub product_name: String,
}
