//! Cart repository.

use sqlx::PgPool;

use mercantile_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::{CartItem, CartItemWithProduct};

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's cart joined with current product details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartItemWithProduct>, RepositoryError> {
        let items = sqlx::query_as::<_, CartItemWithProduct>(
            "SELECT c.id, c.product_id, p.name, p.price, p.image_cover, c.quantity
             FROM cart_items c
             JOIN products p ON p.id = c.product_id
             WHERE c.user_id = $1
             ORDER BY c.created_at",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Put a product in the cart at the given quantity.
    ///
    /// Re-adding a product that is already present replaces the stored
    /// quantity; the last write wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a non-positive quantity,
    /// `RepositoryError::NotFound` when the product doesn't exist.
    pub async fn upsert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        if quantity < 1 {
            return Err(RepositoryError::Validation(
                "quantity must be at least 1".to_owned(),
            ));
        }

        sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (user_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, product_id)
                 DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = now()
             RETURNING id, user_id, product_id, quantity, created_at, updated_at",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })
    }

    /// Remove one product from a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product isn't in the cart.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty a user's cart. A no-op when the cart is already empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
