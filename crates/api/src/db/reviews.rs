//! Review repository.
//!
//! Every write recomputes the reviewed product's `ratings_average`,
//! `ratings_count`, and `is_featured` inside the same transaction, so the
//! aggregates never drift from the review rows.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use mercantile_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::product;
use crate::models::review::{Review, ReviewWithNames};

/// Columns that make up the [`Review`] struct.
const REVIEW_COLUMNS: &str = "id, user_id, product_id, rate, comment, created_at, updated_at";

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a product's reviews with author names, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ReviewWithNames>, RepositoryError> {
        let query = format!(
            "SELECT r.{}, u.name AS user_name, p.name AS product_name
             FROM reviews r
             JOIN users u ON u.id = r.user_id
             JOIN products p ON p.id = r.product_id
             WHERE r.product_id = $1
             ORDER BY r.created_at DESC",
            REVIEW_COLUMNS.replace(", ", ", r.")
        );
        let reviews = sqlx::query_as::<_, ReviewWithNames>(&query)
            .bind(product_id)
            .fetch_all(self.pool)
            .await?;
        Ok(reviews)
    }

    /// Get one review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let query = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1");
        let review = sqlx::query_as::<_, Review>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(review)
    }

    /// Create a review and refresh the product's rating aggregates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a rate outside 0..=10,
    /// `RepositoryError::Conflict` when the user already reviewed this
    /// product, `RepositoryError::NotFound` for an unknown product.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rate: i16,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        validate_rate(rate)?;

        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO reviews (user_id, product_id, rate, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING {REVIEW_COLUMNS}"
        );
        let review = sqlx::query_as::<_, Review>(&query)
            .bind(user_id)
            .bind(product_id)
            .bind(rate)
            .bind(comment)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.is_unique_violation() {
                        return RepositoryError::Conflict(
                            "you have already reviewed this product".to_owned(),
                        );
                    }
                    if db_err.is_foreign_key_violation() {
                        return RepositoryError::NotFound;
                    }
                }
                RepositoryError::Database(e)
            })?;

        refresh_product_ratings(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(review)
    }

    /// Update a review's rate and comment, and refresh the product's
    /// rating aggregates.
    ///
    /// With `owner` set the update is scoped to that author; `None` skips
    /// the ownership check (admin).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when no matching review exists.
    pub async fn update(
        &self,
        id: ReviewId,
        owner: Option<UserId>,
        rate: Option<i16>,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        if let Some(rate) = rate {
            validate_rate(rate)?;
        }

        let mut tx = self.pool.begin().await?;

        let query = format!(
            "UPDATE reviews
             SET rate = COALESCE($3, rate),
                 comment = COALESCE($4, comment),
                 updated_at = now()
             WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)
             RETURNING {REVIEW_COLUMNS}"
        );
        let review = sqlx::query_as::<_, Review>(&query)
            .bind(id)
            .bind(owner)
            .bind(rate)
            .bind(comment)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        refresh_product_ratings(&mut tx, review.product_id).await?;
        tx.commit().await?;
        Ok(review)
    }

    /// Delete a review and refresh the product's rating aggregates.
    ///
    /// With `owner` set the delete is scoped to that author; `None` skips
    /// the ownership check (admin).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when no matching review exists.
    pub async fn delete(
        &self,
        id: ReviewId,
        owner: Option<UserId>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_id: Option<ProductId> = sqlx::query_scalar(
            "DELETE FROM reviews
             WHERE id = $1 AND ($2::INTEGER IS NULL OR user_id = $2)
             RETURNING product_id",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;
        let product_id = product_id.ok_or(RepositoryError::NotFound)?;

        refresh_product_ratings(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn validate_rate(rate: i16) -> Result<(), RepositoryError> {
    if (0..=10).contains(&rate) {
        Ok(())
    } else {
        Err(RepositoryError::Validation(
            "rate must be between 0 and 10".to_owned(),
        ))
    }
}

/// Recompute a product's rating aggregates from its review rows, then
/// re-derive `is_featured` from the fresh numbers.
async fn refresh_product_ratings(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE products p
         SET ratings_average = COALESCE(
                 (SELECT ROUND(AVG(rate)::numeric, 1) FROM reviews WHERE product_id = p.id), 0),
             ratings_count = (SELECT COUNT(*) FROM reviews WHERE product_id = p.id),
             updated_at = now()
         WHERE p.id = $1",
    )
    .bind(product_id)
    .execute(&mut **tx)
    .await?;

    let row: Option<(Decimal, i32, Decimal, Option<Decimal>)> = sqlx::query_as(
        "SELECT ratings_average, ratings_count, price, discount FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some((average, count, price, discount)) = row {
        let featured = product::is_featured(average, count, price, discount);
        sqlx::query("UPDATE products SET is_featured = $2 WHERE id = $1")
            .bind(product_id)
            .bind(featured)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
