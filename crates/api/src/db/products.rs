//! Product repository.
//!
//! Writes keep the derived columns honest: `slug` always mirrors `name`
//! and `is_featured` is recomputed from ratings, price, and discount on
//! every create and update.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use mercantile_core::{Category, ProductId, slugify};

use super::RepositoryError;
use crate::models::product::{self, Product};

/// Columns that make up the [`Product`] struct.
const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, discount, category, brand, \
     image_cover, images, slug, ratings_average, ratings_count, is_featured, \
     created_at, updated_at";

/// Identifies a product by either numeric ID or URL slug.
///
/// Path segments that parse as an integer are treated as IDs, everything
/// else as a slug.
#[derive(Debug, Clone)]
pub enum ProductSelector {
    Id(ProductId),
    Slug(String),
}

impl From<String> for ProductSelector {
    fn from(segment: String) -> Self {
        match ProductId::from_str(&segment) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(segment),
        }
    }
}

/// Sort orders the product listing supports.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductSort {
    /// Newest first.
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC",
            Self::PriceAsc => "price ASC",
            Self::PriceDesc => "price DESC",
            Self::Rating => "ratings_average DESC, ratings_count DESC",
        }
    }
}

/// Filters for the product listing. All optional; absent filters match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    /// Case-insensitive substring match on the name.
    pub search: Option<String>,
}

/// Fields accepted when creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub discount: Option<Decimal>,
    pub category: Category,
    pub brand: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
}

/// Partial update for a product. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub discount: Option<Decimal>,
    pub category: Option<Category>,
    pub brand: Option<String>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, with a total count for pagination.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        Self::push_filter(&mut builder, filter);
        builder.push(format!(" ORDER BY {}", sort.order_by()));
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind((page - 1) * limit);
        let products = builder
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM products");
        Self::push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        Ok((products, total))
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
        builder.push(" WHERE TRUE");
        if let Some(category) = filter.category {
            builder.push(" AND category = ");
            builder.push_bind(category);
        }
        if let Some(ref brand) = filter.brand {
            builder.push(" AND brand = ");
            builder.push_bind(brand.clone());
        }
        if let Some(min) = filter.min_price {
            builder.push(" AND price >= ");
            builder.push_bind(min);
        }
        if let Some(max) = filter.max_price {
            builder.push(" AND price <= ");
            builder.push_bind(max);
        }
        if let Some(in_stock) = filter.in_stock {
            builder.push(if in_stock {
                " AND stock > 0"
            } else {
                " AND stock = 0"
            });
        }
        if let Some(featured) = filter.featured {
            builder.push(" AND is_featured = ");
            builder.push_bind(featured);
        }
        if let Some(ref search) = filter.search {
            builder.push(" AND name ILIKE ");
            builder.push_bind(format!("%{search}%"));
        }
    }

    /// Get a product by ID or slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        selector: &ProductSelector,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = match selector {
            ProductSelector::Id(id) => {
                let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
                sqlx::query_as::<_, Product>(&query)
                    .bind(id)
                    .fetch_optional(self.pool)
                    .await?
            }
            ProductSelector::Slug(slug) => {
                let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1");
                sqlx::query_as::<_, Product>(&query)
                    .bind(slug)
                    .fetch_optional(self.pool)
                    .await?
            }
        };
        Ok(product)
    }

    /// Create a product, deriving `slug` and `is_featured`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when a domain rule fails,
    /// `RepositoryError::Conflict` when the name is already taken.
    pub async fn create(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        product::validate(&new.name, &new.description, new.price, new.stock, new.discount)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        let slug = slugify(&new.name);
        // New products have no ratings, so only a zero rating threshold
        // could make this true; still computed for uniformity.
        let featured = product::is_featured(Decimal::ZERO, 0, new.price, new.discount);

        let query = format!(
            "INSERT INTO products
                 (name, description, price, stock, discount, category, brand,
                  image_cover, images, slug, is_featured)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'Generic'), $8, $9, $10, $11)
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.price)
            .bind(new.stock)
            .bind(new.discount)
            .bind(new.category)
            .bind(new.brand.as_deref())
            .bind(&new.image_cover)
            .bind(&new.images)
            .bind(&slug)
            .bind(featured)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique_violation(e, "product name already in use"))
    }

    /// Apply a partial update, revalidating the merged row and recomputing
    /// `slug` and `is_featured`. Runs in a transaction with the row locked
    /// so concurrent updates serialize.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist,
    /// `RepositoryError::Validation` when the merged row breaks a rule,
    /// `RepositoryError::Conflict` when the new name is taken.
    pub async fn update(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let name = patch.name.unwrap_or(current.name);
        let description = patch.description.unwrap_or(current.description);
        let price = patch.price.unwrap_or(current.price);
        let stock = patch.stock.unwrap_or(current.stock);
        let discount = merge_discount(patch.discount, current.discount);
        let category = patch.category.unwrap_or(current.category);
        let brand = patch.brand.unwrap_or(current.brand);

        product::validate(&name, &description, price, stock, discount)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        let slug = slugify(&name);
        let featured =
            product::is_featured(current.ratings_average, current.ratings_count, price, discount);

        let query = format!(
            "UPDATE products
             SET name = $2, description = $3, price = $4, stock = $5, discount = $6,
                 category = $7, brand = $8, slug = $9, is_featured = $10, updated_at = now()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .bind(&name)
            .bind(&description)
            .bind(price)
            .bind(stock)
            .bind(discount)
            .bind(category)
            .bind(&brand)
            .bind(&slug)
            .bind(featured)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_unique_violation(e, "product name already in use"))?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Replace the image columns after an upload.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update_images(
        &self,
        id: ProductId,
        image_cover: Option<&str>,
        images: Option<&[String]>,
    ) -> Result<Product, RepositoryError> {
        let query = format!(
            "UPDATE products
             SET image_cover = COALESCE($2, image_cover),
                 images = COALESCE($3, images),
                 updated_at = now()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .bind(image_cover)
            .bind(images)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Refused while any stock remains on hand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist,
    /// `RepositoryError::Validation` when stock is still positive.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND stock = 0")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                    .bind(id)
                    .fetch_one(self.pool)
                    .await?;
            return Err(if exists {
                RepositoryError::Validation(
                    "product still has stock and cannot be deleted".to_owned(),
                )
            } else {
                RepositoryError::NotFound
            });
        }
        Ok(())
    }
}

/// Merge a patched discount with the stored one. A patched zero clears
/// the discount entirely; absent leaves the stored value alone.
fn merge_discount(patched: Option<Decimal>, current: Option<Decimal>) -> Option<Decimal> {
    match patched {
        Some(d) if d == Decimal::ZERO => None,
        Some(d) => Some(d),
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_numeric_is_id() {
        assert!(matches!(
            ProductSelector::from("42".to_owned()),
            ProductSelector::Id(id) if id == ProductId::new(42)
        ));
    }

    #[test]
    fn test_selector_text_is_slug() {
        assert!(matches!(
            ProductSelector::from("wireless-headphones".to_owned()),
            ProductSelector::Slug(s) if s == "wireless-headphones"
        ));
    }

    #[test]
    fn test_sort_order_clauses() {
        assert_eq!(ProductSort::Newest.order_by(), "created_at DESC");
        assert_eq!(ProductSort::PriceAsc.order_by(), "price ASC");
    }

    #[test]
    fn test_merge_discount_zero_clears() {
        let current = Some(Decimal::new(500, 2));
        assert_eq!(merge_discount(Some(Decimal::ZERO), current), None);
    }

    #[test]
    fn test_merge_discount_absent_keeps_current() {
        let current = Some(Decimal::new(500, 2));
        assert_eq!(merge_discount(None, current), current);
    }

    #[test]
    fn test_merge_discount_value_replaces() {
        let current = Some(Decimal::new(500, 2));
        let new = Some(Decimal::new(300, 2));
        assert_eq!(merge_discount(new, current), new);
    }
}
