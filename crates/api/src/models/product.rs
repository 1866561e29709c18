//! Product catalog model and derived-field rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use mercantile_core::{Category, ProductId};

/// Minimum average rating for a product to count as featured.
const FEATURED_MIN_AVERAGE: i64 = 9;
/// Minimum number of ratings for a product to count as featured.
const FEATURED_MIN_COUNT: i32 = 10;
/// Discount must exceed this percentage of the price to count as featured.
const FEATURED_MIN_DISCOUNT_PERCENT: i64 = 30;

/// A catalog product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name, unique across the catalog.
    pub name: String,
    /// Long-form description.
    pub description: String,
    /// Current unit price.
    pub price: Decimal,
    /// Purchasable units on hand. Never negative.
    pub stock: i32,
    /// Optional discount amount, strictly less than `price`.
    pub discount: Option<Decimal>,
    /// Catalog category.
    pub category: Category,
    /// Brand name.
    pub brand: String,
    /// Cover image URL.
    pub image_cover: String,
    /// Additional image URLs.
    pub images: Vec<String>,
    /// URL slug, derived from `name`.
    pub slug: String,
    /// Average review rating (0-10, one decimal).
    pub ratings_average: Decimal,
    /// Number of reviews.
    pub ratings_count: i32,
    /// Derived flag, recomputed on every write. See [`is_featured`].
    pub is_featured: bool,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether any units are on hand.
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Validation failures for product writes.
#[derive(Debug, thiserror::Error)]
pub enum ProductValidationError {
    #[error("product name must be between 5 and 100 characters")]
    NameLength,
    #[error("description must be at most 2500 characters")]
    DescriptionLength,
    #[error("price must not be negative")]
    NegativePrice,
    #[error("stock must not be negative")]
    NegativeStock,
    #[error("discount must be less than the actual price")]
    DiscountNotBelowPrice,
}

/// Validate the name/description/price/stock/discount rules shared by
/// create and update.
///
/// # Errors
///
/// Returns the first violated rule. The discount boundary is strict:
/// `discount == price` is rejected.
pub fn validate(
    name: &str,
    description: &str,
    price: Decimal,
    stock: i32,
    discount: Option<Decimal>,
) -> Result<(), ProductValidationError> {
    let name_len = name.chars().count();
    if !(5..=100).contains(&name_len) {
        return Err(ProductValidationError::NameLength);
    }
    if description.chars().count() > 2500 {
        return Err(ProductValidationError::DescriptionLength);
    }
    if price < Decimal::ZERO {
        return Err(ProductValidationError::NegativePrice);
    }
    if stock < 0 {
        return Err(ProductValidationError::NegativeStock);
    }
    if let Some(discount) = discount
        && discount >= price
    {
        return Err(ProductValidationError::DiscountNotBelowPrice);
    }
    Ok(())
}

/// Compute the derived `is_featured` flag.
///
/// A product is featured when its rating is excellent (average >= 9 over at
/// least 10 ratings) and it carries a discount worth more than 30% of the
/// price.
#[must_use]
pub fn is_featured(
    ratings_average: Decimal,
    ratings_count: i32,
    price: Decimal,
    discount: Option<Decimal>,
) -> bool {
    let meets_rating = ratings_average >= Decimal::from(FEATURED_MIN_AVERAGE)
        && ratings_count >= FEATURED_MIN_COUNT;

    let has_great_discount = price > Decimal::ZERO
        && discount.is_some_and(|d| {
            d * Decimal::ONE_HUNDRED / price > Decimal::from(FEATURED_MIN_DISCOUNT_PERCENT)
        });

    meets_rating && has_great_discount
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_discount_must_be_below_price() {
        assert!(validate("valid name", "desc", dec("10"), 1, Some(dec("9.99"))).is_ok());
        assert!(matches!(
            validate("valid name", "desc", dec("10"), 1, Some(dec("10"))),
            Err(ProductValidationError::DiscountNotBelowPrice)
        ));
        assert!(matches!(
            validate("valid name", "desc", dec("10"), 1, Some(dec("12"))),
            Err(ProductValidationError::DiscountNotBelowPrice)
        ));
    }

    #[test]
    fn test_name_length_bounds() {
        assert!(matches!(
            validate("abcd", "desc", dec("1"), 0, None),
            Err(ProductValidationError::NameLength)
        ));
        assert!(validate("abcde", "desc", dec("1"), 0, None).is_ok());
        let long = "a".repeat(101);
        assert!(matches!(
            validate(&long, "desc", dec("1"), 0, None),
            Err(ProductValidationError::NameLength)
        ));
    }

    #[test]
    fn test_negative_price_and_stock() {
        assert!(matches!(
            validate("valid name", "desc", dec("-1"), 0, None),
            Err(ProductValidationError::NegativePrice)
        ));
        assert!(matches!(
            validate("valid name", "desc", dec("1"), -1, None),
            Err(ProductValidationError::NegativeStock)
        ));
    }

    #[test]
    fn test_featured_requires_rating_and_discount() {
        // Great rating, deep discount (40% of price)
        assert!(is_featured(dec("9.0"), 10, dec("100"), Some(dec("40"))));
        // Rating too low
        assert!(!is_featured(dec("8.9"), 10, dec("100"), Some(dec("40"))));
        // Too few ratings
        assert!(!is_featured(dec("9.5"), 9, dec("100"), Some(dec("40"))));
        // Discount exactly 30% is not enough
        assert!(!is_featured(dec("9.5"), 20, dec("100"), Some(dec("30"))));
        // No discount at all
        assert!(!is_featured(dec("10"), 50, dec("100"), None));
    }

    #[test]
    fn test_featured_zero_price_never_panics() {
        assert!(!is_featured(dec("10"), 50, Decimal::ZERO, Some(dec("1"))));
    }
}
