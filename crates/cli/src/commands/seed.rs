//! Catalog seeding from a YAML file.

use mercantile_core::Category;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use mercantile_api::db::products::NewProduct;
use mercantile_api::db::{self, ProductRepository, RepositoryError};

/// One product entry in the seed file.
#[derive(Debug, Deserialize)]
struct SeedProduct {
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    #[serde(default)]
    discount: Option<Decimal>,
    #[serde(default)]
    category: Category,
    #[serde(default)]
    brand: Option<String>,
    image_cover: String,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    products: Vec<SeedProduct>,
}

/// Insert every product from `file` into the catalog.
///
/// Entries whose slug already exists are skipped with a warning, so the
/// command can be re-run against a partially seeded database.
///
/// # Errors
///
/// Returns an error on unreadable or malformed YAML, database connection
/// failure, or any insert error other than a duplicate.
pub async fn products(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(file)?;
    let seed: SeedFile = serde_yaml::from_str(&contents)?;

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let repo = ProductRepository::new(&pool);

    let mut inserted = 0usize;
    let mut skipped = 0usize;

    for entry in seed.products {
        let name = entry.name.clone();
        let result = repo
            .create(NewProduct {
                name: entry.name,
                description: entry.description,
                price: entry.price,
                stock: entry.stock,
                discount: entry.discount,
                category: entry.category,
                brand: entry.brand,
                image_cover: entry.image_cover,
                images: entry.images,
            })
            .await;

        match result {
            Ok(product) => {
                info!(id = %product.id, slug = %product.slug, "Inserted {name}");
                inserted += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!("Skipping {name}: already exists");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seed complete: {inserted} inserted, {skipped} skipped");
    Ok(())
}
