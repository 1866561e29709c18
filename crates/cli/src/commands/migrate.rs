//! Database migration command.
//!
//! Migrations are embedded from `crates/api/migrations/` at compile time,
//! so the binary can run them anywhere it can reach the database.

use tracing::info;

use mercantile_api::db;

/// Run pending database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
