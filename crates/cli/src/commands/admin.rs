//! Admin account management.

use mercantile_core::{Email, Role};
use tracing::info;

use mercantile_api::db::{self, RepositoryError, UserRepository};
use mercantile_api::services::auth;

/// Create an account and promote it to admin.
///
/// When the email is already registered the existing account is promoted
/// instead, without touching its password.
///
/// # Errors
///
/// Returns an error on an invalid email, a weak hash, or database failure.
pub async fn create_user(
    email: &str,
    name: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let password_hash = auth::hash_password(password)?;

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let repo = UserRepository::new(&pool);

    let user = match repo.create(name, &email, &password_hash).await {
        Ok(user) => user,
        Err(RepositoryError::Conflict(_)) => {
            info!("Account {email} already exists, promoting it");
            repo.get_by_email(&email)
                .await?
                .ok_or("account exists but is deactivated")?
        }
        Err(e) => return Err(e.into()),
    };

    let user = repo
        .admin_update(user.id, None, None, Some(Role::Admin))
        .await?;

    info!(id = %user.id, "Admin account ready: {}", user.email);
    Ok(())
}
