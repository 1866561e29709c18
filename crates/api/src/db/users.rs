//! User repository.
//!
//! Soft-deleted accounts (`active = FALSE`) are invisible to every lookup
//! here; rows are only physically removed by the admin delete.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use mercantile_core::{Email, Role, UserId};

use super::RepositoryError;
use crate::models::user::{User, UserWithPassword};

/// Columns that make up the [`User`] struct.
const USER_COLUMNS: &str =
    "id, name, email, photo, role, password_changed_at, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or email already
    /// exists, `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_unique_violation(e, "name or email already in use")
            })
    }

    /// Get an active user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND active");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get an active user by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND active");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get an active user together with their password hash, by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserWithPassword>, RepositoryError> {
        let query = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1 AND active"
        );
        let user = sqlx::query_as::<_, UserWithPassword>(&query)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get an active user together with their password hash, by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<UserWithPassword>, RepositoryError> {
        let query =
            format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE id = $1 AND active");
        let user = sqlx::query_as::<_, UserWithPassword>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// List active users, newest first, with a total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, page: i64, limit: i64) -> Result<(Vec<User>, i64), RepositoryError> {
        let offset = (page - 1) * limit;
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE active
             ORDER BY created_at DESC
             LIMIT $1 OFFSET $2"
        );
        let users = sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE active")
            .fetch_one(self.pool)
            .await?;

        Ok((users, total))
    }

    /// Update profile fields (name, email, photo). `None` leaves a field
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no active user matches,
    /// `RepositoryError::Conflict` on a duplicate name/email.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: Option<&str>,
        email: Option<&Email>,
        photo: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let query = format!(
            "UPDATE users
             SET name = COALESCE($2, name),
                 email = COALESCE($3, email),
                 photo = COALESCE($4, photo),
                 updated_at = now()
             WHERE id = $1 AND active
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(photo)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique_violation(e, "name or email already in use"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Admin update: profile fields plus role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no active user matches,
    /// `RepositoryError::Conflict` on a duplicate name/email.
    pub async fn admin_update(
        &self,
        id: UserId,
        name: Option<&str>,
        email: Option<&Email>,
        role: Option<Role>,
    ) -> Result<User, RepositoryError> {
        let query = format!(
            "UPDATE users
             SET name = COALESCE($2, name),
                 email = COALESCE($3, email),
                 role = COALESCE($4, role),
                 updated_at = now()
             WHERE id = $1 AND active
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(role)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique_violation(e, "name or email already in use"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Replace the password hash and stamp `password_changed_at`.
    ///
    /// The stamp is backdated by two seconds so tokens issued in the same
    /// instant as the change remain valid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no active user matches.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let changed_at = Utc::now() - Duration::seconds(2);
        let result = sqlx::query(
            "UPDATE users
             SET password_hash = $2,
                 password_changed_at = $3,
                 password_reset_token = NULL,
                 password_reset_expires = NULL,
                 updated_at = now()
             WHERE id = $1 AND active",
        )
        .bind(id)
        .bind(password_hash)
        .bind(changed_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Store a hashed password-reset token with its expiry window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no active user matches.
    pub async fn set_reset_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users
             SET password_reset_token = $2, password_reset_expires = $3
             WHERE id = $1 AND active",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Find the user holding an unexpired reset token hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE password_reset_token = $1
               AND password_reset_expires > now()
               AND active"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Drop a stored reset token (e.g., after a failed reset email).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_reset_token(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE users
             SET password_reset_token = NULL, password_reset_expires = NULL
             WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Soft-delete: flip the `active` flag. The row stays for referential
    /// integrity with orders and reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no active user matches.
    pub async fn soft_delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET active = FALSE WHERE id = $1 AND active")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Physically remove a user row (admin only).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
