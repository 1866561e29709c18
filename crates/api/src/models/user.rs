//! User account model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercantile_core::{Email, Role, UserId};

/// A user account.
///
/// The password hash is deliberately not part of this struct - queries that
/// need it use [`UserWithPassword`] so the hash can never leak into a JSON
/// response by accident.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name, unique across the site.
    pub name: String,
    /// Email address, unique and lowercased.
    pub email: Email,
    /// Avatar URL.
    pub photo: String,
    /// Permission role.
    pub role: Role,
    /// When the password was last changed; tokens issued before this
    /// moment are invalid.
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether tokens issued at `issued_at` (seconds since the epoch) were
    /// issued before the most recent password change.
    #[must_use]
    pub fn password_changed_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| changed.timestamp() > issued_at)
    }
}

/// A user row together with its password hash, for credential checks only.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserWithPassword {
    /// The user itself.
    #[sqlx(flatten)]
    pub user: User,
    /// Argon2 password hash.
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(changed_at: Option<DateTime<Utc>>) -> User {
        User {
            id: UserId::new(1),
            name: "alice".to_owned(),
            email: Email::parse("alice@example.com").expect("valid email"),
            photo: String::new(),
            role: Role::User,
            password_changed_at: changed_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_never_changed() {
        let user = sample_user(None);
        assert!(!user.password_changed_after(0));
    }

    #[test]
    fn test_password_changed_invalidates_older_tokens() {
        let changed = Utc::now();
        let user = sample_user(Some(changed));
        assert!(user.password_changed_after(changed.timestamp() - 60));
        assert!(!user.password_changed_after(changed.timestamp() + 60));
    }

    #[test]
    fn test_serialize_skips_password_changed_at() {
        let user = sample_user(Some(Utc::now()));
        let json = serde_json::to_value(&user).expect("serialize");
        assert!(json.get("password_changed_at").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["name"], "alice");
    }
}
