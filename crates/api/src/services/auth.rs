//! Tokens, passwords, and auth cookies.
//!
//! Two JWTs ride on every authenticated browser session, both in httpOnly
//! cookies: a short-lived access token (`jwt`) and a long-lived refresh
//! token (`refreshToken`). A token of one type is never accepted where the
//! other is expected.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Validation, decode, encode, errors::ErrorKind};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use mercantile_core::UserId;

use crate::config::JwtConfig;

/// Cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "jwt";
/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// How long a password-reset token stays usable.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Errors from token and password operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Signature valid but the token's lifetime is over.
    #[error("token expired")]
    TokenExpired,

    /// Bad signature, malformed token, or wrong token type.
    #[error("invalid token")]
    TokenInvalid,

    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed")]
    Hashing,
}

/// Which of the two session tokens a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims for both token types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id the token authenticates.
    pub sub: i32,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Access or refresh.
    pub token_type: TokenType,
}

/// Issues and verifies the session token pair.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Build a token service from the JWT configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    /// Issue an access token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Encoding` if signing fails.
    pub fn issue_access(&self, user_id: UserId) -> Result<String, AuthError> {
        self.issue(user_id, TokenType::Access, self.access_ttl)
    }

    /// Issue a refresh token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Encoding` if signing fails.
    pub fn issue_refresh(&self, user_id: UserId) -> Result<String, AuthError> {
        self.issue(user_id, TokenType::Refresh, self.refresh_ttl)
    }

    fn issue(
        &self,
        user_id: UserId,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.into(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type,
        };
        Ok(encode(&jsonwebtoken::Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a token and check it is of the expected type.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` when only the lifetime is the
    /// problem, `AuthError::TokenInvalid` for anything else (bad signature,
    /// malformed token, wrong type). Callers use the distinction to decide
    /// whether a silent refresh is appropriate.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            },
        )?;
        if data.claims.token_type != expected {
            return Err(AuthError::TokenInvalid);
        }
        Ok(data.claims)
    }

    /// Lifetime of a refresh token, for cookie Max-Age.
    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Lifetime of an access token, for cookie Max-Age.
    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }
}

/// Hash a password with argon2id and a fresh salt.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Hashing)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored argon2 hash.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Generate a password-reset token.
///
/// Returns `(plain, hashed)`: the plain hex token goes into the reset email,
/// only its SHA-256 digest is stored.
#[must_use]
pub fn generate_reset_token() -> (String, String) {
    let bytes: [u8; 32] = rand::random();
    let plain = hex::encode(bytes);
    (plain.clone(), hash_reset_token(&plain))
}

/// Hash a plain reset token for storage or lookup.
#[must_use]
pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

/// When a reset token issued now stops being accepted.
#[must_use]
pub fn reset_token_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES)
}

/// Build the session cookie pair for freshly issued tokens.
#[must_use]
pub fn session_cookies(
    access: String,
    refresh: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    secure: bool,
) -> (Cookie<'static>, Cookie<'static>) {
    (
        session_cookie(ACCESS_COOKIE, access, access_ttl, secure),
        session_cookie(REFRESH_COOKIE, refresh, refresh_ttl, secure),
    )
}

fn session_cookie(
    name: &'static str,
    value: String,
    ttl: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Build expired cookies that clear the session pair on logout.
#[must_use]
pub fn clear_session_cookies(secure: bool) -> (Cookie<'static>, Cookie<'static>) {
    let expired = |name: &'static str| {
        Cookie::build((name, ""))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::ZERO)
            .build()
    };
    (expired(ACCESS_COOKIE), expired(REFRESH_COOKIE))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn service() -> TokenService {
        TokenService::new(&JwtConfig {
            secret: SecretString::from("kP2m!xW8qR5t#nY3vB7j@dF1gH9sL4zQ"),
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = service();
        let token = service.issue_access(UserId::new(7)).unwrap();
        let claims = service.verify(&token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let service = service();
        let token = service.issue_refresh(UserId::new(7)).unwrap();
        assert!(matches!(
            service.verify(&token, TokenType::Access),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn test_tampered_token_is_invalid_not_expired() {
        let service = service();
        let mut token = service.issue_access(UserId::new(7)).unwrap();
        token.push('x');
        assert!(matches!(
            service.verify(&token, TokenType::Access),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let service = service();
        let other = TokenService::new(&JwtConfig {
            secret: SecretString::from("zL4s!gH9dF1j@vB7nY3t#qR5xW8mkP2Q"),
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
        });
        let token = service.issue_access(UserId::new(7)).unwrap();
        assert!(other.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("hunter3hunter3", &hash));
    }

    #[test]
    fn test_verify_password_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_reset_token_hash_matches() {
        let (plain, hashed) = generate_reset_token();
        assert_eq!(plain.len(), 64);
        assert_eq!(hash_reset_token(&plain), hashed);
        assert_ne!(plain, hashed);
    }

    #[test]
    fn test_session_cookies_flags() {
        let (access, refresh) = session_cookies(
            "a".into(),
            "r".into(),
            Duration::minutes(15),
            Duration::days(30),
            true,
        );
        assert_eq!(access.name(), ACCESS_COOKIE);
        assert_eq!(refresh.name(), REFRESH_COOKIE);
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
    }
}
