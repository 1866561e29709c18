//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MERCANTILE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MERCANTILE_BASE_URL` - Public URL the API is served from
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `CHECKOUT_GATEWAY_URL` - Payment gateway API base URL
//! - `CHECKOUT_API_KEY` - Payment gateway API key
//! - `CHECKOUT_WEBHOOK_SECRET` - Shared secret for webhook signatures
//!
//! ## Optional
//! - `MERCANTILE_HOST` - Bind address (default: 127.0.0.1)
//! - `MERCANTILE_PORT` - Listen port (default: 3000)
//! - `MERCANTILE_CORS_ORIGIN` - Allowed browser origin (default: the base URL)
//! - `MERCANTILE_FRONTEND_URL` - Storefront origin emailed links point at (default: the CORS origin)
//! - `MERCANTILE_COOKIE_SECURE` - Mark auth cookies `Secure` (default: true)
//! - `JWT_ACCESS_TTL_MINUTES` - Access token lifetime (default: 15)
//! - `JWT_REFRESH_TTL_DAYS` - Refresh token lifetime (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! ## Optional (email - enables password reset delivery)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM`
//!
//! ## Optional (media - enables product image uploads)
//! - `MEDIA_UPLOAD_URL` - Image host upload endpoint
//! - `MEDIA_API_KEY` - Image host API key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the API
    pub base_url: String,
    /// Browser origin allowed by CORS
    pub cors_origin: String,
    /// Storefront origin that emailed links (password reset) point at
    pub frontend_url: String,
    /// Whether auth cookies carry the `Secure` attribute
    pub cookie_secure: bool,
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// Payment gateway configuration
    pub checkout: CheckoutConfig,
    /// SMTP configuration (optional - password reset emails)
    pub email: Option<EmailConfig>,
    /// Image host configuration (optional - product image uploads)
    pub media: Option<MediaConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// JWT signing configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC signing secret shared by access and refresh tokens
    pub secret: SecretString,
    /// Access token lifetime in minutes
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_ttl_days: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .finish()
    }
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact the credentials.
#[derive(Clone)]
pub struct CheckoutConfig {
    /// Gateway API base URL
    pub gateway_url: String,
    /// Gateway API key
    pub api_key: SecretString,
    /// Shared secret the gateway signs webhook deliveries with
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("gateway_url", &self.gateway_url)
            .field("api_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl EmailConfig {
    /// Load SMTP configuration from environment.
    ///
    /// Returns `None` when no SMTP variables are set (password reset emails
    /// are then logged instead of sent). All required variables must be set
    /// together.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let host = get_optional_env("SMTP_HOST");
        let username = get_optional_env("SMTP_USERNAME");
        let password = get_optional_env("SMTP_PASSWORD");
        let from = get_optional_env("SMTP_FROM");

        match (host, username, password, from) {
            (Some(smtp_host), Some(smtp_username), Some(smtp_password), Some(from_address)) => {
                let smtp_port = get_env_or_default("SMTP_PORT", "587").parse::<u16>().map_err(
                    |e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()),
                )?;
                Ok(Some(Self {
                    smtp_host,
                    smtp_port,
                    smtp_username,
                    smtp_password: SecretString::from(smtp_password),
                    from_address,
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SMTP_*".to_string(),
                "SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and SMTP_FROM must be set together"
                    .to_string(),
            )),
        }
    }
}

/// Image host configuration for product image uploads.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct MediaConfig {
    /// Upload endpoint of the image host
    pub upload_url: String,
    /// Image host API key
    pub api_key: SecretString,
}

impl std::fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConfig")
            .field("upload_url", &self.upload_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl MediaConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let upload_url = get_optional_env("MEDIA_UPLOAD_URL");
        let api_key = get_optional_env("MEDIA_API_KEY");

        match (upload_url, api_key) {
            (Some(upload_url), Some(key)) => {
                validate_secret_strength(&key, "MEDIA_API_KEY")?;
                Ok(Some(Self {
                    upload_url,
                    api_key: SecretString::from(key),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "MEDIA_*".to_string(),
                "Both MEDIA_UPLOAD_URL and MEDIA_API_KEY must be set together".to_string(),
            )),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MERCANTILE_DATABASE_URL")?;
        let host = get_env_or_default("MERCANTILE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MERCANTILE_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("MERCANTILE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MERCANTILE_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("MERCANTILE_BASE_URL")?;
        let cors_origin = get_env_or_default("MERCANTILE_CORS_ORIGIN", &base_url);
        let frontend_url = get_env_or_default("MERCANTILE_FRONTEND_URL", &cors_origin);
        let cookie_secure = get_env_or_default("MERCANTILE_COOKIE_SECURE", "true")
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MERCANTILE_COOKIE_SECURE".to_string(), e.to_string())
            })?;

        let jwt = JwtConfig::from_env()?;
        let checkout = CheckoutConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let media = MediaConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cors_origin,
            frontend_url,
            cookie_secure,
            jwt,
            checkout,
            email,
            media,
            sentry_dsn,
            sentry_environment,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("JWT_SECRET")?;
        if secret.expose_secret().len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InsecureSecret(
                "JWT_SECRET".to_string(),
                format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
            ));
        }
        let access_ttl_minutes = get_env_or_default("JWT_ACCESS_TTL_MINUTES", "15")
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("JWT_ACCESS_TTL_MINUTES".to_string(), e.to_string())
            })?;
        let refresh_ttl_days = get_env_or_default("JWT_REFRESH_TTL_DAYS", "30")
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("JWT_REFRESH_TTL_DAYS".to_string(), e.to_string())
            })?;
        Ok(Self {
            secret,
            access_ttl_minutes,
            refresh_ttl_days,
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gateway_url: get_required_env("CHECKOUT_GATEWAY_URL")?,
            api_key: get_validated_secret("CHECKOUT_API_KEY")?,
            webhook_secret: get_validated_secret("CHECKOUT_WEBHOOK_SECRET")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let config = JwtConfig {
            secret: SecretString::from("kP2m!xW8qR5t#nY3vB7j@dF1gH9sL4z"),
            access_ttl_minutes: 15,
            refresh_ttl_days: 30,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("kP2m"));
    }

    #[test]
    fn test_checkout_config_debug_redacts_secrets() {
        let config = CheckoutConfig {
            gateway_url: "https://gateway.example.com".to_string(),
            api_key: SecretString::from("gk_live_9f8e7d6c5b4a"),
            webhook_secret: SecretString::from("whsec_1a2b3c4d5e6f"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("https://gateway.example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("gk_live"));
        assert!(!debug_output.contains("whsec_"));
    }
}
