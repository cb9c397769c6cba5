//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `JWT_REFRESH_SECRET` - Refresh token signing secret (min 32 chars, high entropy)
//! - `DATABASE_URL` - `PostgreSQL` connection string (when `API_STORE=postgres`)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 4000)
//! - `API_STORE` - `postgres` or `memory` (default: postgres)
//! - `ACCESS_TOKEN_TTL_MINUTES` - Access token lifetime (default: 15)
//! - `REFRESH_TOKEN_TTL_DAYS` - Refresh token lifetime (default: 7)
//! - `COOKIE_SECURE` - Mark auth cookies `Secure` (default: true)
//! - `ALLOWED_ORIGINS` - Comma-separated CORS allow-list
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - Bootstrap administrator account
//! - `CLOUDINARY_NAME` / `CLOUDINARY_API_KEY` / `CLOUDINARY_SECRET_KEY` - Image hosting
//! - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` - Payment gateway
//! - `CURRENCY` - Gateway currency code (default: INR)
//! - `UPLOAD_TMP_DIR` - Scratch directory for uploaded images (default: OS temp dir)
//! - `LOG_FORMAT` - `json` for structured logs (default: human readable)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:5174";

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
    "put-your",
    "add-your",
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

/// Which storage backend serves requests.
#[derive(Clone)]
pub enum StoreBackend {
    /// `PostgreSQL` via sqlx.
    Postgres {
        /// Connection URL (contains password)
        database_url: SecretString,
    },
    /// Process-local store; data is lost on restart.
    Memory,
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Storage backend
    pub store: StoreBackend,
    /// Token and cookie settings
    pub auth: AuthConfig,
    /// Administrator account created at startup, if configured
    pub admin: Option<AdminBootstrap>,
    /// Origins allowed to make credentialed cross-origin requests
    pub allowed_origins: Vec<String>,
    /// Image hosting credentials
    pub cloudinary: Option<CloudinaryConfig>,
    /// Payment gateway credentials
    pub razorpay: Option<RazorpayConfig>,
    /// ISO 4217 code sent to the payment gateway
    pub currency: String,
    /// Scratch directory for uploaded images
    pub upload_dir: PathBuf,
    /// Emit JSON logs instead of human-readable ones
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Token signing and cookie configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct AuthConfig {
    /// Access token signing secret
    pub jwt_secret: SecretString,
    /// Refresh token signing secret
    pub jwt_refresh_secret: SecretString,
    /// Access token lifetime in minutes
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_ttl_days: i64,
    /// Whether auth cookies carry the `Secure` attribute
    pub cookie_secure: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_refresh_secret", &"[REDACTED]")
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Administrator credentials used to seed the admin account.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: SecretString,
}

impl std::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Cloudinary upload credentials.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Razorpay API credentials.
#[derive(Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

impl ApiConfig {
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

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit set of variables.
    ///
    /// # Errors
    ///
    /// See [`ApiConfig::from_env`].
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env
            .or_default("API_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = env.parsed_or_default("PORT", 4000_u16)?;

        let store = match env.or_default("API_STORE", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: env.required_secret("DATABASE_URL")?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "API_STORE".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };

        let auth = AuthConfig::from_env(&env)?;

        let admin = env
            .optional_group(&["ADMIN_EMAIL", "ADMIN_PASSWORD"])?
            .map(|mut values| AdminBootstrap {
                password: SecretString::from(values.pop().unwrap_or_default()),
                email: values.pop().unwrap_or_default(),
            });

        let allowed_origins = env
            .or_default("ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        let cloudinary = env
            .optional_group(&[
                "CLOUDINARY_NAME",
                "CLOUDINARY_API_KEY",
                "CLOUDINARY_SECRET_KEY",
            ])?
            .map(|mut values| CloudinaryConfig {
                api_secret: SecretString::from(values.pop().unwrap_or_default()),
                api_key: values.pop().unwrap_or_default(),
                cloud_name: values.pop().unwrap_or_default(),
            });

        let razorpay = env
            .optional_group(&["RAZORPAY_KEY_ID", "RAZORPAY_KEY_SECRET"])?
            .map(|mut values| RazorpayConfig {
                key_secret: SecretString::from(values.pop().unwrap_or_default()),
                key_id: values.pop().unwrap_or_default(),
            });

        let upload_dir = env
            .optional("UPLOAD_TMP_DIR")
            .map_or_else(std::env::temp_dir, PathBuf::from);

        Ok(Self {
            host,
            port,
            store,
            auth,
            admin,
            allowed_origins,
            cloudinary,
            razorpay,
            currency: env.or_default("CURRENCY", "INR").to_uppercase(),
            upload_dir,
            json_logs: env.optional("LOG_FORMAT").as_deref() == Some("json"),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let jwt_secret = env.validated_secret("JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "JWT_SECRET")?;
        let jwt_refresh_secret = env.validated_secret("JWT_REFRESH_SECRET")?;
        validate_jwt_secret(&jwt_refresh_secret, "JWT_REFRESH_SECRET")?;

        if jwt_secret.expose_secret() == jwt_refresh_secret.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "JWT_REFRESH_SECRET".to_string(),
                "must differ from JWT_SECRET".to_string(),
            ));
        }

        let access_ttl_minutes = env.parsed_or_default("ACCESS_TOKEN_TTL_MINUTES", 15_i64)?;
        let refresh_ttl_days = env.parsed_or_default("REFRESH_TOKEN_TTL_DAYS", 7_i64)?;
        if access_ttl_minutes <= 0 || refresh_ttl_days <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ACCESS_TOKEN_TTL_MINUTES/REFRESH_TOKEN_TTL_DAYS".to_string(),
                "token lifetimes must be positive".to_string(),
            ));
        }

        Ok(Self {
            jwt_secret,
            jwt_refresh_secret,
            access_ttl_minutes,
            refresh_ttl_days,
            cookie_secure: env.parsed_or_default("COOKIE_SECURE", true)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup shared by the helpers below.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable; blank values count as absent.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a required variable as a secret.
    fn required_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        self.required(key).map(SecretString::from)
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Load a group of variables that must be set together.
    ///
    /// Returns `None` when none are set, the values in key order when all are.
    fn optional_group(&self, keys: &[&str]) -> Result<Option<Vec<String>>, ConfigError> {
        let values: Vec<Option<String>> = keys.iter().map(|key| self.optional(key)).collect();

        if values.iter().all(Option::is_none) {
            return Ok(None);
        }

        keys.iter()
            .zip(values)
            .map(|(key, value)| value.ok_or_else(|| ConfigError::MissingEnvVar((*key).to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Load and validate a secret from environment.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ACCESS: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";
    const REFRESH: &str = "Zq8!vN2@wE5#tR7$yU1%iO3^pA6&sD9*";

    fn base_vars() -> HashMap<String, String> {
        [
            ("API_STORE", "memory"),
            ("JWT_SECRET", ACCESS),
            ("JWT_REFRESH_SECRET", REFRESH),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_map(&base_vars()).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:4000");
        assert!(matches!(config.store, StoreBackend::Memory));
        assert_eq!(config.auth.access_ttl_minutes, 15);
        assert_eq!(config.auth.refresh_ttl_days, 7);
        assert!(config.auth.cookie_secure);
        assert_eq!(config.currency, "INR");
        assert_eq!(config.allowed_origins.len(), 2);
        assert!(config.admin.is_none());
        assert!(config.cloudinary.is_none());
        assert!(config.razorpay.is_none());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut vars = base_vars();
        vars.remove("API_STORE");
        let err = ApiConfig::from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "DATABASE_URL"));
    }

    #[test]
    fn test_unknown_store_rejected() {
        let mut vars = base_vars();
        vars.insert("API_STORE".to_string(), "mongo".to_string());
        assert!(matches!(
            ApiConfig::from_map(&vars),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_identical_jwt_secrets_rejected() {
        let mut vars = base_vars();
        vars.insert("JWT_REFRESH_SECRET".to_string(), ACCESS.to_string());
        assert!(matches!(
            ApiConfig::from_map(&vars),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }

    #[test]
    fn test_partial_group_rejected() {
        let mut vars = base_vars();
        vars.insert("RAZORPAY_KEY_ID".to_string(), "rzp_test_123".to_string());
        let err = ApiConfig::from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "RAZORPAY_KEY_SECRET"));
    }

    #[test]
    fn test_groups_load_in_order() {
        let mut vars = base_vars();
        vars.insert("CLOUDINARY_NAME".to_string(), "toybox".to_string());
        vars.insert("CLOUDINARY_API_KEY".to_string(), "1234".to_string());
        vars.insert("CLOUDINARY_SECRET_KEY".to_string(), "s3cr3t".to_string());
        vars.insert("ADMIN_EMAIL".to_string(), "admin@toybox.test".to_string());
        vars.insert("ADMIN_PASSWORD".to_string(), "hunter22hunter".to_string());

        let config = ApiConfig::from_map(&vars).unwrap();
        let cloudinary = config.cloudinary.unwrap();
        assert_eq!(cloudinary.cloud_name, "toybox");
        assert_eq!(cloudinary.api_key, "1234");
        assert_eq!(cloudinary.api_secret.expose_secret(), "s3cr3t");
        assert_eq!(config.admin.unwrap().email, "admin@toybox.test");
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "http".to_string());
        assert!(matches!(
            ApiConfig::from_map(&vars),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "PORT"
        ));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("your-api-key-here", "TEST_VAR").is_err());
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength(ACCESS, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_jwt_secret_length() {
        assert!(validate_jwt_secret(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_jwt_secret(&SecretString::from("a".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ApiConfig::from_map(&base_vars()).unwrap();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(ACCESS));
        assert!(!debug_output.contains(REFRESH));
    }
}
