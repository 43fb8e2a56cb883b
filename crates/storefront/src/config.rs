//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (used for checkout redirects)
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret
//! - `CRON_SECRET` - Shared secret expected in the partner-mail trigger `key` parameter
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STRIPE_BOOK_PRICE_ID` - Stripe price for the printed book (otherwise inline price data)
//! - `STRIPE_BOOK_AMOUNT_PLN` - Inline book price in grosze (default: 9900)
//! - `STRIPE_BOOK_NAME` - Inline book product name
//! - `STRIPE_SHIP_COURIER_STANDARD_PLN` - Courier standard rate in grosze (default: 0)
//! - `STRIPE_SHIP_COURIER_EXPRESS_PLN` - Courier express rate in grosze (default: 1900)
//! - `STRIPE_SHIP_INPOST_PLN` - `InPost` locker rate in grosze (default: 1200)
//! - `SMTP_HOST` - SMTP relay; when unset, mail is rendered and logged instead of sent
//! - `SMTP_PORT` - SMTP port (default: 587, 465 uses implicit TLS)
//! - `SMTP_USER` / `SMTP_PASS` - SMTP credentials
//! - `MAIL_FROM` - Sender mailbox (default: `Przewodnik <noreply@localhost>`)
//! - `CHAPTERS_DIR` - Directory holding `{n}.pdf` chapter files (default: protected/chapters)
//! - `PARTNER_MAIL_MAX_CHAPTERS` - Number of chapters in a partner mailing (default: 3)
//! - `INPOST_POINTS_BASES` - Comma-separated points API bases, newest first
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use guidebook_core::Chapter;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default points API bases, tried newest version first.
pub const DEFAULT_POINTS_BASES: &[&str] = &[
    "https://api-pl-points.easypack24.net/v4/points",
    "https://api-pl-points.easypack24.net/v3/points",
    "https://api-pl-points.easypack24.net/v1/points",
];

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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Stripe configuration
    pub stripe: StripeConfig,
    /// Outgoing mail configuration
    pub email: EmailConfig,
    /// Partner drip-mailing configuration
    pub partner_mail: PartnerMailConfig,
    /// Locker directory upstream configuration
    pub lockers: LockerConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Stripe API and catalogue configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: SecretString,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
    /// Pre-configured Stripe price for the printed book
    pub book_price_id: Option<String>,
    /// Inline book price in grosze, used without `book_price_id`
    pub book_amount: i64,
    /// Inline book product name
    pub book_name: String,
    /// Shipping rates in grosze
    pub shipping: ShippingRates,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("book_price_id", &self.book_price_id)
            .field("book_amount", &self.book_amount)
            .field("book_name", &self.book_name)
            .field("shipping", &self.shipping)
            .finish()
    }
}

/// Physical book shipping rates in grosze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingRates {
    pub courier_standard: i64,
    pub courier_express: i64,
    pub inpost: i64,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self {
            courier_standard: 0,
            courier_express: 1900,
            inpost: 1200,
        }
    }
}

/// SMTP configuration.
///
/// `smtp` is `None` when no relay is configured; mail is then rendered and
/// logged by the preview transport instead of being delivered.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Sender mailbox, e.g. `Przewodnik <noreply@example.pl>`
    pub from_address: String,
    /// SMTP relay settings
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay settings.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Partner drip-mailing configuration.
///
/// Implements `Debug` manually to redact the trigger secret.
#[derive(Clone)]
pub struct PartnerMailConfig {
    /// Shared secret for the scheduler trigger endpoint
    pub cron_secret: SecretString,
    /// Directory with `{n}.pdf` chapter attachments
    pub chapters_dir: PathBuf,
    /// Last chapter of a mailing; sending it finishes the schedule
    pub max_chapters: Chapter,
}

impl std::fmt::Debug for PartnerMailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartnerMailConfig")
            .field("cron_secret", &"[REDACTED]")
            .field("chapters_dir", &self.chapters_dir)
            .field("max_chapters", &self.max_chapters)
            .finish()
    }
}

/// Locker points API configuration.
#[derive(Debug, Clone)]
pub struct LockerConfig {
    /// Points API bases, newest version first
    pub bases: Vec<String>,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            bases: DEFAULT_POINTS_BASES.iter().map(|b| (*b).to_owned()).collect(),
        }
    }
}

impl StorefrontConfig {
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = parse_env_or_default("STOREFRONT_PORT", 3000_u16)?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            stripe: StripeConfig::from_env()?,
            email: EmailConfig::from_env()?,
            partner_mail: PartnerMailConfig::from_env()?,
            lockers: LockerConfig::from_env(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = ShippingRates::default();
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            book_price_id: get_optional_env("STRIPE_BOOK_PRICE_ID"),
            book_amount: parse_env_or_default("STRIPE_BOOK_AMOUNT_PLN", 9900_i64)?,
            book_name: get_env_or_default("STRIPE_BOOK_NAME", "Książka w okładce"),
            shipping: ShippingRates {
                courier_standard: parse_env_or_default(
                    "STRIPE_SHIP_COURIER_STANDARD_PLN",
                    defaults.courier_standard,
                )?,
                courier_express: parse_env_or_default(
                    "STRIPE_SHIP_COURIER_EXPRESS_PLN",
                    defaults.courier_express,
                )?,
                inpost: parse_env_or_default("STRIPE_SHIP_INPOST_PLN", defaults.inpost)?,
            },
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let smtp = match get_optional_env("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_env_or_default("SMTP_PORT", 587_u16)?,
                username: get_optional_env("SMTP_USER"),
                password: get_optional_env("SMTP_PASS").map(SecretString::from),
            }),
            None => None,
        };

        Ok(Self {
            from_address: get_env_or_default("MAIL_FROM", "Przewodnik <noreply@localhost>"),
            smtp,
        })
    }
}

impl PartnerMailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cron_secret: get_validated_secret("CRON_SECRET")?,
            chapters_dir: PathBuf::from(get_env_or_default("CHAPTERS_DIR", "protected/chapters")),
            max_chapters: Chapter::new(parse_env_or_default("PARTNER_MAIL_MAX_CHAPTERS", 3_u32)?),
        })
    }
}

impl LockerConfig {
    fn from_env() -> Self {
        get_optional_env("INPOST_POINTS_BASES")
            .map(|raw| parse_bases(&raw))
            .filter(|bases| !bases.is_empty())
            .map_or_else(Self::default, |bases| Self { bases })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Split a comma-separated list of API bases, dropping blanks.
fn parse_bases(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| b.trim_end_matches('/').to_owned())
        .collect()
}

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

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, using `default` when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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
    let len = s.chars().count() as f64;
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
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-cron-key-here", "CRON_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "CRON_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("sk_test_51Hq8ZkF3vR9tLmN2pQ7xW4yB6c", "STRIPE_SECRET_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_ok());
    }

    #[test]
    fn test_parse_bases_skips_blanks_and_trailing_slash() {
        let bases = parse_bases(" https://a.test/v4/points/ , ,https://a.test/v3/points");
        assert_eq!(
            bases,
            vec![
                "https://a.test/v4/points".to_owned(),
                "https://a.test/v3/points".to_owned()
            ]
        );
    }

    #[test]
    fn test_default_bases_newest_first() {
        let config = LockerConfig::default();
        assert_eq!(config.bases.len(), 3);
        assert!(config.bases.first().unwrap().ends_with("/v4/points"));
        assert!(config.bases.last().unwrap().ends_with("/v1/points"));
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let config = StripeConfig {
            secret_key: SecretString::from("sk_live_super_secret_value"),
            webhook_secret: SecretString::from("whsec_super_secret_value"),
            book_price_id: Some("price_123".to_owned()),
            book_amount: 9900,
            book_name: "Książka".to_owned(),
            shipping: ShippingRates::default(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("price_123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_live_super_secret_value"));
        assert!(!debug_output.contains("whsec_super_secret_value"));
    }

    #[test]
    fn test_smtp_config_debug_redacts_password() {
        let config = SmtpConfig {
            host: "smtp.test".to_owned(),
            port: 465,
            username: Some("mailer".to_owned()),
            password: Some(SecretString::from("hunter2-but-longer")),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.test"));
        assert!(!debug_output.contains("hunter2-but-longer"));
    }
}
