//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session store
//!   (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `BACKEND_URL` - Managed backend project URL (e.g., `https://abcd.supabase.co`)
//! - `BACKEND_ANON_KEY` - Backend anon/publishable API key
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_STORAGE_BUCKET` - Bucket for product images (default: prdimgs)
//! - `STOREFRONT_CURRENCY` - Display currency (default: TRY)
//! - `STOREFRONT_TAX_RATE` - Tax fraction applied to the cart subtotal (default: 0.08)
//! - `STOREFRONT_FREE_SHIPPING_THRESHOLD` - Subtotal above which shipping is free (default: 50)
//! - `STOREFRONT_FLAT_SHIPPING` - Shipping fee below the threshold (default: 9.99)
//! - `STOREFRONT_CONTACT_EMAIL` - Address shown in the home page contact section
//! - `STOREFRONT_TRUST_PROXY_HEADERS` - Key rate limits on `CF-Connecting-IP`,
//!   `X-Forwarded-For` and `X-Real-IP` (default: false; enable only behind a
//!   proxy that overwrites them)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use lese_core::{Currency, PricingPolicy};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Prefix of the newer publishable (browser-safe) API keys.
const PUBLISHABLE_KEY_PREFIX: &str = "sb_publishable_";
/// Prefix of the newer secret API keys, which bypass row-level security.
const SECRET_KEY_PREFIX: &str = "sb_secret_";

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
    /// `PostgreSQL` connection URL for the session store (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Managed backend configuration
    pub backend: BackendConfig,
    /// Store-wide pricing rules
    pub pricing: PricingPolicy,
    /// Public contact address; the contact section hides the mail link without it
    pub contact_email: Option<String>,
    /// Whether rate limits trust client IP headers set by a reverse proxy
    pub trust_proxy_headers: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Managed backend configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project URL without trailing slash
    pub url: String,
    /// Anon or publishable key, sent as `apikey` on every request
    pub anon_key: SecretString,
    /// Storage bucket holding product images
    pub storage_bucket: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("storage_bucket", &self.storage_bucket)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the backend key is a placeholder or a service key.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = normalize_url("STOREFRONT_BASE_URL", &get_required_env("STOREFRONT_BASE_URL")?)?;

        let backend = BackendConfig::from_env()?;
        let pricing = PricingPolicy {
            tax_rate: parse_env::<Decimal>("STOREFRONT_TAX_RATE", "0.08")?,
            free_shipping_threshold: parse_env::<Decimal>(
                "STOREFRONT_FREE_SHIPPING_THRESHOLD",
                "50",
            )?,
            flat_shipping: parse_env::<Decimal>("STOREFRONT_FLAT_SHIPPING", "9.99")?,
            currency: parse_env::<Currency>("STOREFRONT_CURRENCY", "TRY")?,
        };
        validate_pricing(&pricing)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            backend,
            pricing,
            contact_email: get_optional_env("STOREFRONT_CONTACT_EMAIL"),
            trust_proxy_headers: parse_env::<bool>("STOREFRONT_TRUST_PROXY_HEADERS", "false")?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a path on this storefront.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = normalize_url("BACKEND_URL", &get_required_env("BACKEND_URL")?)?;
        let anon_key = get_required_env("BACKEND_ANON_KEY")?;
        validate_anon_key(&anon_key, "BACKEND_ANON_KEY")?;

        Ok(Self {
            url,
            anon_key: SecretString::from(anon_key),
            storage_bucket: get_env_or_default("BACKEND_STORAGE_BUCKET", "prdimgs"),
        })
    }

    /// Host of the backend, used to allow its storage images in the CSP.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
    }

    /// Expose the key for request headers.
    #[must_use]
    pub fn anon_key(&self) -> &str {
        self.anon_key.expose_secret()
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

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Require an absolute http(s) URL and strip any trailing slash.
fn normalize_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

fn validate_pricing(pricing: &PricingPolicy) -> Result<(), ConfigError> {
    if pricing.tax_rate.is_sign_negative() || pricing.tax_rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_TAX_RATE".to_string(),
            "must be a fraction between 0 and 1".to_string(),
        ));
    }
    if pricing.flat_shipping.is_sign_negative() || pricing.free_shipping_threshold.is_sign_negative()
    {
        return Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_FLAT_SHIPPING".to_string(),
            "shipping amounts cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Check the backend key is a real anon/publishable key.
///
/// Service keys bypass row-level security, which the storefront relies on
/// for every user-scoped read and write.
fn validate_anon_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    let key = key.trim();
    if key.starts_with(PUBLISHABLE_KEY_PREFIX) && key.len() > PUBLISHABLE_KEY_PREFIX.len() {
        return Ok(());
    }
    if key.starts_with(SECRET_KEY_PREFIX) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "secret keys must never be configured on the storefront".to_string(),
        ));
    }

    let segments: Vec<&str> = key.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "appears to be a placeholder (expected a JWT or publishable key)".to_string(),
        ));
    };

    let role = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .and_then(|claims| claims.get("role").and_then(|r| r.as_str()).map(String::from))
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                var_name.to_string(),
                "JWT payload is not readable".to_string(),
            )
        })?;

    if role == "service_role" {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "service_role keys bypass row-level security; use the anon key".to_string(),
        ));
    }
    Ok(())
}

/// Production-shaped configuration for unit tests elsewhere in the crate.
#[cfg(test)]
pub(crate) fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/lese"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "https://lesemetalcraft.com".to_string(),
        backend: BackendConfig {
            url: "https://abcd.supabase.co".to_string(),
            anon_key: SecretString::from("sb_publishable_test"),
            storage_bucket: "prdimgs".to_string(),
        },
        pricing: PricingPolicy::default(),
        contact_email: Some("info@lesemetalcraft.com".to_string()),
        trust_proxy_headers: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jwt_with_role(role: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload =
            URL_SAFE_NO_PAD.encode(format!(r#"{{"iss":"backend","role":"{role}"}}"#).as_bytes());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    fn sample_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/lese"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            backend: BackendConfig {
                url: "https://abcd.supabase.co".to_string(),
                anon_key: SecretString::from(jwt_with_role("anon")),
                storage_bucket: "prdimgs".to_string(),
            },
            pricing: PricingPolicy::default(),
            contact_email: None,
            trust_proxy_headers: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_anon_jwt_is_accepted() {
        assert!(validate_anon_key(&jwt_with_role("anon"), "K").is_ok());
    }

    #[test]
    fn test_service_role_jwt_is_rejected() {
        let err = validate_anon_key(&jwt_with_role("service_role"), "K").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_publishable_and_secret_prefixes() {
        assert!(validate_anon_key("sb_publishable_abc123", "K").is_ok());
        assert!(matches!(
            validate_anon_key("sb_secret_abc123", "K"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }

    #[test]
    fn test_placeholder_key_is_rejected() {
        assert!(matches!(
            validate_anon_key("your-anon-key", "K"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(matches!(
            validate_anon_key("a.!!!.c", "K"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_normalize_url_strips_trailing_slash() {
        assert_eq!(
            normalize_url("U", "https://lesemetalcraft.com/").unwrap(),
            "https://lesemetalcraft.com"
        );
        assert!(normalize_url("U", "ftp://example.com").is_err());
        assert!(normalize_url("U", "not a url").is_err());
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u16>("STOREFRONT_PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("STOREFRONT_PORT"));
        assert_eq!(parse_value::<Decimal>("T", " 0.18 ").unwrap(), Decimal::new(18, 2));
    }

    #[test]
    fn test_proxy_header_trust_flag() {
        assert!(!parse_value::<bool>("STOREFRONT_TRUST_PROXY_HEADERS", "false").unwrap());
        assert!(parse_value::<bool>("STOREFRONT_TRUST_PROXY_HEADERS", "true").unwrap());
        assert!(parse_value::<bool>("STOREFRONT_TRUST_PROXY_HEADERS", "yes").is_err());
        assert!(!test_config().trust_proxy_headers);
    }

    #[test]
    fn test_validate_pricing_bounds() {
        assert!(validate_pricing(&PricingPolicy::default()).is_ok());
        let bad = PricingPolicy {
            tax_rate: Decimal::new(18, 0),
            ..PricingPolicy::default()
        };
        assert!(validate_pricing(&bad).is_err());
    }

    #[test]
    fn test_socket_addr_and_urls() {
        let config = sample_config();
        assert_eq!(config.socket_addr().port(), 3000);
        assert!(!config.is_https());
        assert_eq!(config.absolute_url("/shop"), "http://localhost:3000/shop");
        assert_eq!(config.backend.host().as_deref(), Some("abcd.supabase.co"));
    }

    #[test]
    fn test_backend_config_debug_redacts_key() {
        let config = sample_config();
        let key = config.backend.anon_key().to_string();
        let debug_output = format!("{:?}", config.backend);
        assert!(debug_output.contains("abcd.supabase.co"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(&key));
    }
}
