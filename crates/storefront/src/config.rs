//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `RAZORPAY_KEY_ID` - Razorpay API key id (safe to expose in browser)
//! - `RAZORPAY_KEY_SECRET` - Razorpay API key secret (high entropy, server-side only)
//! - `FIREBASE_API_KEY` - Identity Toolkit API key
//! - `CATALOG_BASE_URL` - Base URL of the product catalog service
//!
//! ## Optional
//! - `DIYA_HOST` - Bind address (default: 127.0.0.1)
//! - `DIYA_PORT` - Listen port (default: 3000)
//! - `DIYA_BASE_URL` - Public URL for the storefront (default: http://localhost:3000)
//! - `RAZORPAY_BASE_URL` - Gateway API base (default: https://api.razorpay.com)
//! - `FIREBASE_BASE_URL` - Identity Toolkit base (default: https://identitytoolkit.googleapis.com)
//! - `SHIPPING_FREE_THRESHOLD` - Subtotal above which shipping is free (default: 999)
//! - `SHIPPING_FLAT_FEE` - Flat shipping fee in rupees (default: 50)
//! - `OTP_RESEND_COOLDOWN_SECS` - Wait between OTP sends (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag (default: development)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use diya_core::ShippingPolicy;

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
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Razorpay gateway configuration
    pub razorpay: RazorpayConfig,
    /// Firebase Identity Toolkit configuration
    pub firebase: FirebaseConfig,
    /// Base URL of the product catalog service
    pub catalog_base_url: String,
    /// Shipping fee rules applied to cart totals
    pub shipping: ShippingPolicy,
    /// Wait between OTP sends for one session
    pub otp_resend_cooldown: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: String,
}

/// Razorpay gateway configuration.
///
/// Implements `Debug` manually to redact the key secret.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Gateway API base URL
    pub base_url: String,
    /// API key id, handed to the payment widget in the browser
    pub key_id: String,
    /// API key secret; signs orders and verifies callbacks, server-side only
    pub key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Firebase Identity Toolkit configuration.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Identity Toolkit API base URL
    pub base_url: String,
    /// Identity Toolkit API key
    pub api_key: SecretString,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
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
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("DIYA_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("DIYA_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("DIYA_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("DIYA_PORT".to_string(), e.to_string()))?;
        let base_url = get_env_or_default("DIYA_BASE_URL", "http://localhost:3000");

        let razorpay = RazorpayConfig::from_env()?;
        let firebase = FirebaseConfig::from_env()?;
        let catalog_base_url = get_required_env("CATALOG_BASE_URL")?;

        let shipping = ShippingPolicy {
            free_threshold: get_decimal_or_default("SHIPPING_FREE_THRESHOLD", Decimal::from(999))?,
            flat_fee: get_decimal_or_default("SHIPPING_FLAT_FEE", Decimal::from(50))?,
        };

        let otp_resend_cooldown = Duration::from_secs(
            get_env_or_default("OTP_RESEND_COOLDOWN_SECS", "60")
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("OTP_RESEND_COOLDOWN_SECS".to_string(), e.to_string())
                })?,
        );

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_env_or_default("SENTRY_ENVIRONMENT", "development");

        Ok(Self {
            host,
            port,
            base_url,
            razorpay,
            firebase,
            catalog_base_url,
            shipping,
            otp_resend_cooldown,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("RAZORPAY_BASE_URL", "https://api.razorpay.com"),
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
        })
    }
}

impl FirebaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default(
                "FIREBASE_BASE_URL",
                "https://identitytoolkit.googleapis.com",
            ),
            api_key: get_validated_secret("FIREBASE_API_KEY")?,
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

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable as a decimal, with a default.
fn get_decimal_or_default(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<Decimal>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
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

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real API keys have high entropy)
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
