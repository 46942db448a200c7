//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//! - `LARKSPUR_API_URL` - Backend REST base URL (default: `http://localhost:5000/api`)
//! - `LARKSPUR_DATA_DIR` - Directory for the local cache; unset keeps everything in memory
//! - `LARKSPUR_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `LARKSPUR_PRODUCT_CACHE_TTL_SECS` - Product listing cache window (default: 3600)
//! - `LARKSPUR_SEARCH_DEBOUNCE_MS` - Search debounce window (default: 300)
//! - `LARKSPUR_HEALTH_CHECK_INTERVAL_SECS` - Server-availability check debounce (default: 30)
//! - `LARKSPUR_ADMIN_RETRY_ATTEMPTS` - Attempts for admin user listing (default: 3)
//! - `LARKSPUR_ADMIN_RETRY_BASE_MS` - First backoff delay for admin listing (default: 500)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend REST base URL, including the `/api` prefix
    pub api_url: Url,
    /// Directory for the persistent local cache (`None` = in-memory)
    pub data_dir: Option<PathBuf>,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
    /// How long a product listing stays fresh
    pub product_cache_ttl: Duration,
    /// Quiet period before a search request is issued
    pub search_debounce: Duration,
    /// How long a server-availability check result is reused
    pub health_check_interval: Duration,
    /// Retry policy for the admin user listing
    pub admin_retry: RetryConfig,
}

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each later attempt
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl StorefrontConfig {
    /// Configuration with default timings for the given backend URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            data_dir: None,
            request_timeout: Duration::from_secs(30),
            product_cache_ttl: Duration::from_secs(60 * 60),
            search_debounce: Duration::from_millis(300),
            health_check_interval: Duration::from_secs(30),
            admin_retry: RetryConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_url(
            "LARKSPUR_API_URL",
            &get_env_or_default("LARKSPUR_API_URL", DEFAULT_API_URL),
        )?;
        let mut config = Self::new(api_url);

        config.data_dir = get_optional_env("LARKSPUR_DATA_DIR").map(PathBuf::from);
        config.request_timeout =
            Duration::from_secs(get_parsed_or("LARKSPUR_REQUEST_TIMEOUT_SECS", 30)?);
        config.product_cache_ttl =
            Duration::from_secs(get_parsed_or("LARKSPUR_PRODUCT_CACHE_TTL_SECS", 3600)?);
        config.search_debounce =
            Duration::from_millis(get_parsed_or("LARKSPUR_SEARCH_DEBOUNCE_MS", 300)?);
        config.health_check_interval =
            Duration::from_secs(get_parsed_or("LARKSPUR_HEALTH_CHECK_INTERVAL_SECS", 30)?);
        config.admin_retry = RetryConfig {
            attempts: get_parsed_or("LARKSPUR_ADMIN_RETRY_ATTEMPTS", 3)?,
            base_delay: Duration::from_millis(get_parsed_or("LARKSPUR_ADMIN_RETRY_BASE_MS", 500)?),
        };

        if config.admin_retry.attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LARKSPUR_ADMIN_RETRY_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional numeric variable, falling back to a default.
fn get_parsed_or<T>(key: &str, default: T) -> Result<T, ConfigError>
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

/// Parse a base URL, requiring an http(s) scheme.
fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}
