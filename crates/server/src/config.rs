//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `OPENWEATHER_API_KEY` - Upstream weather provider API key
//!
//! ## Database
//! - `NIMBUS_DATABASE_URL` or `DATABASE_URL` - `PostgreSQL` connection string
//! - otherwise assembled from `DB_HOST` (db), `DB_PORT` (5432), `DB_USER`
//!   (postgres), `DB_PASS` (postgres) and `DB_NAME` (`weather_db`)
//!
//! ## Optional
//! - `NIMBUS_HOST` - Bind address (default: 127.0.0.1)
//! - `NIMBUS_PORT` - Listen port (default: 3000)
//! - `CACHE_BACKEND` - `redis` or `memory` (default: redis)
//! - `REDIS_URL` - Redis connection string, otherwise `REDIS_HOST` (localhost)
//!   and `REDIS_PORT` (6379)
//! - `CACHE_TTL_SECS` - Default cache entry lifetime (default: 300)
//! - `CACHE_MAX_CAPACITY` - Entry limit for the in-process cache (default: 10000)
//! - `JWT_EXPIRY_SECS` - Access token lifetime (default: 3600)
//! - `OPENWEATHER_BASE_URL` - Provider base URL
//!   (default: <https://api.openweathermap.org/data/2.5>)
//! - `UPSTREAM_TIMEOUT_SECS` - Upstream request timeout (default: 10)
//! - `REFRESH_INTERVAL_SECS` - Refresh job period (default: 3600)
//! - `TRUST_PROXY_HEADERS` - Key rate limits on `CF-Connecting-IP` /
//!   `X-Forwarded-For` / `X-Real-IP` (default: false, socket peer only)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default upstream base URL.
pub const DEFAULT_OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Cache-aside store settings
    pub cache: CacheConfig,
    /// Token issuing settings
    pub auth: AuthConfig,
    /// Upstream weather provider settings
    pub weather: WeatherApiConfig,
    /// Period of the background refresh job
    pub refresh_interval: Duration,
    /// Whether client-supplied proxy headers identify the rate-limit key
    pub trust_proxy_headers: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Which cache backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// Shared Redis instance.
    Redis,
    /// In-process moka cache.
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "moka" => Ok(Self::Memory),
            other => Err(format!("unknown cache backend '{other}' (expected redis or memory)")),
        }
    }
}

/// Cache-aside store configuration.
#[derive(Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Redis connection URL (may contain a password)
    pub redis_url: SecretString,
    /// TTL applied when a write does not name one
    pub default_ttl: Duration,
    /// Entry limit for the memory backend
    pub max_capacity: u64,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("backend", &self.backend)
            .field("redis_url", &"[REDACTED]")
            .field("default_ttl", &self.default_ttl)
            .field("max_capacity", &self.max_capacity)
            .finish()
    }
}

/// Access token configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC signing secret
    pub jwt_secret: SecretString,
    /// Lifetime of issued tokens
    pub token_ttl: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// Upstream weather provider configuration.
#[derive(Clone)]
pub struct WeatherApiConfig {
    /// Base URL, e.g. `https://api.openweathermap.org/data/2.5`
    pub base_url: Url,
    /// Provider API key, sent as the `appid` query parameter
    pub api_key: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for WeatherApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServerConfig {
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

        let database_url = get_database_url("NIMBUS_DATABASE_URL");
        let host = parse_env_or_default::<IpAddr>("NIMBUS_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("NIMBUS_PORT", "3000")?;

        let cache = CacheConfig::from_env()?;
        let auth = AuthConfig::from_env()?;
        let weather = WeatherApiConfig::from_env()?;
        let refresh_interval = get_duration_secs("REFRESH_INTERVAL_SECS", "3600")?;
        let trust_proxy_headers = parse_env_or_default::<bool>("TRUST_PROXY_HEADERS", "false")?;

        Ok(Self {
            database_url,
            host,
            port,
            cache,
            auth,
            weather,
            refresh_interval,
            trust_proxy_headers,
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

/// Load only the database URL, for tools that never serve traffic.
///
/// Reads `.env` like [`ServerConfig::from_env`] and resolves the URL the
/// same way, without requiring the token or upstream secrets.
#[must_use]
pub fn database_url_from_env() -> SecretString {
    let _ = dotenvy::dotenv();
    get_database_url("NIMBUS_DATABASE_URL")
}

impl CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = parse_env_or_default::<CacheBackendKind>("CACHE_BACKEND", "redis")?;
        let redis_url = get_optional_env("REDIS_URL").unwrap_or_else(|| {
            let host = get_env_or_default("REDIS_HOST", "localhost");
            let port = get_env_or_default("REDIS_PORT", "6379");
            format!("redis://{host}:{port}")
        });

        Ok(Self {
            backend,
            redis_url: SecretString::from(redis_url),
            default_ttl: get_duration_secs("CACHE_TTL_SECS", "300")?,
            max_capacity: parse_env_or_default::<u64>("CACHE_MAX_CAPACITY", "10000")?,
        })
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "JWT_SECRET")?;

        Ok(Self {
            jwt_secret,
            token_ttl: get_duration_secs("JWT_EXPIRY_SECS", "3600")?,
        })
    }
}

impl WeatherApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            parse_env_or_default::<Url>("OPENWEATHER_BASE_URL", DEFAULT_OPENWEATHER_BASE_URL)?;

        Ok(Self {
            base_url,
            api_key: get_required_secret("OPENWEATHER_API_KEY")?,
            timeout: get_duration_secs("UPSTREAM_TIMEOUT_SECS", "10")?,
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

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get the database URL, falling back to `DATABASE_URL` and then to the
/// discrete `DB_*` variables.
fn get_database_url(primary_key: &str) -> SecretString {
    if let Ok(value) = std::env::var(primary_key) {
        return SecretString::from(value);
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return SecretString::from(value);
    }
    SecretString::from(assemble_database_url(
        &get_env_or_default("DB_HOST", "db"),
        &get_env_or_default("DB_PORT", "5432"),
        &get_env_or_default("DB_USER", "postgres"),
        &get_env_or_default("DB_PASS", "postgres"),
        &get_env_or_default("DB_NAME", "weather_db"),
    ))
}

/// Build a `postgres://` URL from its parts.
fn assemble_database_url(host: &str, port: &str, user: &str, pass: &str, name: &str) -> String {
    format!("postgres://{user}:{pass}@{host}:{port}/{name}")
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a whole number of seconds; zero is rejected.
fn get_duration_secs(key: &str, default: &str) -> Result<Duration, ConfigError> {
    let secs = parse_env_or_default::<u64>(key, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Validate that a JWT secret meets minimum length requirements.
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
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
                "entropy too low ({entropy:.2} bits/char, need >= \
                 {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
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
