//! Cache-aside store for upstream weather payloads.
//!
//! [`CacheStore`] is the only type the rest of the server talks to. It never
//! fails: backend errors are logged and turned into a miss (for reads) or
//! dropped (for writes and deletes), so a cache outage degrades to "always
//! fetch upstream" instead of failing requests.
//!
//! # Backends
//!
//! - [`RedisBackend`] - shared Redis, values stored as JSON text with `SET .. EX`
//! - [`MemoryBackend`] - in-process `moka` cache with per-entry expiry

mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use nimbus_core::{CacheKey, WeatherPayload};

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;
use crate::config::{CacheBackendKind, CacheConfig};

/// Errors raised by a [`CacheBackend`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis command or connection failure.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Stored bytes were not valid JSON.
    #[error("cached value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value storage with expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read a value. `Ok(None)` means absent or expired.
    async fn get(&self, key: &str) -> Result<Option<WeatherPayload>, CacheError>;

    /// Write a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &WeatherPayload, ttl: Duration)
    -> Result<(), CacheError>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Best-effort cache facade.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl CacheStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    /// Build the backend selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the Redis URL is invalid or the initial
    /// connection cannot be established.
    pub async fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Redis => Arc::new(RedisBackend::connect(&config.redis_url).await?),
            CacheBackendKind::Memory => Arc::new(MemoryBackend::new(config.max_capacity)),
        };
        Ok(Self::new(backend, config.default_ttl))
    }

    /// TTL used when a write does not name one.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Read a payload; any backend failure is reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<WeatherPayload> {
        match self.backend.get(key.as_str()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to get cache entry");
                None
            }
        }
    }

    /// Write a payload. `None` uses the default TTL.
    pub async fn set(&self, key: &CacheKey, value: &WeatherPayload, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(e) = self.backend.set(key.as_str(), value, ttl).await {
            tracing::error!(key = %key, error = %e, "Failed to set cache entry");
        }
    }

    /// Remove a payload.
    pub async fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.backend.delete(key.as_str()).await {
            tracing::error!(key = %key, error = %e, "Failed to delete cache entry");
        }
    }
}
