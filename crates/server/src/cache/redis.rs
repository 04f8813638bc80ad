//! Redis cache backend.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use secrecy::{ExposeSecret, SecretString};

use nimbus_core::WeatherPayload;

use super::{CacheBackend, CacheError};

/// [`CacheBackend`] over a shared Redis instance.
///
/// The connection manager reconnects on its own; clones share one connection.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Open a managed connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Redis` if the URL is invalid or Redis is unreachable.
    pub async fn connect(url: &SecretString) -> Result<Self, CacheError> {
        let client = redis::Client::open(url.expose_secret())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<WeatherPayload>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(CacheError::from)
    }

    async fn set(
        &self,
        key: &str,
        value: &WeatherPayload,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let text = serde_json::to_string(value)?;
        // EX takes whole seconds and rejects zero
        let secs = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        let () = conn.set_ex(key, text, secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let () = conn.del(key).await?;
        Ok(())
    }
}
