//! Cache-first weather lookups.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use nimbus_core::{CacheKey, CityName, WeatherKind, WeatherPayload};

use super::client::{UpstreamError, WeatherProvider};
use crate::cache::CacheStore;

/// A lookup that could not be served from cache or upstream.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Cache miss and the upstream request failed.
    #[error("{} unavailable", .kind.namespace())]
    Unavailable {
        kind: WeatherKind,
        #[source]
        source: UpstreamError,
    },
}

impl WeatherError {
    /// Which lookup failed.
    #[must_use]
    pub const fn kind(&self) -> WeatherKind {
        match self {
            Self::Unavailable { kind, .. } => *kind,
        }
    }
}

/// Read-through weather lookups.
///
/// Any cached value counts as a hit, including JSON `null` and `{}`.
/// Upstream failures are never cached, so the next call retries upstream.
#[derive(Clone)]
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    cache: CacheStore,
}

impl WeatherService {
    #[must_use]
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: CacheStore) -> Self {
        Self { provider, cache }
    }

    /// Current conditions for `city`.
    ///
    /// # Errors
    ///
    /// Returns `WeatherError::Unavailable` on a cache miss followed by an
    /// upstream failure.
    pub async fn current_weather(&self, city: &CityName) -> Result<WeatherPayload, WeatherError> {
        self.lookup(WeatherKind::Current, city).await
    }

    /// Forecast for `city`.
    ///
    /// # Errors
    ///
    /// Returns `WeatherError::Unavailable` on a cache miss followed by an
    /// upstream failure.
    pub async fn forecast(&self, city: &CityName) -> Result<WeatherPayload, WeatherError> {
        self.lookup(WeatherKind::Forecast, city).await
    }

    #[instrument(skip(self), fields(kind = %kind, city = %city))]
    async fn lookup(
        &self,
        kind: WeatherKind,
        city: &CityName,
    ) -> Result<WeatherPayload, WeatherError> {
        let key = CacheKey::new(kind, city);

        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(hit);
        }

        tracing::debug!(key = %key, "Cache miss, fetching upstream");
        let payload = self
            .provider
            .fetch(kind, city)
            .await
            .map_err(|source| {
                tracing::warn!(
                    error = %source,
                    timed_out = source.is_timeout(),
                    "Upstream weather fetch failed"
                );
                WeatherError::Unavailable { kind, source }
            })?;

        self.cache.set(&key, &payload, None).await;
        Ok(payload)
    }
}
