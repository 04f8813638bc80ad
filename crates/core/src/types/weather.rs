//! Weather payloads and the cache keys they are stored under.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::city::CityName;

/// The upstream provider's JSON body, kept verbatim.
///
/// Nothing below the GraphQL resolvers looks inside it; the cache and the
/// database store it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherPayload(serde_json::Value);

impl WeatherPayload {
    /// Wrap a JSON value.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON.
    #[must_use]
    pub const fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for WeatherPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Which upstream resource a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherKind {
    /// Current conditions.
    Current,
    /// Multi-day forecast.
    Forecast,
}

impl WeatherKind {
    /// Cache key namespace.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Current => "weather",
            Self::Forecast => "forecast",
        }
    }

    /// Upstream path segment, relative to the provider base URL.
    #[must_use]
    pub const fn upstream_path(self) -> &'static str {
        match self {
            Self::Current => "weather",
            Self::Forecast => "forecast",
        }
    }
}

impl fmt::Display for WeatherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// A `"<namespace>:<lowercased city>"` cache key.
///
/// ```
/// use nimbus_core::{CacheKey, CityName, WeatherKind};
///
/// let city = CityName::parse("London").unwrap();
/// assert_eq!(CacheKey::new(WeatherKind::Current, &city).as_str(), "weather:london");
/// assert_eq!(CacheKey::new(WeatherKind::Forecast, &city).as_str(), "forecast:london");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for `kind` and `city`.
    #[must_use]
    pub fn new(kind: WeatherKind, city: &CityName) -> Self {
        Self(format!("{}:{}", kind.namespace(), city.normalized()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
