//! Favorite location domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nimbus_core::{CityName, LocationId, UserId, WeatherPayload};

/// A city saved by a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    /// Unique location ID.
    pub id: LocationId,
    /// Owning user.
    pub user_id: UserId,
    /// City exactly as the user entered it.
    pub city: CityName,
    /// Last payload written by the refresh job, if any.
    pub weather: Option<WeatherPayload>,
    /// When `weather` was last written.
    pub weather_updated_at: Option<DateTime<Utc>>,
    /// When the favorite was saved.
    pub created_at: DateTime<Utc>,
}
