//! Favorite location repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use nimbus_core::{CityName, LocationId, UserId, WeatherPayload};

use super::{RepositoryError, map_unique_violation};
use crate::models::Location;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
    id: i32,
    user_id: i32,
    city: String,
    weather: Option<Json<serde_json::Value>>,
    weather_updated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LocationRow> for Location {
    type Error = RepositoryError;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        let city = CityName::parse(&row.city).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid city in database: {e}"))
        })?;

        Ok(Self {
            id: LocationId::new(row.id),
            user_id: UserId::new(row.user_id),
            city,
            weather: row.weather.map(|Json(value)| WeatherPayload::new(value)),
            weather_updated_at: row.weather_updated_at,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Favorite location storage.
///
/// Deletes and weather updates report the number of affected rows; mapping
/// zero to "not found" is the caller's decision.
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// All locations owned by `owner`, ordered by id.
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Location>, RepositoryError>;

    /// The owner's location with exactly this city, if any.
    async fn find_by_owner_and_city(
        &self,
        owner: UserId,
        city: &CityName,
    ) -> Result<Option<Location>, RepositoryError>;

    /// Insert a location.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if `(owner, city)` already exists.
    async fn insert(&self, owner: UserId, city: &CityName) -> Result<Location, RepositoryError>;

    /// Delete the location matching both `id` and `owner`.
    async fn delete(&self, id: LocationId, owner: UserId) -> Result<u64, RepositoryError>;

    /// Every location of every user, ordered by id.
    async fn list_all(&self) -> Result<Vec<Location>, RepositoryError>;

    /// Overwrite the stored weather payload and its timestamp.
    async fn update_weather(
        &self,
        id: LocationId,
        payload: &WeatherPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

/// `PostgreSQL`-backed [`LocationRepository`].
#[derive(Clone)]
pub struct PgLocationRepository {
    pool: PgPool,
}

impl PgLocationRepository {
    /// Create a new location repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationRepository for PgLocationRepository {
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Location>, RepositoryError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r"
            SELECT id, user_id, city, weather, weather_updated_at, created_at
            FROM locations
            WHERE user_id = $1
            ORDER BY id
            ",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_owner_and_city(
        &self,
        owner: UserId,
        city: &CityName,
    ) -> Result<Option<Location>, RepositoryError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r"
            SELECT id, user_id, city, weather, weather_updated_at, created_at
            FROM locations
            WHERE user_id = $1 AND city = $2
            ",
        )
        .bind(owner)
        .bind(city.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&self, owner: UserId, city: &CityName) -> Result<Location, RepositoryError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r"
            INSERT INTO locations (user_id, city)
            VALUES ($1, $2)
            RETURNING id, user_id, city, weather, weather_updated_at, created_at
            ",
        )
        .bind(owner)
        .bind(city.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "location"))?;

        row.try_into()
    }

    async fn delete(&self, id: LocationId, owner: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM locations
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> Result<Vec<Location>, RepositoryError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r"
            SELECT id, user_id, city, weather, weather_updated_at, created_at
            FROM locations
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_weather(
        &self,
        id: LocationId,
        payload: &WeatherPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE locations
            SET weather = $2, weather_updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(Json(payload.as_json()))
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
