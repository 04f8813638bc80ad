//! Favorite locations per user.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use nimbus_core::{CityName, LocationId, UserId, WeatherPayload};

use crate::db::{LocationRepository, RepositoryError, UserRepository};
use crate::models::Location;

/// Errors that can occur while managing favorites.
#[derive(Debug, Error)]
pub enum FavoritesError {
    /// Missing owner or missing/foreign location.
    #[error("{0}")]
    NotFound(&'static str),

    /// The owner already saved this city.
    #[error("{0}")]
    Conflict(&'static str),

    /// Persistence failed.
    #[error("{message}")]
    Internal {
        message: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl FavoritesError {
    const fn internal(message: &'static str, source: RepositoryError) -> Self {
        Self::Internal { message, source }
    }
}

/// CRUD over a user's favorite cities.
#[derive(Clone)]
pub struct FavoritesService {
    users: Arc<dyn UserRepository>,
    locations: Arc<dyn LocationRepository>,
}

impl FavoritesService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, locations: Arc<dyn LocationRepository>) -> Self {
        Self { users, locations }
    }

    /// Save `city` for `owner`.
    ///
    /// Cities are compared exactly, so `"Paris"` and `"paris"` are distinct.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the owner does not exist
    /// - `Conflict` if the owner already has this city (nothing is written)
    /// - `Internal` if persistence fails
    #[instrument(skip(self), fields(user_id = %owner, city = %city))]
    pub async fn create(&self, owner: UserId, city: &CityName) -> Result<Location, FavoritesError> {
        tracing::info!("Adding favorite location");

        let user = self
            .users
            .get_by_id(owner)
            .await
            .map_err(|e| FavoritesError::internal("Unable to add location", e))?;
        if user.is_none() {
            tracing::warn!("Owner not found");
            return Err(FavoritesError::NotFound("User not found"));
        }

        let existing = self
            .locations
            .find_by_owner_and_city(owner, city)
            .await
            .map_err(|e| FavoritesError::internal("Unable to add location", e))?;
        if existing.is_some() {
            tracing::warn!("Location already assigned");
            return Err(FavoritesError::Conflict("Location already assigned"));
        }

        match self.locations.insert(owner, city).await {
            Ok(location) => {
                tracing::info!(location_id = %location.id, "Favorite location added");
                Ok(location)
            }
            // Lost a race with a concurrent insert of the same city
            Err(RepositoryError::Conflict(_)) => {
                Err(FavoritesError::Conflict("Location already assigned"))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to insert location");
                Err(FavoritesError::internal("Unable to add location", e))
            }
        }
    }

    /// All of the owner's favorites, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the query fails.
    #[instrument(skip(self), fields(user_id = %owner))]
    pub async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Location>, FavoritesError> {
        self.locations
            .list_by_owner(owner)
            .await
            .map_err(|e| FavoritesError::internal("Unable to list locations", e))
    }

    /// Delete the location `id` if `owner` owns it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no location matches both id and owner
    /// - `Internal` if the delete fails
    #[instrument(skip(self), fields(location_id = %id, user_id = %owner))]
    pub async fn remove(&self, id: LocationId, owner: UserId) -> Result<(), FavoritesError> {
        let affected = self
            .locations
            .delete(id, owner)
            .await
            .map_err(|e| FavoritesError::internal("Unable to remove location", e))?;

        if affected == 0 {
            tracing::warn!("Location not found for owner");
            return Err(FavoritesError::NotFound("Location not found"));
        }

        tracing::info!("Favorite location removed");
        Ok(())
    }

    /// Every stored location. Used by the refresh job.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Location>, FavoritesError> {
        self.locations
            .list_all()
            .await
            .map_err(|e| FavoritesError::internal("Unable to list locations", e))
    }

    /// Store a freshly fetched payload on a location.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the location no longer exists
    /// - `Internal` if the update fails
    #[instrument(skip(self, payload), fields(location_id = %id))]
    pub async fn update_weather(
        &self,
        id: LocationId,
        payload: &WeatherPayload,
    ) -> Result<(), FavoritesError> {
        let affected = self
            .locations
            .update_weather(id, payload, Utc::now())
            .await
            .map_err(|e| FavoritesError::internal("Unable to update location weather", e))?;

        if affected == 0 {
            return Err(FavoritesError::NotFound("Location not found"));
        }
        Ok(())
    }
}
