//! In-memory repositories for tests.
//!
//! Mirror the `PostgreSQL` semantics the services rely on: serial ids,
//! unique usernames, unique `(user_id, city)` and row counts from deletes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use nimbus_core::{CityName, LocationId, UserId, Username, WeatherPayload};

use super::{LocationRepository, RepositoryError, UserRepository};
use crate::models::{Location, User};

#[derive(Default)]
struct UserTable {
    next_id: i32,
    rows: BTreeMap<UserId, (User, String)>,
}

/// [`UserRepository`] backed by a map.
#[derive(Default)]
pub struct MemoryUserRepository {
    table: RwLock<UserTable>,
}

impl MemoryUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(
        &self,
        username: &Username,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|(u, _)| &u.username == username) {
            return Err(RepositoryError::Conflict("username already exists".to_owned()));
        }

        table.next_id += 1;
        let user = User {
            id: UserId::new(table.next_id),
            username: username.clone(),
            created_at: Utc::now(),
        };
        table
            .rows
            .insert(user.id, (user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).map(|(u, _)| u.clone()))
    }

    async fn get_with_password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|(u, _)| &u.username == username)
            .cloned())
    }
}

#[derive(Default)]
struct LocationTable {
    next_id: i32,
    rows: BTreeMap<LocationId, Location>,
}

/// [`LocationRepository`] backed by a map.
#[derive(Default)]
pub struct MemoryLocationRepository {
    table: RwLock<LocationTable>,
}

impl MemoryLocationRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored locations.
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    /// Whether no locations are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LocationRepository for MemoryLocationRepository {
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Location>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|l| l.user_id == owner)
            .cloned()
            .collect())
    }

    async fn find_by_owner_and_city(
        &self,
        owner: UserId,
        city: &CityName,
    ) -> Result<Option<Location>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|l| l.user_id == owner && &l.city == city)
            .cloned())
    }

    async fn insert(&self, owner: UserId, city: &CityName) -> Result<Location, RepositoryError> {
        let mut table = self.table.write().await;
        if table
            .rows
            .values()
            .any(|l| l.user_id == owner && &l.city == city)
        {
            return Err(RepositoryError::Conflict("location already exists".to_owned()));
        }

        table.next_id += 1;
        let location = Location {
            id: LocationId::new(table.next_id),
            user_id: owner,
            city: city.clone(),
            weather: None,
            weather_updated_at: None,
            created_at: Utc::now(),
        };
        table.rows.insert(location.id, location.clone());
        Ok(location)
    }

    async fn delete(&self, id: LocationId, owner: UserId) -> Result<u64, RepositoryError> {
        let mut table = self.table.write().await;
        match table.rows.get(&id) {
            Some(l) if l.user_id == owner => {
                table.rows.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn list_all(&self) -> Result<Vec<Location>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.values().cloned().collect())
    }

    async fn update_weather(
        &self,
        id: LocationId,
        payload: &WeatherPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut table = self.table.write().await;
        Ok(table.rows.get_mut(&id).map_or(0, |l| {
            l.weather = Some(payload.clone());
            l.weather_updated_at = Some(updated_at);
            1
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_locations_unique_per_owner() {
        let repo = MemoryLocationRepository::new();
        let paris = CityName::parse("Paris").unwrap();

        repo.insert(UserId::new(1), &paris).await.unwrap();
        assert!(matches!(
            repo.insert(UserId::new(1), &paris).await,
            Err(RepositoryError::Conflict(_))
        ));
        // Another owner may save the same city
        repo.insert(UserId::new(2), &paris).await.unwrap();
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_delete_scoped_to_owner() {
        let repo = MemoryLocationRepository::new();
        let loc = repo
            .insert(UserId::new(1), &CityName::parse("Rome").unwrap())
            .await
            .unwrap();

        assert_eq!(repo.delete(loc.id, UserId::new(2)).await.unwrap(), 0);
        assert_eq!(repo.delete(loc.id, UserId::new(1)).await.unwrap(), 1);
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_usernames_unique() {
        let repo = MemoryUserRepository::new();
        let name = Username::parse("alice").unwrap();

        let user = repo.create(&name, "hash").await.unwrap();
        assert!(matches!(
            repo.create(&name, "hash").await,
            Err(RepositoryError::Conflict(_))
        ));

        let (found, hash) = repo.get_with_password_hash(&name).await.unwrap().unwrap();
        assert_eq!(found, user);
        assert_eq!(hash, "hash");
    }
}
