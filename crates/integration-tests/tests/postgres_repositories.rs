//! `PostgreSQL` repositories against a real database.
//!
//! These tests require a migrated database:
//! - `DATABASE_URL` pointing at it
//! - `nimbus-cli migrate` already applied
//!
//! Run with: `cargo test -p nimbus-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use serde_json::json;
use sqlx::PgPool;

use nimbus_core::{CityName, LocationId, Username, WeatherPayload};
use nimbus_server::db::{
    LocationRepository, PgLocationRepository, PgUserRepository, RepositoryError, UserRepository,
};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&url).await.expect("database reachable")
}

/// Usernames are unique across runs so tests never collide.
fn unique_username() -> Username {
    let suffix = time_suffix();
    Username::parse(&format!("it{suffix}")).unwrap()
}

fn time_suffix() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{:016}", nanos % 10_u128.pow(16))
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_user_roundtrip() {
    let pool = pool().await;
    let users = PgUserRepository::new(pool);
    let username = unique_username();

    let created = users.create(&username, "$argon2id$stub").await.unwrap();
    let fetched = users.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let (user, hash) = users.get_with_password_hash(&username).await.unwrap().unwrap();
    assert_eq!(user.id, created.id);
    assert_eq!(hash, "$argon2id$stub");

    let duplicate = users.create(&username, "$argon2id$stub").await;
    assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_location_lifecycle() {
    let pool = pool().await;
    let users = PgUserRepository::new(pool.clone());
    let locations = PgLocationRepository::new(pool);
    let owner = users.create(&unique_username(), "hash").await.unwrap();
    let paris = CityName::parse("Paris").unwrap();

    let saved = locations.insert(owner.id, &paris).await.unwrap();
    assert_eq!(saved.city, paris);
    assert!(saved.weather.is_none());

    let duplicate = locations.insert(owner.id, &paris).await;
    assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));

    let found = locations.find_by_owner_and_city(owner.id, &paris).await.unwrap();
    assert_eq!(found.map(|l| l.id), Some(saved.id));

    let payload = WeatherPayload::new(json!({"name": "Paris", "main": {"temp": 18.5}}));
    let updated = locations
        .update_weather(saved.id, &payload, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let listed = locations.list_by_owner(owner.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].weather.as_ref(), Some(&payload));
    assert!(listed[0].weather_updated_at.is_some());

    assert_eq!(locations.delete(LocationId::new(i32::MAX), owner.id).await.unwrap(), 0);
    assert_eq!(locations.delete(saved.id, owner.id).await.unwrap(), 1);
    assert!(locations.list_by_owner(owner.id).await.unwrap().is_empty());
}
