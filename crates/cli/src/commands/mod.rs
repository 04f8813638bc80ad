//! Subcommand implementations.

pub mod migrate;
pub mod refresh;

use thiserror::Error;

use nimbus_server::cache::CacheError;
use nimbus_server::config::ConfigError;
use nimbus_server::services::FavoritesError;
use nimbus_server::weather::UpstreamError;

/// Errors a subcommand can end with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Weather client error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Refresh failed: {0}")]
    Refresh(#[from] FavoritesError),
}
