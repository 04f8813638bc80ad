//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::CacheStore;
use crate::config::ServerConfig;
use crate::db::{LocationRepository, PgLocationRepository, PgUserRepository, UserRepository};
use crate::graphql::{NimbusSchema, build_schema};
use crate::jobs::RefreshJob;
use crate::services::auth::TokenKeys;
use crate::services::{AuthService, FavoritesService};
use crate::weather::{OpenWeatherClient, UpstreamError, WeatherProvider, WeatherService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections, services and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    auth: AuthService,
    favorites: FavoritesService,
    weather: WeatherService,
    refresh: Arc<RefreshJob>,
    schema: NimbusSchema,
}

/// Everything [`AppState::from_parts`] wires together.
pub struct AppParts {
    pub config: ServerConfig,
    pub pool: PgPool,
    pub users: Arc<dyn UserRepository>,
    pub locations: Arc<dyn LocationRepository>,
    pub provider: Arc<dyn WeatherProvider>,
    pub cache: CacheStore,
}

impl AppState {
    /// Create the production state: `PostgreSQL` repositories and the
    /// OpenWeatherMap client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client for the weather provider cannot be built.
    pub fn new(
        config: ServerConfig,
        pool: PgPool,
        cache: CacheStore,
    ) -> Result<Self, UpstreamError> {
        let client = OpenWeatherClient::new(&config.weather)?;
        let provider: Arc<dyn WeatherProvider> = Arc::new(client);

        Ok(Self::from_parts(AppParts {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            locations: Arc::new(PgLocationRepository::new(pool.clone())),
            provider,
            cache,
            config,
            pool,
        }))
    }

    /// Wire services from explicit parts. Tests use this with in-memory
    /// repositories and a fake provider.
    #[must_use]
    pub fn from_parts(parts: AppParts) -> Self {
        let AppParts {
            config,
            pool,
            users,
            locations,
            provider,
            cache,
        } = parts;

        let tokens = TokenKeys::new(&config.auth.jwt_secret, config.auth.token_ttl);
        let auth = AuthService::new(Arc::clone(&users), tokens);
        let favorites = FavoritesService::new(users, locations);
        let weather = WeatherService::new(Arc::clone(&provider), cache.clone());
        let refresh = Arc::new(RefreshJob::new(favorites.clone(), provider, cache));
        let schema = build_schema(favorites.clone(), weather.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                auth,
                favorites,
                weather,
                refresh,
                schema,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn favorites(&self) -> &FavoritesService {
        &self.inner.favorites
    }

    #[must_use]
    pub fn weather(&self) -> &WeatherService {
        &self.inner.weather
    }

    /// Get a handle to the refresh job.
    #[must_use]
    pub fn refresh_job(&self) -> Arc<RefreshJob> {
        Arc::clone(&self.inner.refresh)
    }

    /// Get a reference to the GraphQL schema.
    #[must_use]
    pub fn schema(&self) -> &NimbusSchema {
        &self.inner.schema
    }
}
