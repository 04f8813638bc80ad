//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health            - Liveness
//! GET    /health/ready      - Database reachability
//!
//! # Auth (auth rate limit)
//! POST   /auth/register     - Create an account
//! POST   /auth/login        - Issue a bearer token
//!
//! # Favorites (bearer token)
//! GET    /locations         - List the caller's favorites
//! POST   /locations         - Save a favorite
//! DELETE /locations/{id}    - Remove a favorite
//!
//! # Public (api rate limit)
//! GET    /weather/{city}    - Current weather, raw upstream JSON
//! GET    /forecast/{city}   - Forecast, raw upstream JSON
//! GET    /graphql           - Playground
//! POST   /graphql           - GraphQL endpoint
//! ```

pub mod auth;
pub mod health;
pub mod locations;
pub mod weather;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::graphql;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter(trust_proxy_headers))
}

/// Create the favorite location routes router.
pub fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(locations::index).post(locations::create))
        .route("/{id}", delete(locations::remove))
}

/// Create the public lookup routes router (REST and GraphQL).
pub fn public_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/weather/{city}", get(weather::current))
        .route("/forecast/{city}", get(weather::forecast))
        .route("/graphql", get(graphql::playground).post(graphql::handler))
        .layer(api_rate_limiter(trust_proxy_headers))
}

/// Create all routes for the service.
///
/// `trust_proxy_headers` selects how rate limiters identify a client, see
/// [`crate::middleware::ClientIpKeyExtractor`].
pub fn routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes(trust_proxy_headers))
        .nest("/locations", location_routes())
        .merge(public_routes(trust_proxy_headers))
}
