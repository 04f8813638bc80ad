//! GraphQL endpoint.
//!
//! The schema carries the favorites and weather services as context data.
//! The caller, when a valid bearer token is present, is attached per request
//! as an [`AuthenticatedUser`]. Failures carry an `extensions.code`.

mod types;

pub use types::{ForecastItem, LocationObject, Weather};

use async_graphql::{
    Context, EmptySubscription, Error, ErrorExtensions, Object, Schema,
    http::{GraphQLPlaygroundConfig, playground_source},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Html,
};

use nimbus_core::{CityName, LocationId};

use crate::error::AppError;
use crate::middleware::OptionalUser;
use crate::services::auth::AuthenticatedUser;
use crate::services::{FavoritesError, FavoritesService};
use crate::state::AppState;
use crate::weather::{WeatherError, WeatherService};

/// The service's GraphQL schema.
pub type NimbusSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema around the services resolvers call into.
#[must_use]
pub fn build_schema(favorites: FavoritesService, weather: WeatherService) -> NimbusSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(favorites)
        .data(weather)
        .finish()
}

/// `POST /graphql`
pub async fn handler(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    request: Result<Json<async_graphql::Request>, JsonRejection>,
) -> Result<Json<async_graphql::Response>, AppError> {
    let Json(mut request) = request?;
    if let Some(user) = user {
        request = request.data(user);
    }
    Ok(Json(state.schema().execute(request).await))
}

/// `GET /graphql`
pub async fn playground() -> Html<String> {
    Html(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
}

// =============================================================================
// Error codes
// =============================================================================

fn coded(message: impl Into<String>, code: &'static str) -> Error {
    Error::new(message).extend_with(|_, e| e.set("code", code))
}

fn caller<'a>(ctx: &'a Context<'_>) -> async_graphql::Result<&'a AuthenticatedUser> {
    ctx.data_opt::<AuthenticatedUser>()
        .ok_or_else(|| coded("Unauthorized", "UNAUTHENTICATED"))
}

fn parse_city(city: &str) -> async_graphql::Result<CityName> {
    CityName::parse(city).map_err(|e| coded(e.to_string(), "BAD_USER_INPUT"))
}

fn favorites_error(err: FavoritesError) -> Error {
    match err {
        FavoritesError::NotFound(msg) => coded(msg, "NOT_FOUND"),
        FavoritesError::Conflict(msg) => coded(msg, "CONFLICT"),
        FavoritesError::Internal { message, source } => {
            tracing::error!(error = %source, "{message}");
            coded("Internal server error", "INTERNAL")
        }
    }
}

fn weather_error(err: &WeatherError) -> Error {
    tracing::warn!(error = %err, "Upstream unavailable");
    coded(err.to_string(), "UPSTREAM_UNAVAILABLE")
}

// =============================================================================
// Resolvers
// =============================================================================

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The caller's saved cities.
    async fn favorite_locations(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<LocationObject>> {
        let user = caller(ctx)?;
        let locations = ctx
            .data::<FavoritesService>()?
            .list_by_owner(user.id)
            .await
            .map_err(favorites_error)?;
        Ok(locations.into_iter().map(LocationObject::from).collect())
    }

    /// Current conditions for a city.
    async fn current_weather(
        &self,
        ctx: &Context<'_>,
        city: String,
    ) -> async_graphql::Result<Weather> {
        let city = parse_city(&city)?;
        let payload = ctx
            .data::<WeatherService>()?
            .current_weather(&city)
            .await
            .map_err(|e| weather_error(&e))?;
        Ok(Weather::from_payload(&city, &payload))
    }

    /// Forecast entries for a city.
    async fn forecast(
        &self,
        ctx: &Context<'_>,
        city: String,
    ) -> async_graphql::Result<Vec<ForecastItem>> {
        let city = parse_city(&city)?;
        let payload = ctx
            .data::<WeatherService>()?
            .forecast(&city)
            .await
            .map_err(|e| weather_error(&e))?;
        Ok(ForecastItem::list_from(&payload))
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Save a city for the caller.
    async fn add_favorite_location(
        &self,
        ctx: &Context<'_>,
        city: String,
    ) -> async_graphql::Result<LocationObject> {
        let user = caller(ctx)?;
        let city = parse_city(&city)?;
        let location = ctx
            .data::<FavoritesService>()?
            .create(user.id, &city)
            .await
            .map_err(favorites_error)?;
        Ok(location.into())
    }

    /// Delete one of the caller's saved cities.
    async fn remove_favorite_location(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<bool> {
        let user = caller(ctx)?;
        ctx.data::<FavoritesService>()?
            .remove(LocationId::new(id), user.id)
            .await
            .map_err(favorites_error)?;
        Ok(true)
    }
}
