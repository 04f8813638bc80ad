//! Favorite location handlers. Every route here requires a bearer token.

use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
};
use serde::Deserialize;

use nimbus_core::{CityName, LocationId};

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::Location;
use crate::state::AppState;

/// Body for saving a favorite.
#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub city: String,
}

/// List the caller's favorites ordered by id.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Location>>> {
    let locations = state.favorites().list_by_owner(user.id).await?;
    Ok(Json(locations))
}

/// Save a city as a favorite.
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<CreateLocationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Location>)> {
    let Json(body) = payload?;
    let city = CityName::parse(&body.city).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let location = state.favorites().create(user.id, &city).await?;
    tracing::info!(user_id = %user.id, location_id = %location.id, "Favorite saved");
    Ok((StatusCode::CREATED, Json(location)))
}

/// Delete one of the caller's favorites.
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    id: std::result::Result<Path<LocationId>, PathRejection>,
) -> Result<StatusCode> {
    let Path(id) = id?;
    state.favorites().remove(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
