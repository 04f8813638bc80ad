//! Public weather lookups.
//!
//! Both handlers return the upstream JSON untouched, served from cache when
//! a fresh copy exists.

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};

use nimbus_core::{CityName, WeatherPayload};

use crate::error::{AppError, Result};
use crate::state::AppState;

fn parse_city(city: std::result::Result<Path<String>, PathRejection>) -> Result<CityName> {
    let Path(raw) = city?;
    CityName::parse(&raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// `GET /weather/{city}`
pub async fn current(
    State(state): State<AppState>,
    city: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<WeatherPayload>> {
    let city = parse_city(city)?;
    Ok(Json(state.weather().current_weather(&city).await?))
}

/// `GET /forecast/{city}`
pub async fn forecast(
    State(state): State<AppState>,
    city: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<WeatherPayload>> {
    let city = parse_city(city)?;
    Ok(Json(state.weather().forecast(&city).await?))
}
