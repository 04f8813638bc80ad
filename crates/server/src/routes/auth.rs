//! Account route handlers.
//!
//! Registration and password login. Login answers with a bearer token the
//! caller sends back in `Authorization` on protected routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use nimbus_core::UserId;

use crate::error::Result;
use crate::state::AppState;

/// Credentials for both register and login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Body returned by a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: UserId,
    pub username: String,
}

/// Body returned by a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Create an account.
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredUser>)> {
    let Json(body) = payload?;
    let user = state.auth().register(&body.username, &body.password).await?;

    tracing::info!(user_id = %user.id, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: user.id,
            username: user.username.into_inner(),
        }),
    ))
}

/// Exchange credentials for an access token.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>> {
    let Json(body) = payload?;
    let issued = state.auth().login(&body.username, &body.password).await?;

    Ok(Json(TokenResponse {
        access_token: issued.access_token,
        token_type: "Bearer",
        expires_in: issued.expires_in,
    }))
}
