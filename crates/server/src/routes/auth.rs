//! Registration, verification and login endpoints.
//!
//! All three answer `201 Created` on success.

use axum::{Json, extract::State, http::StatusCode};

use crate::error::Result;
use crate::models::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest, VerifyRequest};
use crate::routes::extract::ApiJson;
use crate::state::AppState;

/// Stage a registration and email a verification code.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let response = state.auth().register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Redeem a verification code; creates the user and returns a token.
pub async fn verify(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let response = state.auth().verify(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Exchange email and password for a token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let response = state.auth().login(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
