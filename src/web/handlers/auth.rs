//! Login and current-user handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::require_field;
use super::users::{SingleUserResponse, UserResponse};
use crate::web::error::{AuthFailure, WebError};
use crate::web::extract::AuthUser;
use crate::web::state::WebAppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

/// Exchange a username and password for a bearer token.
pub async fn login(
    State(state): State<WebAppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, WebError> {
    require_field(&req.username, "username")?;
    require_field(&req.password, "password")?;

    let user = state
        .users()
        .get_by_username(req.username.trim())?
        .filter(|user| user.verify_password(&req.password))
        .ok_or_else(|| {
            tracing::info!(username = %req.username, "Failed login attempt");
            WebError::Unauthorized(AuthFailure::InvalidCredentials)
        })?;

    let now = chrono::Utc::now();
    let token = state.signer().issue_at(&user, now)?;
    let expires_at = (now + state.signer().ttl()).to_rfc3339();

    tracing::debug!(username = %user.username, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        success: true,
        token,
        expires_at,
        user: user.into(),
    }))
}

/// The account behind the presented token.
pub async fn me(
    AuthUser(claims): AuthUser,
    State(state): State<WebAppState>,
) -> Result<Json<SingleUserResponse>, WebError> {
    let user = state
        .users()
        .get_by_id(claims.sub)?
        .ok_or_else(|| WebError::NotFound(format!("User {} not found", claims.sub)))?;

    Ok(Json(SingleUserResponse {
        success: true,
        user: user.into(),
    }))
}
