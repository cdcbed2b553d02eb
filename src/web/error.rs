//! Web error types for the examroom API.
//!
//! Every error renders as the standard envelope
//! `{"success": false, "error": ..., "code": ..., "details": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::data::DatabaseError;
use crate::scoring::ScoringError;

/// Why a request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidToken,
    TokenExpired,
    InvalidCredentials,
}

impl AuthFailure {
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::TokenExpired => "token_expired",
            AuthFailure::InvalidCredentials => "invalid_credentials",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            AuthFailure::MissingToken => "Bearer token is required",
            AuthFailure::InvalidToken => "Bearer token is invalid",
            AuthFailure::TokenExpired => "Bearer token has expired",
            AuthFailure::InvalidCredentials => "Invalid username or password",
        };
        f.write_str(message)
    }
}

/// Error type for web API operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request with validation error.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid or expired credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(AuthFailure),

    /// Authenticated but not allowed (wrong role).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict error (e.g., duplicate username, second submission).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match &self {
            WebError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "Not Found",
                "not_found",
                Some(msg.clone()),
            ),
            WebError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "Bad Request",
                "bad_request",
                Some(msg.clone()),
            ),
            WebError::Unauthorized(failure) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                failure.code(),
                Some(failure.to_string()),
            ),
            WebError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                "forbidden",
                Some(msg.clone()),
            ),
            WebError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "Conflict",
                "conflict",
                Some(msg.clone()),
            ),
            WebError::Internal(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "internal",
                    None,
                )
            }
            WebError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database Error",
                    "database",
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error_message.to_string(),
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<AuthError> for WebError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired => WebError::Unauthorized(AuthFailure::TokenExpired),
            AuthError::Malformed | AuthError::InvalidSignature => {
                WebError::Unauthorized(AuthFailure::InvalidToken)
            }
            AuthError::Key(_) | AuthError::Encoding(_) => WebError::Internal(err.to_string()),
        }
    }
}

impl From<ScoringError> for WebError {
    fn from(err: ScoringError) -> Self {
        WebError::BadRequest(err.to_string())
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        WebError::Internal(err.to_string())
    }
}
