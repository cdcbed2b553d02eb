//! Bearer-token extractors.
//!
//! [`AuthUser`] accepts any valid token; [`Teacher`] and [`Student`]
//! additionally require the matching role and reject others with 403.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::auth::Claims;
use crate::data::Role;
use crate::web::error::{AuthFailure, WebError};
use crate::web::state::WebAppState;

/// Any authenticated user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<WebAppState> for AuthUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WebAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        WebError::Unauthorized(AuthFailure::MissingToken)
                    } else {
                        WebError::Unauthorized(AuthFailure::InvalidToken)
                    }
                })?;

        let claims = state.signer().verify(bearer.token()).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            WebError::from(e)
        })?;

        Ok(AuthUser(claims))
    }
}

fn require_role(claims: &Claims, role: Role) -> Result<(), WebError> {
    if claims.role == role {
        Ok(())
    } else {
        Err(WebError::Forbidden(format!(
            "This action requires the {} role",
            role
        )))
    }
}

/// An authenticated teacher.
#[derive(Debug, Clone)]
pub struct Teacher(pub Claims);

impl FromRequestParts<WebAppState> for Teacher {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WebAppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        require_role(&claims, Role::Teacher)?;
        Ok(Teacher(claims))
    }
}

/// An authenticated student.
#[derive(Debug, Clone)]
pub struct Student(pub Claims);

impl FromRequestParts<WebAppState> for Student {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WebAppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        require_role(&claims, Role::Student)?;
        Ok(Student(claims))
    }
}
