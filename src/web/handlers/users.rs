//! User account handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_field;
use crate::data::{Role, User};
use crate::tracker::CheatingRecord;
use crate::web::error::WebError;
use crate::web::extract::Teacher;
use crate::web::state::WebAppState;

/// Public view of a user. Never carries credentials.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role: user.role,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleUserResponse {
    pub success: bool,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub success: bool,
    pub users: Vec<UserResponse>,
}

/// Request to create a user account.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
}

/// Create a user account (teachers only).
pub async fn create_user(
    Teacher(claims): Teacher,
    State(state): State<WebAppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<SingleUserResponse>), WebError> {
    require_field(&req.username, "username")?;
    require_field(&req.password, "password")?;
    let role = req
        .role
        .ok_or_else(|| WebError::BadRequest("role is required".to_string()))?;

    let username = req.username.trim().to_string();
    let display_name = req
        .display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| username.clone());
    let user = User::new(username, display_name, role, &req.password);

    state.users().create(&user).map_err(|e| {
        if e.is_constraint_violation() {
            WebError::Conflict(format!("Username '{}' is taken", user.username))
        } else {
            WebError::from(e)
        }
    })?;

    tracing::info!(
        created_by = %claims.username,
        username = %user.username,
        role = %user.role,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(SingleUserResponse {
            success: true,
            user: user.into(),
        }),
    ))
}

/// List users with a role (students unless `?role=` says otherwise).
pub async fn list_users(
    Teacher(_): Teacher,
    State(state): State<WebAppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListUsersResponse>, WebError> {
    let users = state
        .users()
        .get_by_role(query.role.unwrap_or(Role::Student))?;

    Ok(Json(ListUsersResponse {
        success: true,
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct UserTrackingResponse {
    pub success: bool,
    pub user: UserResponse,
    pub records: Vec<CheatingRecord>,
}

/// Persisted cheating records for one user (teachers only).
pub async fn get_user_tracking(
    Teacher(_): Teacher,
    State(state): State<WebAppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserTrackingResponse>, WebError> {
    let user = state
        .users()
        .get_by_id(id)?
        .ok_or_else(|| WebError::NotFound(format!("User {} not found", id)))?;

    let prefix = format!("user:{}:", id);
    let mut records = Vec::new();
    for key in state.app_state().keys_with_prefix(&prefix)? {
        let Some(raw) = state.app_state().get(&key)? else {
            continue;
        };
        match serde_json::from_str::<CheatingRecord>(&raw) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(key = %key, error = %e, "Skipping malformed cheating record"),
        }
    }

    Ok(Json(UserTrackingResponse {
        success: true,
        user: user.into(),
        records,
    }))
}
