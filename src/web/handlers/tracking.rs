//! Anti-cheating tracker endpoints for a student's exam attempt.
//!
//! The attempt is identified by the caller's user id, the exam's test type
//! and the exam id.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::exams::load_exam;
use crate::auth::Claims;
use crate::tracker::{CheatingData, RegistryTracker, Visibility, VisibilityOutcome};
use crate::web::error::WebError;
use crate::web::extract::Student;
use crate::web::state::WebAppState;

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub success: bool,
    pub tracking: CheatingData,
}

#[derive(Debug, Serialize)]
pub struct VisibilityResponse {
    pub success: bool,
    /// `ignored`, `hidden_started`, `returned_quickly` or `counted`
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_ms: Option<u64>,
    pub tracking: CheatingData,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub state: Option<Visibility>,
}

fn attempt_tracker(
    state: &WebAppState,
    claims: &Claims,
    exam_id: Uuid,
) -> Result<Arc<RegistryTracker>, WebError> {
    let exam = load_exam(state, exam_id)?;
    Ok(state
        .trackers()
        .tracker(claims.sub, &exam.test_type, &exam.id.to_string()))
}

fn snapshot(tracker: &RegistryTracker) -> Json<TrackingResponse> {
    Json(TrackingResponse {
        success: true,
        tracking: tracker.cheating_data(),
    })
}

/// Begin tracking, restoring any persisted counters.
pub async fn start_tracking(
    Student(claims): Student,
    State(state): State<WebAppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<TrackingResponse>, WebError> {
    if state
        .submissions()
        .get_for_user(exam_id, claims.sub)?
        .is_some()
    {
        return Err(WebError::Conflict(
            "Exam has already been submitted".to_string(),
        ));
    }

    let tracker = attempt_tracker(&state, &claims, exam_id)?;
    tracker.start_tracking();
    Ok(snapshot(&tracker))
}

/// Stop tracking. Counters are kept.
pub async fn stop_tracking(
    Student(claims): Student,
    State(state): State<WebAppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<TrackingResponse>, WebError> {
    let tracker = attempt_tracker(&state, &claims, exam_id)?;
    tracker.stop_tracking();
    Ok(snapshot(&tracker))
}

/// Report a page visibility transition.
pub async fn report_visibility(
    Student(claims): Student,
    State(state): State<WebAppState>,
    Path(exam_id): Path<Uuid>,
    Json(req): Json<VisibilityRequest>,
) -> Result<Json<VisibilityResponse>, WebError> {
    let visibility = req
        .state
        .ok_or_else(|| WebError::BadRequest("state is required".to_string()))?;
    let tracker = attempt_tracker(&state, &claims, exam_id)?;

    let (outcome, hidden_ms) = match tracker.handle_visibility(visibility) {
        VisibilityOutcome::Ignored => ("ignored", None),
        VisibilityOutcome::HiddenStarted => ("hidden_started", None),
        VisibilityOutcome::ReturnedQuickly { elapsed } => {
            ("returned_quickly", Some(elapsed.as_millis() as u64))
        }
        VisibilityOutcome::Counted { elapsed, .. } => {
            ("counted", Some(elapsed.as_millis() as u64))
        }
    };

    Ok(Json(VisibilityResponse {
        success: true,
        outcome,
        hidden_ms,
        tracking: tracker.cheating_data(),
    }))
}

/// Current counters for the attempt.
pub async fn get_tracking(
    Student(claims): Student,
    State(state): State<WebAppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<TrackingResponse>, WebError> {
    let tracker = attempt_tracker(&state, &claims, exam_id)?;
    Ok(snapshot(&tracker))
}

/// Forget the attempt's counters, persisted record included.
pub async fn clear_tracking(
    Student(claims): Student,
    State(state): State<WebAppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<TrackingResponse>, WebError> {
    let exam = load_exam(&state, exam_id)?;
    let tracker = state
        .trackers()
        .tracker(claims.sub, &exam.test_type, &exam.id.to_string());
    tracker.clear_data();
    state
        .trackers()
        .remove(claims.sub, &exam.test_type, &exam.id.to_string());

    tracing::info!(
        exam_id = %exam_id,
        username = %claims.username,
        "Tracking data cleared"
    );

    Ok(snapshot(&tracker))
}
