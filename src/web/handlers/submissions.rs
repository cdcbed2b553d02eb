//! Submission handlers: scoring a student's answers and listing results.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::exams::load_exam;
use crate::data::Submission;
use crate::scoring::score_answers;
use crate::web::error::WebError;
use crate::web::extract::{Student, Teacher};
use crate::web::state::WebAppState;

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub answers: BTreeMap<Uuid, u32>,
    pub earned_points: u32,
    pub possible_points: u32,
    pub percentage: f64,
    pub visibility_change_times: u32,
    pub caught_cheating: bool,
    pub submitted_at: String,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        Self {
            id: submission.id,
            exam_id: submission.exam_id,
            user_id: submission.user_id,
            username: None,
            answers: submission.answers,
            earned_points: submission.earned_points,
            possible_points: submission.possible_points,
            percentage: submission.percentage,
            visibility_change_times: submission.visibility_change_times,
            caught_cheating: submission.caught_cheating,
            submitted_at: submission.submitted_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleSubmissionResponse {
    pub success: bool,
    pub submission: SubmissionResponse,
}

#[derive(Debug, Serialize)]
pub struct ListSubmissionsResponse {
    pub success: bool,
    pub submissions: Vec<SubmissionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub answers: Option<BTreeMap<Uuid, u32>>,
}

/// Score and record a student's answers.
///
/// Stops the student's tracker for this exam and stores its counters on the
/// submission. Each student may submit once per exam.
pub async fn submit_exam(
    Student(claims): Student,
    State(state): State<WebAppState>,
    Path(exam_id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SingleSubmissionResponse>), WebError> {
    let answers = req
        .answers
        .ok_or_else(|| WebError::BadRequest("answers is required".to_string()))?;
    let exam = load_exam(&state, exam_id)?;

    if state
        .submissions()
        .get_for_user(exam_id, claims.sub)?
        .is_some()
    {
        return Err(WebError::Conflict(
            "Exam has already been submitted".to_string(),
        ));
    }

    let score = score_answers(&exam, &answers)?;

    // Starting restores a persisted record when the tracker is not live
    // (e.g. after a restart); it is a no-op for an active tracker.
    let tracker = state
        .trackers()
        .tracker(claims.sub, &exam.test_type, &exam.id.to_string());
    tracker.start_tracking();
    tracker.stop_tracking();
    let tracking = tracker.cheating_data();

    let submission = Submission {
        id: Uuid::new_v4(),
        exam_id,
        user_id: claims.sub,
        answers,
        earned_points: score.earned_points,
        possible_points: score.possible_points,
        percentage: score.percentage,
        visibility_change_times: tracking.visibility_change_count,
        caught_cheating: tracking.is_cheating,
        submitted_at: Utc::now(),
    };

    state.submissions().create(&submission).map_err(|e| {
        if e.is_constraint_violation() {
            WebError::Conflict("Exam has already been submitted".to_string())
        } else {
            WebError::from(e)
        }
    })?;

    state
        .trackers()
        .remove(claims.sub, &exam.test_type, &exam.id.to_string());

    tracing::info!(
        exam_id = %exam_id,
        username = %claims.username,
        percentage = submission.percentage,
        caught_cheating = submission.caught_cheating,
        "Exam submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SingleSubmissionResponse {
            success: true,
            submission: submission.into(),
        }),
    ))
}

/// All submissions for an exam (teachers only).
pub async fn list_exam_submissions(
    Teacher(_): Teacher,
    State(state): State<WebAppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<ListSubmissionsResponse>, WebError> {
    load_exam(&state, exam_id)?;

    let mut submissions = Vec::new();
    for submission in state.submissions().get_by_exam(exam_id)? {
        let username = state
            .users()
            .get_by_id(submission.user_id)?
            .map(|user| user.username);
        let mut response = SubmissionResponse::from(submission);
        response.username = username;
        submissions.push(response);
    }

    Ok(Json(ListSubmissionsResponse {
        success: true,
        submissions,
    }))
}

/// The calling student's own submissions.
pub async fn my_submissions(
    Student(claims): Student,
    State(state): State<WebAppState>,
) -> Result<Json<ListSubmissionsResponse>, WebError> {
    let submissions = state.submissions().get_by_user(claims.sub)?;

    Ok(Json(ListSubmissionsResponse {
        success: true,
        submissions: submissions
            .into_iter()
            .map(SubmissionResponse::from)
            .collect(),
    }))
}
