//! Exam handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_field;
use crate::data::{Exam, Question, Role};
use crate::tracker::storage_key;
use crate::web::error::WebError;
use crate::web::extract::{AuthUser, Teacher};
use crate::web::state::WebAppState;

/// Exam metadata without questions.
#[derive(Debug, Serialize)]
pub struct ExamSummary {
    pub id: Uuid,
    pub test_type: String,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<u32>,
    pub question_count: usize,
    pub possible_points: u32,
    pub created_by: Uuid,
    pub created_at: String,
}

impl From<&Exam> for ExamSummary {
    fn from(exam: &Exam) -> Self {
        Self {
            id: exam.id,
            test_type: exam.test_type.clone(),
            title: exam.title.clone(),
            description: exam.description.clone(),
            time_limit_minutes: exam.time_limit_minutes,
            question_count: exam.questions.len(),
            possible_points: exam.possible_points(),
            created_by: exam.created_by,
            created_at: exam.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub position: u32,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: u32,
    /// Only present for teachers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<u32>,
}

impl QuestionResponse {
    fn from_question(question: &Question, reveal_answer: bool) -> Self {
        Self {
            id: question.id,
            position: question.position,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            points: question.points,
            correct_option: reveal_answer.then_some(question.correct_option),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExamResponse {
    #[serde(flatten)]
    pub summary: ExamSummary,
    pub questions: Vec<QuestionResponse>,
}

impl ExamResponse {
    pub(crate) fn from_exam(exam: &Exam, reveal_answers: bool) -> Self {
        Self {
            summary: ExamSummary::from(exam),
            questions: exam
                .questions
                .iter()
                .map(|q| QuestionResponse::from_question(q, reveal_answers))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleExamResponse {
    pub success: bool,
    pub exam: ExamResponse,
}

#[derive(Debug, Serialize)]
pub struct ListExamsResponse {
    pub success: bool,
    pub exams: Vec<ExamSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListExamsQuery {
    pub test_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_option: Option<u32>,
    pub points: Option<u32>,
}

/// Request to create an exam.
#[derive(Debug, Deserialize)]
pub struct CreateExamRequest {
    #[serde(default)]
    pub test_type: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// Test types end up in storage keys, so keep them to a safe alphabet.
fn validate_test_type(test_type: &str) -> Result<(), WebError> {
    require_field(test_type, "test_type")?;
    let valid = test_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(WebError::BadRequest(
            "test_type may only contain lowercase letters, digits and '-'".to_string(),
        ))
    }
}

/// Upper bound on a single question's weight.
pub const MAX_QUESTION_POINTS: u32 = 1000;

fn build_question(position: usize, req: CreateQuestionRequest) -> Result<Question, WebError> {
    let label = format!("questions[{}]", position);
    require_field(&req.prompt, &format!("{}.prompt", label))?;

    if req.options.len() < 2 {
        return Err(WebError::BadRequest(format!(
            "{} needs at least two options",
            label
        )));
    }
    let correct_option = req
        .correct_option
        .ok_or_else(|| WebError::BadRequest(format!("{}.correct_option is required", label)))?;
    if correct_option as usize >= req.options.len() {
        return Err(WebError::BadRequest(format!(
            "{}.correct_option is out of range",
            label
        )));
    }
    let points = req.points.unwrap_or(1);
    if !(1..=MAX_QUESTION_POINTS).contains(&points) {
        return Err(WebError::BadRequest(format!(
            "{}.points must be between 1 and {}",
            label, MAX_QUESTION_POINTS
        )));
    }

    Ok(Question::new(
        position as u32,
        req.prompt,
        req.options,
        correct_option,
        points,
    ))
}

/// List exams, optionally filtered by test type.
pub async fn list_exams(
    AuthUser(_): AuthUser,
    State(state): State<WebAppState>,
    Query(query): Query<ListExamsQuery>,
) -> Result<Json<ListExamsResponse>, WebError> {
    let test_type = query.test_type.as_deref().filter(|t| !t.is_empty());
    let exams = state.exams().list(test_type)?;

    Ok(Json(ListExamsResponse {
        success: true,
        exams: exams.iter().map(ExamSummary::from).collect(),
    }))
}

/// Create an exam with its questions (teachers only).
pub async fn create_exam(
    Teacher(claims): Teacher,
    State(state): State<WebAppState>,
    Json(req): Json<CreateExamRequest>,
) -> Result<(StatusCode, Json<SingleExamResponse>), WebError> {
    validate_test_type(&req.test_type)?;
    require_field(&req.title, "title")?;
    if req.questions.is_empty() {
        return Err(WebError::BadRequest(
            "At least one question is required".to_string(),
        ));
    }

    let questions = req
        .questions
        .into_iter()
        .enumerate()
        .map(|(position, question)| build_question(position, question))
        .collect::<Result<Vec<_>, _>>()?;

    let mut exam = Exam::new(req.test_type, req.title.trim(), claims.sub, questions);
    exam.description = req.description.filter(|d| !d.trim().is_empty());
    exam.time_limit_minutes = req.time_limit_minutes;

    state.exams().create(&exam)?;

    tracing::info!(
        exam_id = %exam.id,
        test_type = %exam.test_type,
        questions = exam.questions.len(),
        created_by = %claims.username,
        "Exam created"
    );

    Ok((
        StatusCode::CREATED,
        Json(SingleExamResponse {
            success: true,
            exam: ExamResponse::from_exam(&exam, true),
        }),
    ))
}

/// Get one exam. Correct answers are only revealed to teachers.
pub async fn get_exam(
    AuthUser(claims): AuthUser,
    State(state): State<WebAppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SingleExamResponse>, WebError> {
    let exam = load_exam(&state, id)?;

    Ok(Json(SingleExamResponse {
        success: true,
        exam: ExamResponse::from_exam(&exam, claims.role == Role::Teacher),
    }))
}

/// Delete an exam and everything attached to it (teachers only).
pub async fn delete_exam(
    Teacher(claims): Teacher,
    State(state): State<WebAppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, WebError> {
    let exam = load_exam(&state, id)?;
    if !state.exams().delete(id)? {
        return Err(WebError::NotFound(format!("Exam {} not found", id)));
    }

    let test_id = exam.id.to_string();
    let trackers = state.trackers().remove_test(&exam.test_type, &test_id);
    let records = state
        .app_state()
        .delete_with_suffix(&format!(":{}", storage_key(&exam.test_type, &test_id)))?;

    tracing::info!(
        exam_id = %id,
        deleted_by = %claims.username,
        trackers,
        records,
        "Exam deleted"
    );

    Ok(Json(DeleteResponse { success: true }))
}

pub(crate) fn load_exam(state: &WebAppState, id: Uuid) -> Result<Exam, WebError> {
    state
        .exams()
        .get_by_id(id)?
        .ok_or_else(|| WebError::NotFound(format!("Exam {} not found", id)))
}
