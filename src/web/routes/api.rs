//! REST API route definitions.

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::handlers::{auth, exams, submissions, tracking, users};
use crate::web::state::WebAppState;

/// Build the API router with all REST endpoints.
pub fn api_routes() -> Router<WebAppState> {
    Router::new()
        // Auth routes
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // User routes
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}/tracking", get(users::get_user_tracking))
        // Exam routes
        .route("/exams", get(exams::list_exams).post(exams::create_exam))
        .route("/exams/{id}", get(exams::get_exam).delete(exams::delete_exam))
        // Submission routes
        .route(
            "/exams/{id}/submissions",
            get(submissions::list_exam_submissions).post(submissions::submit_exam),
        )
        .route("/me/submissions", get(submissions::my_submissions))
        // Tracking routes
        .route(
            "/exams/{id}/tracking",
            get(tracking::get_tracking).delete(tracking::clear_tracking),
        )
        .route("/exams/{id}/tracking/start", post(tracking::start_tracking))
        .route("/exams/{id}/tracking/stop", post(tracking::stop_tracking))
        .route(
            "/exams/{id}/tracking/visibility",
            post(tracking::report_visibility),
        )
}
