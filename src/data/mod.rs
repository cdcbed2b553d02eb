//! Data persistence layer
//!
//! SQLite-based storage for users, exams, submissions and the key-value
//! store that backs anti-cheating records.

mod app_state;
mod database;
mod exam;
mod migrations;
mod models;
mod submission;
mod user;

pub use app_state::AppStateStore;
pub use database::{Database, DatabaseError};
pub use exam::ExamStore;
pub use models::{Exam, Question, Role, Submission, User};
pub use submission::SubmissionStore;
pub use user::UserStore;
