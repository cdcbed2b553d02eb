//! HTTP request handlers for the examroom web API.

pub mod auth;
pub mod exams;
pub mod submissions;
pub mod tracking;
pub mod users;

use crate::web::error::WebError;

/// Reject an empty or whitespace-only required string field.
pub(crate) fn require_field(value: &str, name: &str) -> Result<(), WebError> {
    if value.trim().is_empty() {
        Err(WebError::BadRequest(format!("{} is required", name)))
    } else {
        Ok(())
    }
}
