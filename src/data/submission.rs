//! Submission data access object

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::database::{Database, DatabaseError};
use super::models::Submission;
use super::user::{conversion_error, parse_timestamp};

const SUBMISSION_COLUMNS: &str = "id, exam_id, user_id, answers, earned_points, possible_points, \
     percentage, visibility_change_times, caught_cheating, submitted_at";

/// Data access object for Submission operations
#[derive(Clone, Debug)]
pub struct SubmissionStore {
    db: Database,
}

impl SubmissionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a submission. A second submission for the same exam and user
    /// fails with a constraint violation.
    pub fn create(&self, submission: &Submission) -> Result<(), DatabaseError> {
        let answers = serde_json::to_string(&submission.answers)
            .map_err(|e| DatabaseError::Corrupt(e.to_string()))?;

        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO submissions (id, exam_id, user_id, answers, earned_points, possible_points,
                     percentage, visibility_change_times, caught_cheating, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    submission.id.to_string(),
                    submission.exam_id.to_string(),
                    submission.user_id.to_string(),
                    answers,
                    submission.earned_points,
                    submission.possible_points,
                    submission.percentage,
                    submission.visibility_change_times,
                    submission.caught_cheating as i32,
                    submission.submitted_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Get the submission a user made for an exam
    pub fn get_for_user(
        &self,
        exam_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Submission>, DatabaseError> {
        self.db.with_connection(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM submissions WHERE exam_id = ?1 AND user_id = ?2",
                    SUBMISSION_COLUMNS
                ),
                params![exam_id.to_string(), user_id.to_string()],
                Self::row_to_submission,
            )
            .optional()
        })
    }

    /// All submissions for an exam, best score first
    pub fn get_by_exam(&self, exam_id: Uuid) -> Result<Vec<Submission>, DatabaseError> {
        self.query_many(
            &format!(
                "SELECT {} FROM submissions WHERE exam_id = ?1 ORDER BY percentage DESC, submitted_at",
                SUBMISSION_COLUMNS
            ),
            exam_id,
        )
    }

    /// All submissions by a user, newest first
    pub fn get_by_user(&self, user_id: Uuid) -> Result<Vec<Submission>, DatabaseError> {
        self.query_many(
            &format!(
                "SELECT {} FROM submissions WHERE user_id = ?1 ORDER BY submitted_at DESC",
                SUBMISSION_COLUMNS
            ),
            user_id,
        )
    }

    fn query_many(&self, sql: &str, id: Uuid) -> Result<Vec<Submission>, DatabaseError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let submissions = stmt
                .query_map(params![id.to_string()], Self::row_to_submission)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(submissions)
        })
    }

    fn row_to_submission(row: &Row) -> rusqlite::Result<Submission> {
        let id_str: String = row.get(0)?;
        let exam_id_str: String = row.get(1)?;
        let user_id_str: String = row.get(2)?;
        let answers_json: String = row.get(3)?;
        let caught_cheating: i32 = row.get(8)?;
        let submitted_at_str: String = row.get(9)?;

        Ok(Submission {
            id: Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?,
            exam_id: Uuid::parse_str(&exam_id_str).map_err(|e| conversion_error(1, e))?,
            user_id: Uuid::parse_str(&user_id_str).map_err(|e| conversion_error(2, e))?,
            answers: serde_json::from_str(&answers_json).map_err(|e| conversion_error(3, e))?,
            earned_points: row.get(4)?,
            possible_points: row.get(5)?,
            percentage: row.get(6)?,
            visibility_change_times: row.get(7)?,
            caught_cheating: caught_cheating != 0,
            submitted_at: parse_timestamp(&submitted_at_str),
        })
    }
}
