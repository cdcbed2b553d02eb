//! Exam data access object

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::database::{Database, DatabaseError};
use super::models::{Exam, Question};
use super::user::{conversion_error, parse_timestamp};

const EXAM_COLUMNS: &str =
    "id, test_type, title, description, time_limit_minutes, created_by, created_at";

/// Data access object for exams and their questions
#[derive(Clone, Debug)]
pub struct ExamStore {
    db: Database,
}

impl ExamStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert an exam together with its questions
    pub fn create(&self, exam: &Exam) -> Result<(), DatabaseError> {
        self.db.with_connection(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO exams (id, test_type, title, description, time_limit_minutes, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    exam.id.to_string(),
                    exam.test_type,
                    exam.title,
                    exam.description,
                    exam.time_limit_minutes,
                    exam.created_by.to_string(),
                    exam.created_at.to_rfc3339(),
                ],
            )?;

            for question in &exam.questions {
                let options = serde_json::to_string(&question.options)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                tx.execute(
                    "INSERT INTO questions (id, exam_id, position, prompt, options, correct_option, points)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        question.id.to_string(),
                        exam.id.to_string(),
                        question.position,
                        question.prompt,
                        options,
                        question.correct_option,
                        question.points,
                    ],
                )?;
            }

            tx.commit()
        })
    }

    /// Get an exam with its questions
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<Exam>, DatabaseError> {
        self.db.with_connection(|conn| {
            let exam = conn
                .query_row(
                    &format!("SELECT {} FROM exams WHERE id = ?1", EXAM_COLUMNS),
                    params![id.to_string()],
                    Self::row_to_exam,
                )
                .optional()?;

            match exam {
                Some(mut exam) => {
                    exam.questions = Self::load_questions(conn, exam.id)?;
                    Ok(Some(exam))
                }
                None => Ok(None),
            }
        })
    }

    /// List exams, newest first, optionally filtered by test type
    pub fn list(&self, test_type: Option<&str>) -> Result<Vec<Exam>, DatabaseError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM exams WHERE (?1 IS NULL OR test_type = ?1) ORDER BY created_at DESC, title",
                EXAM_COLUMNS
            ))?;
            let mut exams = stmt
                .query_map(params![test_type], Self::row_to_exam)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for exam in &mut exams {
                exam.questions = Self::load_questions(conn, exam.id)?;
            }
            Ok(exams)
        })
    }

    /// Delete an exam (cascades to questions and submissions)
    pub fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        self.db.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM exams WHERE id = ?1", params![id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    fn load_questions(conn: &Connection, exam_id: Uuid) -> rusqlite::Result<Vec<Question>> {
        let mut stmt = conn.prepare(
            "SELECT id, position, prompt, options, correct_option, points
             FROM questions WHERE exam_id = ?1 ORDER BY position",
        )?;
        let questions = stmt
            .query_map(params![exam_id.to_string()], Self::row_to_question)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(questions)
    }

    fn row_to_exam(row: &Row) -> rusqlite::Result<Exam> {
        let id_str: String = row.get(0)?;
        let created_by_str: String = row.get(5)?;
        let created_at_str: String = row.get(6)?;

        Ok(Exam {
            id: Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?,
            test_type: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            time_limit_minutes: row.get(4)?,
            created_by: Uuid::parse_str(&created_by_str).map_err(|e| conversion_error(5, e))?,
            created_at: parse_timestamp(&created_at_str),
            questions: Vec::new(),
        })
    }

    fn row_to_question(row: &Row) -> rusqlite::Result<Question> {
        let id_str: String = row.get(0)?;
        let options_json: String = row.get(3)?;

        Ok(Question {
            id: Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?,
            position: row.get(1)?,
            prompt: row.get(2)?,
            options: serde_json::from_str(&options_json).map_err(|e| conversion_error(3, e))?,
            correct_option: row.get(4)?,
            points: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Role, User, UserStore};

    fn setup() -> (Database, ExamStore, User) {
        let db = Database::open_in_memory().unwrap();
        let teacher = User::new("tess", "Tess", Role::Teacher, "pw");
        UserStore::new(db.clone()).create(&teacher).unwrap();
        let store = ExamStore::new(db.clone());
        (db, store, teacher)
    }

    fn sample_exam(teacher: &User, test_type: &str) -> Exam {
        let mut exam = Exam::new(
            test_type,
            "Unit 1",
            teacher.id,
            vec![
                Question::new(1, "Second", vec!["a".into(), "b".into()], 1, 2),
                Question::new(0, "First", vec!["x".into(), "y".into()], 0, 1),
            ],
        );
        exam.description = Some("Warm-up".to_string());
        exam.time_limit_minutes = Some(20);
        exam
    }

    #[test]
    fn test_create_and_get_orders_questions() {
        let (_db, store, teacher) = setup();
        let exam = sample_exam(&teacher, "math");
        store.create(&exam).unwrap();

        let loaded = store.get_by_id(exam.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Unit 1");
        assert_eq!(loaded.description.as_deref(), Some("Warm-up"));
        assert_eq!(loaded.time_limit_minutes, Some(20));
        assert_eq!(loaded.questions.len(), 2);
        assert_eq!(loaded.questions[0].prompt, "First");
        assert_eq!(loaded.questions[1].options, vec!["a", "b"]);
        assert_eq!(loaded.possible_points(), 3);
    }

    #[test]
    fn test_list_filters_by_test_type() {
        let (_db, store, teacher) = setup();
        store.create(&sample_exam(&teacher, "math")).unwrap();
        store.create(&sample_exam(&teacher, "reading")).unwrap();

        assert_eq!(store.list(None).unwrap().len(), 2);
        let math = store.list(Some("math")).unwrap();
        assert_eq!(math.len(), 1);
        assert_eq!(math[0].test_type, "math");
        assert_eq!(math[0].questions.len(), 2);
    }

    #[test]
    fn test_delete_cascades_questions() {
        let (db, store, teacher) = setup();
        let exam = sample_exam(&teacher, "math");
        store.create(&exam).unwrap();

        assert!(store.delete(exam.id).unwrap());
        assert!(!store.delete(exam.id).unwrap());
        assert!(store.get_by_id(exam.id).unwrap().is_none());

        let remaining: i64 = db
            .with_connection(|conn| {
                conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
