//! Data models for users, exams and submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::password;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// An account that can log in
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    /// Unique login name
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// Hex-encoded salted SHA-256 of the password
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user, hashing the password with a fresh salt
    pub fn new(
        username: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        password: &str,
    ) -> Self {
        let salt = password::generate_salt();
        let password_hash = password::hash_password(&salt, password);
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            display_name: display_name.into(),
            role,
            password_hash,
            salt,
            created_at: Utc::now(),
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        password::verify_password(&self.salt, password, &self.password_hash)
    }
}

/// A multiple-choice question belonging to an exam
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: Uuid,
    /// Zero-based order within the exam
    pub position: u32,
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_option: u32,
    pub points: u32,
}

impl Question {
    pub fn new(
        position: u32,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option: u32,
        points: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            prompt: prompt.into(),
            options,
            correct_option,
            points,
        }
    }
}

/// A test students can take
#[derive(Debug, Clone)]
pub struct Exam {
    pub id: Uuid,
    /// Category of test (e.g. "math", "reading")
    pub test_type: String,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<u32>,
    /// Teacher who created the exam
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    /// Questions ordered by position
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn new(
        test_type: impl Into<String>,
        title: impl Into<String>,
        created_by: Uuid,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_type: test_type.into(),
            title: title.into(),
            description: None,
            time_limit_minutes: None,
            created_by,
            created_at: Utc::now(),
            questions,
        }
    }

    pub fn possible_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0u32, |total, q| total.saturating_add(q.points))
    }
}

/// A student's scored answers for one exam
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub user_id: Uuid,
    /// Question id → chosen option index
    pub answers: BTreeMap<Uuid, u32>,
    pub earned_points: u32,
    pub possible_points: u32,
    pub percentage: f64,
    /// Counted tab switches during the attempt
    pub visibility_change_times: u32,
    pub caught_cheating: bool,
    pub submitted_at: DateTime<Utc>,
}
