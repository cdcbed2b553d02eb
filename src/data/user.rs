//! User data access object

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::database::{Database, DatabaseError};
use super::models::{Role, User};

const USER_COLUMNS: &str = "id, username, display_name, role, password_hash, salt, created_at";

/// Data access object for User operations
#[derive(Clone, Debug)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new user
    pub fn create(&self, user: &User) -> Result<(), DatabaseError> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, display_name, role, password_hash, salt, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.display_name,
                    user.role.as_str(),
                    user.password_hash,
                    user.salt,
                    user.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Get a user by ID
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        self.db.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.to_string()],
                Self::row_to_user,
            )
            .optional()
        })
    }

    /// Get a user by login name
    pub fn get_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        self.db.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                Self::row_to_user,
            )
            .optional()
        })
    }

    /// Get all users with a role, ordered by username
    pub fn get_by_role(&self, role: Role) -> Result<Vec<User>, DatabaseError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE role = ?1 ORDER BY username",
                USER_COLUMNS
            ))?;
            let users = stmt
                .query_map(params![role.as_str()], Self::row_to_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Count all users
    pub fn count(&self) -> Result<i64, DatabaseError> {
        self.db
            .with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)))
    }

    /// Convert a database row to a User
    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        let id_str: String = row.get(0)?;
        let role_str: String = row.get(3)?;
        let created_at_str: String = row.get(6)?;

        Ok(User {
            id: Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            role: Role::from_str(&role_str).map_err(|e| conversion_error(3, e))?,
            password_hash: row.get(4)?,
            salt: row.get(5)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Wrap a column decoding failure as a rusqlite error
pub(super) fn conversion_error(
    column: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, err.into())
}

pub(super) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
