//! App state data access object (key-value store)

use chrono::Utc;
use rusqlite::params;

use super::database::{Database, DatabaseError};

/// Data access object for app state (key-value store)
#[derive(Clone, Debug)]
pub struct AppStateStore {
    db: Database,
}

impl AppStateStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Set a value (insert or update)
    pub fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO app_state (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT value FROM app_state WHERE key = ?1")?;
            let mut rows = stmt.query(params![key])?;

            if let Some(row) = rows.next()? {
                Ok(Some(row.get(0)?))
            } else {
                Ok(None)
            }
        })
    }

    /// Delete a key
    pub fn delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM app_state WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    /// Keys starting with `prefix`, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM app_state WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
    }

    /// Delete every key ending in `suffix`. Returns the number removed.
    pub fn delete_with_suffix(&self, suffix: &str) -> Result<usize, DatabaseError> {
        self.db.with_connection(|conn| {
            let removed = conn.execute(
                "DELETE FROM app_state
                 WHERE length(key) >= length(?1) AND substr(key, -length(?1)) = ?1",
                params![suffix],
            )?;
            Ok(removed)
        })
    }
}
