//! Key-value records backed by `SQLite`
//!
//! Plays the role of the browser's local storage: string keys, string values,
//! overwritten whole on every write.

use chrono::Utc;

use super::DbPool;
use crate::{Error, Result};

/// Key-value repository
#[derive(Clone)]
pub struct KvStore {
    pool: DbPool,
}

impl KvStore {
    /// Create a new key-value store backed by the given pool
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Read the value stored under `key`, or `None` if absent
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let result = conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        });
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }

    /// Insert or replace the value under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove the value under `key`; removing a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute("DELETE FROM kv WHERE key = ?1", [key])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
