//! Database layer for the adherence store.

mod schema;
mod prescriptions;
mod medicines;
mod schedules;
mod records;
mod medicine_groups;

pub use schema::*;
pub use prescriptions::*;

use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::models::{GroupConfigError, ModelParseError};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid date in store: {0}")]
    InvalidDate(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] ModelParseError),

    #[error("Invalid medicine group: {0}")]
    GroupConfig(#[from] GroupConfigError),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Parse a stored `YYYY-MM-DD` date.
fn parse_date(value: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| DbError::InvalidDate(value.to_string()))
}

/// Format a date for storage; lexical order matches calendar order.
fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
