//! Database layer for vision screening.

mod exams;
mod flags;
mod schema;
mod schools;
mod snapshot;
mod students;

pub use flags::*;
pub use schema::*;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid input: {0}")]
    Invalid(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Storage format for exam timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for birth dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats accepted when reading timestamps written by older tools.
const ACCEPTED_TIMESTAMP_FORMATS: [&str; 5] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse a stored exam timestamp. Date-only values are read as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ACCEPTED_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
    source_key: String,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let source_key = path.as_ref().display().to_string();
        let conn = Connection::open(path)?;
        let db = Self { conn, source_key };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            source_key: format!(":memory:{}", uuid::Uuid::new_v4()),
        };
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

    /// Identity of this database for snapshot caching.
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    /// Begin a transaction through a shared reference. Callers must not
    /// nest transactions.
    pub fn begin(&self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}
