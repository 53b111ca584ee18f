//! Writing stage edits back to flag storage.
//!
//! A save upserts one id-keyed row per student in each of the three flag
//! tables inside a single transaction. Each row carries a version; the save
//! only goes through when every stored version still equals the one the
//! records were reconciled against.

mod digest;
mod migrate;

pub use digest::*;
pub use migrate::*;

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{
    clear_flag_table, clear_legacy_table, flag_version, record_sync, write_flag_row, Database,
    SyncLogEntry,
};
use crate::models::{FlagTable, ScreeningRecord, StageFlags, StudentId};

/// Sync errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Flag conflict for student {student_id} in {table}: expected version {expected}, found {found}")]
    Conflict {
        student_id: StudentId,
        table: FlagTable,
        expected: u32,
        found: u32,
    },
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Database(err.into())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// How a sync wrote its rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Versioned row upsert
    Upsert,
    /// Tables cleared and rewritten
    Replace,
    /// Legacy name-keyed rows re-keyed by student id
    Migration,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Upsert => "upsert",
            SyncMode::Replace => "replace",
            SyncMode::Migration => "migration",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a committed sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncReceipt {
    pub sync_id: String,
    pub mode: SyncMode,
    pub students: u32,
    pub rows_written: u32,
    /// SHA-256 of the written stage state
    pub digest: String,
    pub synced_at: String,
}

/// One student's state to persist.
#[derive(Debug, Clone, PartialEq)]
struct PendingRow {
    pub student_id: StudentId,
    pub student_name: String,
    pub stages: StageFlags,
    /// Versions observed per table, `None` to skip the check
    pub expected: Option<[u32; 3]>,
}

impl PendingRow {
    fn from_record(record: &ScreeningRecord, checked: bool) -> Self {
        Self {
            student_id: record.student_id,
            student_name: record.student_name.clone(),
            stages: record.stages,
            expected: checked.then(|| {
                FlagTable::ALL.map(|table| record.versions.get(table))
            }),
        }
    }
}

/// Persists screening records to the flag tables.
pub struct FlagSync<'a> {
    db: &'a Database,
}

impl<'a> FlagSync<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Versioned upsert of the given records. On any version mismatch the
    /// whole save is rolled back and a conflict is returned. When a student
    /// appears more than once the last record wins.
    pub fn save(&self, records: &[ScreeningRecord]) -> SyncResult<SyncReceipt> {
        let rows = dedupe(records.iter().map(|r| PendingRow::from_record(r, true)));
        self.commit(SyncMode::Upsert, &rows, false)
    }

    /// Clear the three id-keyed tables and their legacy name-keyed
    /// counterparts, then write the records. Versions continue from the
    /// values stored before the clear.
    pub fn replace_all(&self, records: &[ScreeningRecord]) -> SyncResult<SyncReceipt> {
        let rows = dedupe(records.iter().map(|r| PendingRow::from_record(r, false)));
        self.commit(SyncMode::Replace, &rows, true)
    }

    fn commit(&self, mode: SyncMode, rows: &[PendingRow], clear_first: bool) -> SyncResult<SyncReceipt> {
        let tx = self.db.begin()?;
        let rows_written = write_rows(&tx, rows, clear_first)?;
        finish(
            tx,
            mode,
            rows.iter().map(|r| (r.student_id, &r.stages)),
            rows.len() as u32,
            rows_written,
        )
    }
}

/// Log the sync, commit the transaction and build the receipt.
fn finish<'r>(
    tx: Transaction<'_>,
    mode: SyncMode,
    state: impl IntoIterator<Item = (StudentId, &'r StageFlags)>,
    students: u32,
    rows_written: u32,
) -> SyncResult<SyncReceipt> {
    let receipt = SyncReceipt {
        sync_id: Uuid::new_v4().to_string(),
        mode,
        students,
        rows_written,
        digest: state_digest(state),
        synced_at: Utc::now().to_rfc3339(),
    };
    record_sync(
        &tx,
        &SyncLogEntry {
            sync_id: receipt.sync_id.clone(),
            mode: mode.as_str().to_string(),
            rows_written,
            digest: receipt.digest.clone(),
            synced_at: receipt.synced_at.clone(),
        },
    )?;
    tx.commit()?;

    tracing::info!(
        sync_id = %receipt.sync_id,
        mode = %mode,
        students,
        rows = rows_written,
        "flag sync committed"
    );
    Ok(receipt)
}

fn dedupe(rows: impl Iterator<Item = PendingRow>) -> Vec<PendingRow> {
    let by_id: BTreeMap<StudentId, PendingRow> = rows.map(|r| (r.student_id, r)).collect();
    by_id.into_values().collect()
}

/// Write every row into all three tables. Stops at the first conflict; the
/// caller's transaction is then dropped without commit.
fn write_rows(conn: &Connection, rows: &[PendingRow], clear_first: bool) -> SyncResult<u32> {
    let mut current = Vec::with_capacity(rows.len());
    for row in rows {
        let mut versions = [0u32; 3];
        for (slot, table) in versions.iter_mut().zip(FlagTable::ALL) {
            *slot = flag_version(conn, table, row.student_id)?;
        }
        if let Some(expected) = row.expected {
            for ((table, want), found) in FlagTable::ALL.into_iter().zip(expected).zip(versions) {
                if want != found {
                    tracing::warn!(
                        student_id = row.student_id,
                        table = %table,
                        expected = want,
                        found,
                        "flag version conflict, save aborted"
                    );
                    return Err(SyncError::Conflict {
                        student_id: row.student_id,
                        table,
                        expected: want,
                        found,
                    });
                }
            }
        }
        current.push(versions);
    }

    if clear_first {
        for table in FlagTable::ALL {
            clear_flag_table(conn, table)?;
            clear_legacy_table(conn, table)?;
        }
    }

    let mut written = 0;
    for (row, versions) in rows.iter().zip(current) {
        for (table, version) in FlagTable::ALL.into_iter().zip(versions) {
            write_flag_row(
                conn,
                table,
                row.student_id,
                &row.student_name,
                &row.stages,
                version + 1,
            )?;
            written += 1;
        }
    }
    Ok(written)
}
