//! Workflow flag database operations.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{Database, DbResult};
use crate::models::{
    DeliveredFlag, ExamDoneFlag, FlagSnapshot, FlagTable, NeedsGlassesFlag, StageFlags,
    StudentId, StudentKey,
};

/// One entry of the append-only sync log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncLogEntry {
    pub sync_id: String,
    pub mode: String,
    pub rows_written: u32,
    pub digest: String,
    pub synced_at: String,
}

impl Database {
    /// Load every flag row. Id-keyed rows come first, then legacy
    /// name-keyed rows, each in insertion order.
    pub fn load_flags(&self) -> DbResult<FlagSnapshot> {
        let mut snapshot = FlagSnapshot::default();

        let mut stmt = self.conn.prepare(
            "SELECT student_id, student_name, exam_done, version FROM flag_exam_done ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ExamDoneFlag {
                key: StudentKey::Id(row.get(0)?),
                student_name: row.get(1)?,
                exam_done: row.get(2)?,
                version: row.get(3)?,
            })
        })?;
        for row in rows {
            snapshot.exam_done.push(row?);
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT student_id, student_name, needs_glasses, other_pathology, version
            FROM flag_needs_glasses ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(NeedsGlassesFlag {
                key: StudentKey::Id(row.get(0)?),
                student_name: row.get(1)?,
                needs_glasses: row.get(2)?,
                other_pathology: row.get(3)?,
                version: row.get(4)?,
            })
        })?;
        for row in rows {
            snapshot.needs_glasses.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT student_id, student_name, delivered, version FROM flag_delivered ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DeliveredFlag {
                key: StudentKey::Id(row.get(0)?),
                student_name: row.get(1)?,
                delivered: row.get(2)?,
                version: row.get(3)?,
            })
        })?;
        for row in rows {
            snapshot.delivered.push(row?);
        }

        self.load_legacy_flags(&mut snapshot)?;
        Ok(snapshot)
    }

    fn load_legacy_flags(&self, snapshot: &mut FlagSnapshot) -> DbResult<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, exam_done FROM legacy_flag_exam_done ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            Ok(ExamDoneFlag {
                key: StudentKey::Name(name.clone()),
                student_name: name,
                exam_done: row.get(1)?,
                version: 0,
            })
        })?;
        for row in rows {
            snapshot.exam_done.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT name, needs_glasses, other_pathology FROM legacy_flag_needs_glasses ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            Ok(NeedsGlassesFlag {
                key: StudentKey::Name(name.clone()),
                student_name: name,
                needs_glasses: row.get(1)?,
                other_pathology: row.get(2)?,
                version: 0,
            })
        })?;
        for row in rows {
            snapshot.needs_glasses.push(row?);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, delivered FROM legacy_flag_delivered ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            Ok(DeliveredFlag {
                key: StudentKey::Name(name.clone()),
                student_name: name,
                delivered: row.get(1)?,
                version: 0,
            })
        })?;
        for row in rows {
            snapshot.delivered.push(row?);
        }

        Ok(())
    }

    /// Insert a name-keyed row into a legacy flag table.
    pub fn insert_legacy_flag(&self, table: FlagTable, name: &str, stages: &StageFlags) -> DbResult<()> {
        match table {
            FlagTable::ExamDone => self.conn.execute(
                "INSERT INTO legacy_flag_exam_done (name, exam_done) VALUES (?1, ?2)",
                params![name, stages.exam_done],
            )?,
            FlagTable::NeedsGlasses => self.conn.execute(
                "INSERT INTO legacy_flag_needs_glasses (name, needs_glasses, other_pathology) VALUES (?1, ?2, ?3)",
                params![name, stages.needs_glasses, stages.other_pathology],
            )?,
            FlagTable::Delivered => self.conn.execute(
                "INSERT INTO legacy_flag_delivered (name, delivered) VALUES (?1, ?2)",
                params![name, stages.delivered],
            )?,
        };
        Ok(())
    }

    /// Sync log, oldest first.
    pub fn list_sync_log(&self) -> DbResult<Vec<SyncLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT sync_id, mode, rows_written, digest, synced_at FROM flag_sync_log ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SyncLogEntry {
                sync_id: row.get(0)?,
                mode: row.get(1)?,
                rows_written: row.get(2)?,
                digest: row.get(3)?,
                synced_at: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

// ============================================================================
// Transaction-scoped helpers used by flag sync and migration
// ============================================================================

/// Current version of a student's id-keyed row, or 0 when absent.
pub fn flag_version(conn: &Connection, table: FlagTable, student_id: StudentId) -> DbResult<u32> {
    let sql = format!("SELECT version FROM {} WHERE student_id = ?", table.table_name());
    let version: Option<u32> = conn
        .query_row(&sql, [student_id], |row| row.get(0))
        .optional()?;
    Ok(version.unwrap_or(0))
}

/// Insert or overwrite a student's id-keyed row with an explicit version.
pub fn write_flag_row(
    conn: &Connection,
    table: FlagTable,
    student_id: StudentId,
    student_name: &str,
    stages: &StageFlags,
    version: u32,
) -> DbResult<()> {
    match table {
        FlagTable::ExamDone => conn.execute(
            r#"
            INSERT INTO flag_exam_done (student_id, student_name, exam_done, version, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(student_id) DO UPDATE SET
                student_name = excluded.student_name,
                exam_done = excluded.exam_done,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
            params![student_id, student_name, stages.exam_done, version],
        )?,
        FlagTable::NeedsGlasses => conn.execute(
            r#"
            INSERT INTO flag_needs_glasses
                (student_id, student_name, needs_glasses, other_pathology, version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            ON CONFLICT(student_id) DO UPDATE SET
                student_name = excluded.student_name,
                needs_glasses = excluded.needs_glasses,
                other_pathology = excluded.other_pathology,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
            params![
                student_id,
                student_name,
                stages.needs_glasses,
                stages.other_pathology,
                version
            ],
        )?,
        FlagTable::Delivered => conn.execute(
            r#"
            INSERT INTO flag_delivered (student_id, student_name, delivered, version, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(student_id) DO UPDATE SET
                student_name = excluded.student_name,
                delivered = excluded.delivered,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
            params![student_id, student_name, stages.delivered, version],
        )?,
    };
    Ok(())
}

/// Remove every id-keyed row of a table.
pub fn clear_flag_table(conn: &Connection, table: FlagTable) -> DbResult<usize> {
    let sql = format!("DELETE FROM {}", table.table_name());
    Ok(conn.execute(&sql, [])?)
}

/// Remove every legacy name-keyed row of a table.
pub fn clear_legacy_table(conn: &Connection, table: FlagTable) -> DbResult<usize> {
    let sql = format!("DELETE FROM {}", table.legacy_table_name());
    Ok(conn.execute(&sql, [])?)
}

/// Remove the legacy rows carrying a display name.
pub fn delete_legacy_rows(conn: &Connection, table: FlagTable, name: &str) -> DbResult<usize> {
    let sql = format!("DELETE FROM {} WHERE name = ?", table.legacy_table_name());
    Ok(conn.execute(&sql, [name])?)
}

/// Append an entry to the sync log.
pub fn record_sync(conn: &Connection, entry: &SyncLogEntry) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO flag_sync_log (sync_id, mode, rows_written, digest, synced_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            entry.sync_id,
            entry.mode,
            entry.rows_written,
            entry.digest,
            entry.synced_at
        ],
    )?;
    Ok(())
}
