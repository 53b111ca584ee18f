//! One-time re-keying of legacy name-keyed flag rows.
//!
//! Each legacy display name is resolved against the student table. A name
//! matching exactly one student is re-keyed to that student's id; a name
//! matching several students stops the migration, since any choice would
//! move flags onto the wrong child. Names matching nobody stay in the legacy
//! tables and are reported with close-name suggestions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use thiserror::Error;

use super::{finish, SyncError, SyncMode, SyncReceipt};
use crate::db::{delete_legacy_rows, flag_version, write_flag_row, Database, DbError};
use crate::models::{FlagSnapshot, FlagTable, StageFlags, StudentId, StudentKey};

/// Minimum similarity for a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.85;
const MAX_SUGGESTIONS: usize = 3;

/// Migration errors.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Ambiguous legacy names: {}", joined_names(.0))]
    Ambiguous(Vec<AmbiguousName>),
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        MigrationError::Database(err.into())
    }
}

pub type MigrationResult<T> = Result<T, MigrationError>;

fn joined_names(ambiguous: &[AmbiguousName]) -> String {
    ambiguous
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Legacy flags for one display name, merged across the three tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LegacyFlags {
    pub name: String,
    pub stages: StageFlags,
    /// Tables holding a row for this name
    pub tables: Vec<FlagTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedName {
    pub student_id: StudentId,
    pub flags: LegacyFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmbiguousName {
    pub name: String,
    pub student_ids: Vec<StudentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnresolvedName {
    pub name: String,
    /// Close student names, best first
    pub suggestions: Vec<String>,
}

/// What a migration would do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MigrationPlan {
    pub resolved: Vec<ResolvedName>,
    pub ambiguous: Vec<AmbiguousName>,
    pub unresolved: Vec<UnresolvedName>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.ambiguous.is_empty() && self.unresolved.is_empty()
    }
}

/// Outcome of a committed migration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationReport {
    pub receipt: SyncReceipt,
    pub migrated: Vec<ResolvedName>,
    /// Tables skipped per student because an id-keyed row already existed
    pub skipped: Vec<(StudentId, FlagTable)>,
    pub unresolved: Vec<UnresolvedName>,
}

/// Moves legacy flag rows onto student ids.
pub struct FlagMigrator<'a> {
    db: &'a Database,
}

impl<'a> FlagMigrator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Resolve every legacy name without writing anything.
    pub fn plan(&self) -> MigrationResult<MigrationPlan> {
        let legacy = collect_legacy(&self.db.load_flags()?);
        let mut plan = MigrationPlan::default();
        if legacy.is_empty() {
            return Ok(plan);
        }
        let all_names: Vec<String> = self
            .db
            .list_students()?
            .into_iter()
            .map(|s| s.name)
            .collect();

        for flags in legacy.into_values() {
            let matches = self.db.students_named(&flags.name)?;
            match matches.as_slice() {
                [] => plan.unresolved.push(UnresolvedName {
                    suggestions: suggest(&flags.name, &all_names),
                    name: flags.name,
                }),
                [student] => plan.resolved.push(ResolvedName {
                    student_id: student.id,
                    flags,
                }),
                many => plan.ambiguous.push(AmbiguousName {
                    name: flags.name,
                    student_ids: many.iter().map(|s| s.id).collect(),
                }),
            }
        }
        Ok(plan)
    }

    /// Plan and apply in one transaction. Fails without writing when any
    /// name is ambiguous. An existing id-keyed row is kept over the legacy
    /// value for that table.
    pub fn run(&self) -> MigrationResult<MigrationReport> {
        let plan = self.plan()?;
        if !plan.ambiguous.is_empty() {
            tracing::warn!(
                ambiguous = plan.ambiguous.len(),
                "legacy flag migration refused: ambiguous names"
            );
            return Err(MigrationError::Ambiguous(plan.ambiguous));
        }

        let tx = self.db.begin()?;
        let mut skipped = Vec::new();
        let mut rows_written = 0;
        for resolved in &plan.resolved {
            for &table in &resolved.flags.tables {
                let current = flag_version(&tx, table, resolved.student_id)?;
                if current > 0 {
                    skipped.push((resolved.student_id, table));
                } else {
                    write_flag_row(
                        &tx,
                        table,
                        resolved.student_id,
                        &resolved.flags.name,
                        &resolved.flags.stages,
                        1,
                    )?;
                    rows_written += 1;
                }
                delete_legacy_rows(&tx, table, &resolved.flags.name)?;
            }
        }

        let receipt = finish(
            tx,
            SyncMode::Migration,
            plan.resolved
                .iter()
                .map(|r| (r.student_id, &r.flags.stages)),
            plan.resolved.len() as u32,
            rows_written,
        )?;
        for name in &plan.unresolved {
            tracing::warn!(name = %name.name, suggestions = ?name.suggestions, "legacy flag name matches no student");
        }

        Ok(MigrationReport {
            receipt,
            migrated: plan.resolved,
            skipped,
            unresolved: plan.unresolved,
        })
    }
}

/// Group legacy rows by name. Later rows replace earlier ones per table.
fn collect_legacy(flags: &FlagSnapshot) -> BTreeMap<String, LegacyFlags> {
    let mut by_name: BTreeMap<String, LegacyFlags> = BTreeMap::new();

    for row in &flags.exam_done {
        if let Some(f) = legacy_entry(&mut by_name, &row.key, FlagTable::ExamDone) {
            f.stages.exam_done = row.exam_done;
        }
    }
    for row in &flags.needs_glasses {
        if let Some(f) = legacy_entry(&mut by_name, &row.key, FlagTable::NeedsGlasses) {
            f.stages.needs_glasses = row.needs_glasses;
            f.stages.other_pathology = row.other_pathology;
        }
    }
    for row in &flags.delivered {
        if let Some(f) = legacy_entry(&mut by_name, &row.key, FlagTable::Delivered) {
            f.stages.delivered = row.delivered;
        }
    }
    by_name
}

fn legacy_entry<'m>(
    by_name: &'m mut BTreeMap<String, LegacyFlags>,
    key: &StudentKey,
    table: FlagTable,
) -> Option<&'m mut LegacyFlags> {
    let StudentKey::Name(name) = key else {
        return None;
    };
    let flags = by_name.entry(name.clone()).or_insert_with(|| LegacyFlags {
        name: name.clone(),
        ..LegacyFlags::default()
    });
    if !flags.tables.contains(&table) {
        flags.tables.push(table);
    }
    Some(flags)
}

/// Student names similar to `name`, best first.
fn suggest(name: &str, candidates: &[String]) -> Vec<String> {
    let needle = name.to_lowercase();
    let mut scored: Vec<(f64, &String)> = candidates
        .iter()
        .map(|c| (jaro_winkler(&needle, &c.to_lowercase()), c))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    let mut suggestions: Vec<String> = Vec::new();
    for (_, candidate) in scored {
        if !suggestions.contains(candidate) {
            suggestions.push(candidate.clone());
        }
        if suggestions.len() == MAX_SUGGESTIONS {
            break;
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_ranks_close_names() {
        let names = vec![
            "Maria Souza".to_string(),
            "Mario Souza".to_string(),
            "João Pedro".to_string(),
        ];
        let suggestions = suggest("maria sousa", &names);
        assert_eq!(suggestions.first().map(String::as_str), Some("Maria Souza"));
        assert!(!suggestions.contains(&"João Pedro".to_string()));
    }

    #[test]
    fn test_suggest_nothing_close() {
        assert!(suggest("Zé", &["Maria Souza".to_string()]).is_empty());
    }

    #[test]
    fn test_collect_legacy_merges_tables() {
        use crate::models::{DeliveredFlag, ExamDoneFlag};

        let flags = FlagSnapshot {
            exam_done: vec![ExamDoneFlag {
                key: StudentKey::Name("Ana".into()),
                student_name: "Ana".into(),
                exam_done: true,
                version: 0,
            }],
            delivered: vec![
                DeliveredFlag {
                    key: StudentKey::Name("Ana".into()),
                    student_name: "Ana".into(),
                    delivered: true,
                    version: 0,
                },
                DeliveredFlag {
                    key: StudentKey::Id(4),
                    student_name: "Bia".into(),
                    delivered: true,
                    version: 1,
                },
            ],
            ..FlagSnapshot::default()
        };
        let legacy = collect_legacy(&flags);
        assert_eq!(legacy.len(), 1);
        let ana = &legacy["Ana"];
        assert!(ana.stages.exam_done && ana.stages.delivered);
        assert_eq!(ana.tables, vec![FlagTable::ExamDone, FlagTable::Delivered]);
    }
}
