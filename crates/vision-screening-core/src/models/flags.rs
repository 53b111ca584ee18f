//! Persisted workflow flags.
//!
//! Flags are edited by users and stored apart from exam data. Current rows are
//! keyed by student id; rows written by older deployments are keyed by the
//! student's display name and are still honoured until migrated.

use serde::{Deserialize, Serialize};

use super::StudentId;

/// How a flag row identifies its student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StudentKey {
    /// Matches exactly one student
    Id(StudentId),
    /// Legacy key: matches every student with this display name
    Name(String),
}

/// The three flag tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlagTable {
    ExamDone,
    NeedsGlasses,
    Delivered,
}

impl FlagTable {
    pub const ALL: [FlagTable; 3] = [
        FlagTable::ExamDone,
        FlagTable::NeedsGlasses,
        FlagTable::Delivered,
    ];

    /// SQL table holding id-keyed rows.
    pub fn table_name(&self) -> &'static str {
        match self {
            FlagTable::ExamDone => "flag_exam_done",
            FlagTable::NeedsGlasses => "flag_needs_glasses",
            FlagTable::Delivered => "flag_delivered",
        }
    }

    /// SQL table holding legacy name-keyed rows.
    pub fn legacy_table_name(&self) -> &'static str {
        match self {
            FlagTable::ExamDone => "legacy_flag_exam_done",
            FlagTable::NeedsGlasses => "legacy_flag_needs_glasses",
            FlagTable::Delivered => "legacy_flag_delivered",
        }
    }
}

impl std::fmt::Display for FlagTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// "Exam done" flag row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamDoneFlag {
    pub key: StudentKey,
    pub student_name: String,
    pub exam_done: bool,
    /// Row version; 0 for legacy rows
    pub version: u32,
}

/// "Needs glasses" flag row. Other pathologies share the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeedsGlassesFlag {
    pub key: StudentKey,
    pub student_name: String,
    pub needs_glasses: bool,
    pub other_pathology: bool,
    pub version: u32,
}

/// "Glasses delivered" flag row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveredFlag {
    pub key: StudentKey,
    pub student_name: String,
    pub delivered: bool,
    pub version: u32,
}

/// All persisted flags at load time. Absent tables are simply empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FlagSnapshot {
    pub exam_done: Vec<ExamDoneFlag>,
    pub needs_glasses: Vec<NeedsGlassesFlag>,
    pub delivered: Vec<DeliveredFlag>,
}

impl FlagSnapshot {
    /// Total number of rows across the three tables.
    pub fn row_count(&self) -> usize {
        self.exam_done.len() + self.needs_glasses.len() + self.delivered.len()
    }

    /// Whether any row still uses a legacy name key.
    pub fn has_legacy_rows(&self) -> bool {
        let legacy = |k: &StudentKey| matches!(k, StudentKey::Name(_));
        self.exam_done.iter().any(|r| legacy(&r.key))
            || self.needs_glasses.iter().any(|r| legacy(&r.key))
            || self.delivered.iter().any(|r| legacy(&r.key))
    }
}
