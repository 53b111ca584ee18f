//! Derived screening records.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{ExamId, FlagTable, SchoolId, StudentId, StudentKey};

/// Classification of an exam against the refractive threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CriticalStatus {
    Critical,
    Normal,
}

impl CriticalStatus {
    pub fn is_critical(&self) -> bool {
        matches!(self, CriticalStatus::Critical)
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            CriticalStatus::Critical => "Critical",
            CriticalStatus::Normal => "Normal",
        }
    }
}

/// One of the four workflow stages a user can toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExamDone,
    NeedsGlasses,
    OtherPathology,
    Delivered,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::ExamDone,
        Stage::NeedsGlasses,
        Stage::OtherPathology,
        Stage::Delivered,
    ];

    /// Flag table persisting this stage.
    pub fn table(&self) -> FlagTable {
        match self {
            Stage::ExamDone => FlagTable::ExamDone,
            Stage::NeedsGlasses | Stage::OtherPathology => FlagTable::NeedsGlasses,
            Stage::Delivered => FlagTable::Delivered,
        }
    }
}

/// The four stage booleans. They are independent: no ordering between
/// stages is enforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct StageFlags {
    pub exam_done: bool,
    pub needs_glasses: bool,
    pub other_pathology: bool,
    pub delivered: bool,
}

impl StageFlags {
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::ExamDone => self.exam_done,
            Stage::NeedsGlasses => self.needs_glasses,
            Stage::OtherPathology => self.other_pathology,
            Stage::Delivered => self.delivered,
        }
    }

    pub fn set(&mut self, stage: Stage, value: bool) {
        match stage {
            Stage::ExamDone => self.exam_done = value,
            Stage::NeedsGlasses => self.needs_glasses = value,
            Stage::OtherPathology => self.other_pathology = value,
            Stage::Delivered => self.delivered = value,
        }
    }
}

/// Versions of the id-keyed flag rows seen when a record was reconciled.
/// Zero means no id-keyed row existed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct StageVersions {
    pub exam_done: u32,
    pub needs_glasses: u32,
    pub delivered: u32,
}

impl StageVersions {
    pub fn get(&self, table: FlagTable) -> u32 {
        match table {
            FlagTable::ExamDone => self.exam_done,
            FlagTable::NeedsGlasses => self.needs_glasses,
            FlagTable::Delivered => self.delivered,
        }
    }
}

/// The earliest in-range exam of a student, before flags are merged in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnchorRecord {
    pub student_id: StudentId,
    pub student_name: String,
    pub exam_id: ExamId,
    pub taken_at: NaiveDateTime,
    pub school_id: SchoolId,
    pub school_name: String,
    pub region: Option<String>,
    /// Critical when any of the student's in-range exams is critical
    pub critical: CriticalStatus,
    /// Number of in-range exams the student has
    pub exam_count: usize,
}

/// A student's screening state: anchor exam plus reconciled stage flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningRecord {
    pub student_id: StudentId,
    pub student_name: String,
    pub anchor_exam_id: ExamId,
    pub anchor_at: NaiveDateTime,
    pub school_id: SchoolId,
    pub school_name: String,
    pub region: Option<String>,
    pub critical: CriticalStatus,
    pub stages: StageFlags,
    pub versions: StageVersions,
}

impl ScreeningRecord {
    /// Build a record from its anchor with every stage unset.
    pub fn from_anchor(anchor: &AnchorRecord) -> Self {
        Self {
            student_id: anchor.student_id,
            student_name: anchor.student_name.clone(),
            anchor_exam_id: anchor.exam_id,
            anchor_at: anchor.taken_at,
            school_id: anchor.school_id,
            school_name: anchor.school_name.clone(),
            region: anchor.region.clone(),
            critical: anchor.critical,
            stages: StageFlags::default(),
            versions: StageVersions::default(),
        }
    }

    pub fn anchor_date(&self) -> NaiveDate {
        self.anchor_at.date()
    }

    /// Whether a flag or override key refers to this record.
    pub fn matches(&self, key: &StudentKey) -> bool {
        match key {
            StudentKey::Id(id) => self.student_id == *id,
            StudentKey::Name(name) => self.student_name == *name,
        }
    }

    pub fn region_label<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.region.as_deref().unwrap_or(fallback)
    }
}

/// A user edit to a student's stage flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageOverride {
    pub key: StudentKey,
    pub stages: StageFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flags_get_set() {
        let mut flags = StageFlags::default();
        for stage in Stage::ALL {
            assert!(!flags.get(stage));
            flags.set(stage, true);
            assert!(flags.get(stage));
        }
        assert_eq!(
            flags,
            StageFlags {
                exam_done: true,
                needs_glasses: true,
                other_pathology: true,
                delivered: true,
            }
        );
    }

    #[test]
    fn test_other_pathology_shares_needs_glasses_table() {
        assert_eq!(Stage::OtherPathology.table(), FlagTable::NeedsGlasses);
        assert_eq!(Stage::NeedsGlasses.table(), FlagTable::NeedsGlasses);
    }
}
