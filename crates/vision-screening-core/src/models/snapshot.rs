//! Immutable input snapshot for one pipeline run.

use serde::{Deserialize, Serialize};

use super::{Exam, FlagSnapshot, School, Student};

/// Problems the loader found while reading storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoadWarnings {
    /// Exams whose stored timestamp could not be parsed
    pub unparseable_exam_timestamps: usize,
}

/// Everything the pipeline reads. A run never mutates its snapshot; edits
/// produce new record sets instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    pub schools: Vec<School>,
    pub students: Vec<Student>,
    pub exams: Vec<Exam>,
    pub flags: FlagSnapshot,
    pub warnings: LoadWarnings,
}

impl Snapshot {
    /// Distinct region labels across schools, sorted.
    pub fn regions(&self, no_region_label: &str) -> Vec<String> {
        let mut regions: Vec<String> = self
            .schools
            .iter()
            .map(|s| s.region_label(no_region_label).to_string())
            .collect();
        regions.sort();
        regions.dedup();
        regions
    }

    /// Distinct school names, sorted.
    pub fn school_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schools.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}
