//! Unsaved stage edits.

use std::collections::BTreeMap;

use super::{PipelineError, PipelineResult};
use crate::models::{ScreeningRecord, Stage, StageFlags, StageOverride, StudentId, StudentKey};

/// Stage edits made since the last save, keyed by student id. Edits survive
/// filter changes and are layered over freshly reconciled records on every
/// run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditSession {
    edits: BTreeMap<StudentId, StageFlags>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all four stages of a student.
    pub fn set_stages(&mut self, student_id: StudentId, stages: StageFlags) {
        self.edits.insert(student_id, stages);
    }

    /// Toggle a single stage. `records` are the reconciled records the user
    /// is looking at; the student must be among them.
    pub fn set_stage(
        &mut self,
        records: &[ScreeningRecord],
        student_id: StudentId,
        stage: Stage,
        value: bool,
    ) -> PipelineResult<StageFlags> {
        let base = match self.edits.get(&student_id) {
            Some(stages) => *stages,
            None => {
                records
                    .iter()
                    .find(|r| r.student_id == student_id)
                    .ok_or(PipelineError::UnknownStudent(student_id))?
                    .stages
            }
        };
        let mut stages = base;
        stages.set(stage, value);
        self.edits.insert(student_id, stages);
        Ok(stages)
    }

    pub fn overrides(&self) -> Vec<StageOverride> {
        self.edits
            .iter()
            .map(|(id, stages)| StageOverride {
                key: StudentKey::Id(*id),
                stages: *stages,
            })
            .collect()
    }

    /// Records that carry an unsaved edit.
    pub fn touched<'a>(&self, records: &'a [ScreeningRecord]) -> Vec<&'a ScreeningRecord> {
        records
            .iter()
            .filter(|r| self.edits.contains_key(&r.student_id))
            .collect()
    }

    pub fn discard(&mut self, student_id: StudentId) -> bool {
        self.edits.remove(&student_id).is_some()
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
