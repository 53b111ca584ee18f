//! Merging anchor records with persisted stage flags.

use std::collections::HashMap;

use crate::models::{
    AnchorRecord, FlagSnapshot, ScreeningRecord, StageOverride, StudentKey,
};

/// One table's rows indexed by key. Later rows replace earlier ones.
struct FlagIndex<V> {
    rows: HashMap<StudentKey, (V, u32)>,
}

impl<V: Copy> FlagIndex<V> {
    fn build<T>(
        rows: &[T],
        key: impl Fn(&T) -> &StudentKey,
        value: impl Fn(&T) -> (V, u32),
    ) -> Self {
        let rows = rows
            .iter()
            .map(|row| (key(row).clone(), value(row)))
            .collect();
        Self { rows }
    }

    /// Id-keyed row first, then the legacy name-keyed row. Only id-keyed
    /// rows report a version.
    fn lookup(&self, anchor: &AnchorRecord) -> Option<(V, u32)> {
        if let Some(found) = self.rows.get(&StudentKey::Id(anchor.student_id)) {
            return Some(*found);
        }
        self.rows
            .get(&StudentKey::Name(anchor.student_name.clone()))
            .map(|(value, _)| (*value, 0))
    }
}

/// Produces screening records from anchors and flag rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageReconciler;

impl StageReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Unmatched records keep every stage `false`; unmatched flag rows are
    /// ignored. Output order follows the anchors.
    pub fn reconcile(&self, anchors: &[AnchorRecord], flags: &FlagSnapshot) -> Vec<ScreeningRecord> {
        let exam_done = FlagIndex::build(&flags.exam_done, |r| &r.key, |r| (r.exam_done, r.version));
        let needs_glasses = FlagIndex::build(
            &flags.needs_glasses,
            |r| &r.key,
            |r| ((r.needs_glasses, r.other_pathology), r.version),
        );
        let delivered = FlagIndex::build(&flags.delivered, |r| &r.key, |r| (r.delivered, r.version));

        anchors
            .iter()
            .map(|anchor| {
                let mut record = ScreeningRecord::from_anchor(anchor);
                if let Some((done, version)) = exam_done.lookup(anchor) {
                    record.stages.exam_done = done;
                    record.versions.exam_done = version;
                }
                if let Some(((needs, other), version)) = needs_glasses.lookup(anchor) {
                    record.stages.needs_glasses = needs;
                    record.stages.other_pathology = other;
                    record.versions.needs_glasses = version;
                }
                if let Some((done, version)) = delivered.lookup(anchor) {
                    record.stages.delivered = done;
                    record.versions.delivered = version;
                }
                record
            })
            .collect()
    }

    /// Copy of `records` with the overrides applied in order. A name key
    /// applies to every record carrying that name.
    pub fn apply_overrides(
        &self,
        records: &[ScreeningRecord],
        overrides: &[StageOverride],
    ) -> Vec<ScreeningRecord> {
        let mut updated = records.to_vec();
        for edit in overrides {
            for record in updated.iter_mut().filter(|r| r.matches(&edit.key)) {
                record.stages = edit.stages;
            }
        }
        updated
    }
}
