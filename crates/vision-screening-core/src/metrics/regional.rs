//! Stage totals per region.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::ScreeningRecord;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RegionalRow {
    pub region: String,
    pub exam_done: usize,
    pub needs_glasses: usize,
    pub delivered: usize,
}

/// Rows sorted by region label. Records without a region are grouped under
/// `no_region_label`.
pub fn regional_stack(records: &[ScreeningRecord], no_region_label: &str) -> Vec<RegionalRow> {
    let mut groups: BTreeMap<&str, RegionalRow> = BTreeMap::new();
    for record in records {
        let label = record.region_label(no_region_label);
        let row = groups.entry(label).or_insert_with(|| RegionalRow {
            region: label.to_string(),
            ..RegionalRow::default()
        });
        row.exam_done += usize::from(record.stages.exam_done);
        row.needs_glasses += usize::from(record.stages.needs_glasses);
        row.delivered += usize::from(record.stages.delivered);
    }
    groups.into_values().collect()
}
