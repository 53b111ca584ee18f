//! Screening pipeline.
//!
//! Pipeline: Filter → Classification → Anchor Selection → Stage Reconciliation → Metrics
//!
//! Every run starts from an immutable [`Snapshot`] and produces fresh record
//! sets; unsaved edits are layered on top as overrides.

mod anchor;
mod classify;
mod filter;
mod reconcile;
mod session;

pub use anchor::*;
pub use classify::*;
pub use filter::*;
pub use reconcile::*;
pub use session::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ScreeningConfig;
use crate::metrics::{MetricsEngine, OverviewLabels, OverviewMetrics, ScreeningMetrics};
use crate::models::{ScreeningRecord, Snapshot, StageOverride, StudentId};

/// Pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Student {0} has no screening record in the current selection")]
    UnknownStudent(StudentId),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub filtered: FilteredSnapshot,
    /// Records as persisted, before overrides
    pub base_records: Vec<ScreeningRecord>,
    /// Records with overrides applied; metrics are computed from these
    pub records: Vec<ScreeningRecord>,
    pub metrics: ScreeningMetrics,
    pub overview: OverviewMetrics,
}

impl Dashboard {
    pub fn quality(&self) -> DataQuality {
        self.filtered.quality
    }
}

/// Runs the full recomputation for a selection.
pub struct Pipeline<'a> {
    config: &'a ScreeningConfig,
    classifier: CriticalClassifier,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ScreeningConfig) -> Self {
        Self {
            config,
            classifier: CriticalClassifier::from_config(config),
        }
    }

    pub fn run(
        &self,
        snapshot: &Snapshot,
        selection: &FilterSelection,
        overrides: &[StageOverride],
    ) -> PipelineResult<Dashboard> {
        if let Some(range) = selection.date_range {
            DateRange::new(range.start, range.end)?;
        }

        // Step 1: Filter
        let filtered = FilterEngine::new(&self.config.no_region_label).apply(snapshot, selection);

        // Step 2: Anchor exams, classified
        let anchors = AnchorSelector::new(self.classifier).select(&filtered);

        // Step 3: Merge persisted flags, then unsaved edits
        let reconciler = StageReconciler::new();
        let base_records = reconciler.reconcile(&anchors, &snapshot.flags);
        let records = reconciler.apply_overrides(&base_records, overrides);

        // Step 4: Metrics
        let metrics = MetricsEngine::new(self.config).compute(&records);
        let overview = OverviewMetrics::compute(
            &filtered,
            &records,
            &self.classifier,
            OverviewLabels {
                no_region: &self.config.no_region_label,
                other_regions: &self.config.other_regions_label,
                top_regions: self.config.top_regions,
            },
        );

        tracing::debug!(
            schools = filtered.schools.len(),
            students = filtered.students.len(),
            exams = filtered.exams.len(),
            records = records.len(),
            overrides = overrides.len(),
            "pipeline run complete"
        );

        Ok(Dashboard {
            filtered,
            base_records,
            records,
            metrics,
            overview,
        })
    }
}
