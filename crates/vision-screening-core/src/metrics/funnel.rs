//! Funnel counts, conversion ratios and the examined donut.

use serde::{Deserialize, Serialize};

use crate::models::ScreeningRecord;

/// Independent stage counts. No ordering between stages is assumed, so a
/// later stage may exceed an earlier one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FunnelCounts {
    /// Records labeled critical
    pub indicated: usize,
    pub examined: usize,
    pub needs_glasses: usize,
    pub delivered: usize,
}

impl FunnelCounts {
    pub fn from_records(records: &[ScreeningRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            acc.indicated += usize::from(r.critical.is_critical());
            acc.examined += usize::from(r.stages.exam_done);
            acc.needs_glasses += usize::from(r.stages.needs_glasses);
            acc.delivered += usize::from(r.stages.delivered);
            acc
        })
    }
}

/// A percentage whose denominator is floored to 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ratio {
    pub numerator: usize,
    pub denominator: usize,
    pub percent: f64,
    /// One decimal, e.g. "37.5%"
    pub label: String,
}

impl Ratio {
    pub fn new(numerator: usize, denominator: usize) -> Self {
        let percent = numerator as f64 / denominator.max(1) as f64 * 100.0;
        Self {
            numerator,
            denominator,
            percent,
            label: format_percent(percent),
        }
    }
}

pub fn format_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}

/// Stage-to-stage conversion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionRatios {
    pub examined_of_indicated: Ratio,
    pub needs_glasses_of_examined: Ratio,
    pub delivered_of_needs_glasses: Ratio,
}

impl ConversionRatios {
    pub fn from_funnel(funnel: &FunnelCounts) -> Self {
        Self {
            examined_of_indicated: Ratio::new(funnel.examined, funnel.indicated),
            needs_glasses_of_examined: Ratio::new(funnel.needs_glasses, funnel.examined),
            delivered_of_needs_glasses: Ratio::new(funnel.delivered, funnel.needs_glasses),
        }
    }
}

/// Findings among examined students. The two counts may overlap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DonutSplit {
    pub examined: usize,
    pub needs_glasses: usize,
    pub other_pathology: usize,
}

impl DonutSplit {
    pub fn from_records(records: &[ScreeningRecord]) -> Self {
        records
            .iter()
            .filter(|r| r.stages.exam_done)
            .fold(Self::default(), |mut acc, r| {
                acc.examined += 1;
                acc.needs_glasses += usize::from(r.stages.needs_glasses);
                acc.other_pathology += usize::from(r.stages.other_pathology);
                acc
            })
    }
}
