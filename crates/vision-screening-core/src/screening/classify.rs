//! Critical exam classification.

use crate::config::{ScreeningConfig, DEFAULT_CRITICAL_THRESHOLD_DIOPTERS};
use crate::models::{CriticalStatus, Exam, EyeMeasurements};

/// Labels exams from right-eye refraction. An exam is critical when the
/// spherical or cylindrical power strictly exceeds the threshold; missing
/// readings never make an exam critical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalClassifier {
    threshold: f64,
}

impl Default for CriticalClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CRITICAL_THRESHOLD_DIOPTERS)
    }
}

impl CriticalClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &ScreeningConfig) -> Self {
        Self::new(config.critical_threshold_diopters)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, exam: &Exam) -> CriticalStatus {
        if self.exceeds(&exam.right) {
            CriticalStatus::Critical
        } else {
            CriticalStatus::Normal
        }
    }

    fn exceeds(&self, eye: &EyeMeasurements) -> bool {
        let above = |v: Option<f64>| v.is_some_and(|v| v > self.threshold);
        above(eye.spherical) || above(eye.cylindrical)
    }
}
