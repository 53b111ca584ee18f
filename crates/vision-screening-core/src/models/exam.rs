//! Exam models.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::StudentId;

/// Database identifier of an exam.
pub type ExamId = i64;

/// Refractive and keratometry readings for one eye. Every field is optional
/// because the autorefractor does not always report all of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EyeMeasurements {
    /// Spherical power (diopters)
    pub spherical: Option<f64>,
    /// Cylindrical power (diopters)
    pub cylindrical: Option<f64>,
    /// Cylinder as reported by the device in minus form
    pub dioptric_cylinder: Option<f64>,
    /// Cylinder axis in degrees
    pub axis: Option<i32>,
    pub corneal_radius_mm: Option<f64>,
    pub kerato_steep_axis: Option<f64>,
    pub kerato_flat_axis: Option<f64>,
}

impl EyeMeasurements {
    /// Readings with only spherical and cylindrical power set.
    pub fn refraction(spherical: f64, cylindrical: f64) -> Self {
        Self {
            spherical: Some(spherical),
            cylindrical: Some(cylindrical),
            ..Self::default()
        }
    }
}

/// An exam joined to its owning student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exam {
    pub id: ExamId,
    pub student_id: StudentId,
    /// Student display name, copied in by the loader join
    pub student_name: String,
    /// Scan timestamp; `None` when missing or unparseable in storage
    pub taken_at: Option<NaiveDateTime>,
    /// Right eye (OD)
    pub right: EyeMeasurements,
    /// Left eye (OS)
    pub left: EyeMeasurements,
    pub interpupillary_distance_mm: Option<f64>,
}

impl Exam {
    /// Calendar date of the scan.
    pub fn date(&self) -> Option<NaiveDate> {
        self.taken_at.map(|t| t.date())
    }
}

/// Submission payload for a new exam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewExam {
    pub student_id: StudentId,
    pub taken_at: Option<NaiveDateTime>,
    pub right: EyeMeasurements,
    pub left: EyeMeasurements,
    pub interpupillary_distance_mm: Option<f64>,
}

impl NewExam {
    /// Create a submission with no measurements.
    pub fn new(student_id: StudentId, taken_at: Option<NaiveDateTime>) -> Self {
        Self {
            student_id,
            taken_at,
            right: EyeMeasurements::default(),
            left: EyeMeasurements::default(),
            interpupillary_distance_mm: None,
        }
    }
}
