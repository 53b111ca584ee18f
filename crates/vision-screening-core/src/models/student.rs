//! Student models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::SchoolId;

/// Database identifier of a student.
pub type StudentId = i64;

/// A registered student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: StudentId,
    /// Display name (not unique)
    pub name: String,
    pub birth_date: NaiveDate,
    pub sex: String,
    /// Owning school; `None` when the reference could not be resolved
    pub school_id: Option<SchoolId>,
    /// Redundant copy of the school's region
    pub region: Option<String>,
}

/// Registration payload for a new student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStudent {
    pub name: String,
    pub birth_date: NaiveDate,
    pub sex: String,
    pub school_id: SchoolId,
    pub region: String,
}
