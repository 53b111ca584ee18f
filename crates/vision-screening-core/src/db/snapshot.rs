//! Snapshot loading.

use super::{Database, DbResult};
use crate::models::{LoadWarnings, Snapshot};

impl Database {
    /// Read schools, students, exams and flags into one immutable snapshot.
    pub fn load_snapshot(&self) -> DbResult<Snapshot> {
        let schools = self.list_schools()?;
        let students = self.list_students()?;
        let (exams, unparseable_exam_timestamps) = self.list_exams()?;
        let flags = self.load_flags()?;

        tracing::debug!(
            source = %self.source_key,
            schools = schools.len(),
            students = students.len(),
            exams = exams.len(),
            flag_rows = flags.row_count(),
            "loaded snapshot"
        );

        Ok(Snapshot {
            schools,
            students,
            exams,
            flags,
            warnings: LoadWarnings {
                unparseable_exam_timestamps,
            },
        })
    }
}
