//! Exam database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_timestamp, Database, DbError, DbResult, TIMESTAMP_FORMAT};
use crate::models::{Exam, ExamId, EyeMeasurements, NewExam};

const SELECT_EXAM: &str = r#"
    SELECT x.exam_id, x.student_id, a.name, x.taken_at,
           x.od_spherical, x.od_cylindrical, x.od_dioptric_cylinder, x.od_axis,
           x.od_corneal_radius_mm, x.od_kerato_steep_axis, x.od_kerato_flat_axis,
           x.os_spherical, x.os_cylindrical, x.os_dioptric_cylinder, x.os_axis,
           x.os_corneal_radius_mm, x.os_kerato_steep_axis, x.os_kerato_flat_axis,
           x.interpupillary_distance_mm
    FROM exams x
    JOIN students a ON a.student_id = x.student_id
"#;

/// Raw exam row; the timestamp is parsed afterwards so that bad values can
/// be counted instead of failing the whole load.
struct ExamRow {
    exam: Exam,
    raw_taken_at: Option<String>,
}

fn eye_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<EyeMeasurements> {
    Ok(EyeMeasurements {
        spherical: row.get(offset)?,
        cylindrical: row.get(offset + 1)?,
        dioptric_cylinder: row.get(offset + 2)?,
        axis: row.get(offset + 3)?,
        corneal_radius_mm: row.get(offset + 4)?,
        kerato_steep_axis: row.get(offset + 5)?,
        kerato_flat_axis: row.get(offset + 6)?,
    })
}

fn exam_from_row(row: &Row<'_>) -> rusqlite::Result<ExamRow> {
    let raw_taken_at: Option<String> = row.get(3)?;
    Ok(ExamRow {
        exam: Exam {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student_name: row.get(2)?,
            taken_at: raw_taken_at.as_deref().and_then(parse_timestamp),
            right: eye_from_row(row, 4)?,
            left: eye_from_row(row, 11)?,
            interpupillary_distance_mm: row.get(18)?,
        },
        raw_taken_at,
    })
}

impl ExamRow {
    fn has_unparseable_timestamp(&self) -> bool {
        self.exam.taken_at.is_none()
            && self
                .raw_taken_at
                .as_deref()
                .is_some_and(|raw| !raw.trim().is_empty())
    }
}

impl Database {
    /// Submit a new exam. The student must exist.
    pub fn insert_exam(&self, exam: &NewExam) -> DbResult<Exam> {
        if self.get_student(exam.student_id)?.is_none() {
            return Err(DbError::NotFound(format!("student {}", exam.student_id)));
        }

        let taken_at = exam
            .taken_at
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string());
        let (od, os) = (&exam.right, &exam.left);

        self.conn.execute(
            r#"
            INSERT INTO exams (
                student_id, taken_at,
                od_spherical, od_cylindrical, od_dioptric_cylinder, od_axis,
                od_corneal_radius_mm, od_kerato_steep_axis, od_kerato_flat_axis,
                os_spherical, os_cylindrical, os_dioptric_cylinder, os_axis,
                os_corneal_radius_mm, os_kerato_steep_axis, os_kerato_flat_axis,
                interpupillary_distance_mm
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                exam.student_id,
                taken_at,
                od.spherical,
                od.cylindrical,
                od.dioptric_cylinder,
                od.axis,
                od.corneal_radius_mm,
                od.kerato_steep_axis,
                od.kerato_flat_axis,
                os.spherical,
                os.cylindrical,
                os.dioptric_cylinder,
                os.axis,
                os.corneal_radius_mm,
                os.kerato_steep_axis,
                os.kerato_flat_axis,
                exam.interpupillary_distance_mm,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_exam(id)?
            .ok_or_else(|| DbError::NotFound(format!("exam {id}")))
    }

    /// Correct the refractive readings of an exam.
    pub fn update_exam_measurements(
        &self,
        id: ExamId,
        right: &EyeMeasurements,
        left: &EyeMeasurements,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE exams SET
                od_spherical = ?2, od_cylindrical = ?3, od_dioptric_cylinder = ?4,
                od_axis = ?5, od_corneal_radius_mm = ?6, od_kerato_steep_axis = ?7,
                od_kerato_flat_axis = ?8,
                os_spherical = ?9, os_cylindrical = ?10, os_dioptric_cylinder = ?11,
                os_axis = ?12, os_corneal_radius_mm = ?13, os_kerato_steep_axis = ?14,
                os_kerato_flat_axis = ?15
            WHERE exam_id = ?1
            "#,
            params![
                id,
                right.spherical,
                right.cylindrical,
                right.dioptric_cylinder,
                right.axis,
                right.corneal_radius_mm,
                right.kerato_steep_axis,
                right.kerato_flat_axis,
                left.spherical,
                left.cylindrical,
                left.dioptric_cylinder,
                left.axis,
                left.corneal_radius_mm,
                left.kerato_steep_axis,
                left.kerato_flat_axis,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an exam by ID.
    pub fn get_exam(&self, id: ExamId) -> DbResult<Option<Exam>> {
        let sql = format!("{SELECT_EXAM} WHERE x.exam_id = ?");
        self.conn
            .query_row(&sql, [id], exam_from_row)
            .optional()
            .map(|row| row.map(|r| r.exam))
            .map_err(Into::into)
    }

    /// List all exams, returning how many had an unparseable timestamp.
    pub fn list_exams(&self) -> DbResult<(Vec<Exam>, usize)> {
        let sql = format!("{SELECT_EXAM} ORDER BY x.exam_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], exam_from_row)?;

        let mut exams = Vec::new();
        let mut unparseable = 0;
        for row in rows {
            let row = row?;
            if row.has_unparseable_timestamp() {
                tracing::warn!(
                    exam_id = row.exam.id,
                    raw = row.raw_taken_at.as_deref().unwrap_or_default(),
                    "exam timestamp could not be parsed"
                );
                unparseable += 1;
            }
            exams.push(row.exam);
        }

        Ok((exams, unparseable))
    }
}
