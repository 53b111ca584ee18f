//! Student database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult, DATE_FORMAT};
use crate::models::{NewStudent, Student, StudentId};

const SELECT_STUDENT: &str = r#"
    SELECT student_id, name, birth_date, sex, school_id, region
    FROM students
"#;

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let birth_raw: String = row.get(2)?;
    let birth_date = NaiveDate::parse_from_str(&birth_raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        birth_date,
        sex: row.get(3)?,
        school_id: row.get(4)?,
        region: row.get(5)?,
    })
}

impl Database {
    /// Register a new student. The school must exist.
    pub fn insert_student(&self, student: &NewStudent) -> DbResult<Student> {
        if student.name.trim().is_empty() {
            return Err(DbError::Invalid("student name is required".into()));
        }
        if student.sex.trim().is_empty() {
            return Err(DbError::Invalid("student sex is required".into()));
        }
        if self.get_school(student.school_id)?.is_none() {
            return Err(DbError::NotFound(format!("school {}", student.school_id)));
        }

        self.conn.execute(
            r#"
            INSERT INTO students (name, birth_date, sex, school_id, region)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                student.name.trim(),
                student.birth_date.format(DATE_FORMAT).to_string(),
                student.sex,
                student.school_id,
                student.region,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_student(id)?
            .ok_or_else(|| DbError::NotFound(format!("student {id}")))
    }

    /// Get a student by ID.
    pub fn get_student(&self, id: StudentId) -> DbResult<Option<Student>> {
        let sql = format!("{SELECT_STUDENT} WHERE student_id = ?");
        self.conn
            .query_row(&sql, [id], student_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// All students sharing an exact display name.
    pub fn students_named(&self, name: &str) -> DbResult<Vec<Student>> {
        let sql = format!("{SELECT_STUDENT} WHERE name = ? ORDER BY student_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([name], student_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List all students.
    pub fn list_students(&self) -> DbResult<Vec<Student>> {
        let sql = format!("{SELECT_STUDENT} ORDER BY student_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], student_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSchool;

    fn setup_db() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let school = db
            .insert_school(&NewSchool::new("EC 01".into(), "Ceilândia".into()))
            .unwrap();
        (db, school.id)
    }

    fn new_student(name: &str, school_id: i64) -> NewStudent {
        NewStudent {
            name: name.into(),
            birth_date: NaiveDate::from_ymd_opt(2014, 8, 21).unwrap(),
            sex: "M".into(),
            school_id,
            region: "Ceilândia".into(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let (db, school_id) = setup_db();
        let student = db.insert_student(&new_student("  Bruno Costa ", school_id)).unwrap();

        let retrieved = db.get_student(student.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Bruno Costa");
        assert_eq!(retrieved.school_id, Some(school_id));
        assert_eq!(
            retrieved.birth_date,
            NaiveDate::from_ymd_opt(2014, 8, 21).unwrap()
        );
    }

    #[test]
    fn test_insert_unknown_school() {
        let (db, school_id) = setup_db();
        let result = db.insert_student(&new_student("Bruno", school_id + 100));
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_students_named_returns_homonyms() {
        let (db, school_id) = setup_db();
        db.insert_student(&new_student("Ana Silva", school_id)).unwrap();
        db.insert_student(&new_student("Ana Silva", school_id)).unwrap();
        db.insert_student(&new_student("Ana Souza", school_id)).unwrap();

        assert_eq!(db.students_named("Ana Silva").unwrap().len(), 2);
        assert_eq!(db.students_named("Ana").unwrap().len(), 0);
        assert_eq!(db.list_students().unwrap().len(), 3);
    }
}
