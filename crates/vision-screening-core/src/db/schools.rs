//! School database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Address, NewSchool, School, SchoolId};

const SELECT_SCHOOL: &str = r#"
    SELECT s.school_id, s.name, s.street, s.number, s.complement, s.district,
           s.city, s.state, s.postal_code, s.region, s.latitude, s.longitude,
           COUNT(a.student_id) AS total_students
    FROM schools s
    LEFT JOIN students a ON a.school_id = s.school_id
"#;

fn school_from_row(row: &Row<'_>) -> rusqlite::Result<School> {
    Ok(School {
        id: row.get(0)?,
        name: row.get(1)?,
        address: Address {
            street: row.get(2)?,
            number: row.get(3)?,
            complement: row.get(4)?,
            district: row.get(5)?,
            city: row.get(6)?,
            state: row.get(7)?,
            postal_code: row.get(8)?,
        },
        region: row.get(9)?,
        latitude: row.get(10)?,
        longitude: row.get(11)?,
        total_students: row.get(12)?,
    })
}

impl Database {
    /// Register a new school.
    pub fn insert_school(&self, school: &NewSchool) -> DbResult<School> {
        if school.name.trim().is_empty() {
            return Err(DbError::Invalid("school name is required".into()));
        }
        if school.region.trim().is_empty() {
            return Err(DbError::Invalid("school region is required".into()));
        }

        self.conn.execute(
            r#"
            INSERT INTO schools (
                name, street, number, complement, district, city, state,
                postal_code, region, latitude, longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                school.name,
                school.address.street,
                school.address.number,
                school.address.complement,
                school.address.district,
                school.address.city,
                school.address.state,
                school.address.postal_code,
                school.region,
                school.latitude,
                school.longitude,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_school(id)?
            .ok_or_else(|| DbError::NotFound(format!("school {id}")))
    }

    /// Update an existing school.
    pub fn update_school(&self, school: &School) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE schools SET
                name = ?2,
                street = ?3,
                number = ?4,
                complement = ?5,
                district = ?6,
                city = ?7,
                state = ?8,
                postal_code = ?9,
                region = ?10,
                latitude = ?11,
                longitude = ?12,
                updated_at = datetime('now')
            WHERE school_id = ?1
            "#,
            params![
                school.id,
                school.name,
                school.address.street,
                school.address.number,
                school.address.complement,
                school.address.district,
                school.address.city,
                school.address.state,
                school.address.postal_code,
                school.region,
                school.latitude,
                school.longitude,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a school by ID.
    pub fn get_school(&self, id: SchoolId) -> DbResult<Option<School>> {
        let sql = format!("{SELECT_SCHOOL} WHERE s.school_id = ? GROUP BY s.school_id");
        self.conn
            .query_row(&sql, [id], school_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// List all schools with their student counts.
    pub fn list_schools(&self) -> DbResult<Vec<School>> {
        let sql = format!("{SELECT_SCHOOL} GROUP BY s.school_id ORDER BY s.name, s.school_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], school_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a school. Refused while any student references it.
    pub fn delete_school(&self, id: SchoolId) -> DbResult<bool> {
        let referencing: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM students WHERE school_id = ?",
            [id],
            |row| row.get(0),
        )?;
        if referencing > 0 {
            return Err(DbError::Constraint(format!(
                "school {id} is referenced by {referencing} student(s)"
            )));
        }

        let rows_affected = self
            .conn
            .execute("DELETE FROM schools WHERE school_id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}
