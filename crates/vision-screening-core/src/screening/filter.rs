//! Cascading region → school → date filter.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{PipelineError, PipelineResult};
use crate::models::{Exam, School, Snapshot, Student};

/// Inclusive range of exam dates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> PipelineResult<Self> {
        if start > end {
            return Err(PipelineError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Min–max span of the timestamped exams, if any.
    pub fn span_of(exams: &[Exam]) -> Option<Self> {
        let mut dates = exams.iter().filter_map(Exam::date);
        let first = dates.next()?;
        let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self { start, end })
    }
}

/// User filter choices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FilterSelection {
    /// Selected region labels; empty selects nothing
    pub regions: Vec<String>,
    /// Exact school names; `None` keeps every school of the selected regions
    pub schools: Option<Vec<String>>,
    /// `None` spans every exam in the snapshot
    pub date_range: Option<DateRange>,
}

impl FilterSelection {
    /// Select every region present in the snapshot.
    pub fn all_regions(snapshot: &Snapshot, no_region_label: &str) -> Self {
        Self {
            regions: snapshot.regions(no_region_label),
            schools: None,
            date_range: None,
        }
    }

    pub fn with_schools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schools = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }
}

/// Rows left out of the analysis and why.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DataQuality {
    /// In-scope exams excluded for lacking a usable timestamp
    pub exams_missing_timestamp: usize,
    /// Exams whose stored timestamp could not be parsed (whole snapshot)
    pub exams_unparseable_timestamp: usize,
    /// Exams referencing a student absent from the snapshot
    pub exams_without_student: usize,
    /// Students whose school is unknown; they never pass the school filter
    pub students_without_school: usize,
}

impl DataQuality {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Consistent subset of the three snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FilteredSnapshot {
    pub schools: Vec<School>,
    pub students: Vec<Student>,
    /// Only timestamped exams inside the effective date range
    pub exams: Vec<Exam>,
    /// Effective date range (explicit or the snapshot's span)
    pub date_range: Option<DateRange>,
    pub quality: DataQuality,
}

impl FilteredSnapshot {
    pub fn school(&self, id: i64) -> Option<&School> {
        self.schools.iter().find(|s| s.id == id)
    }
}

/// Applies a [`FilterSelection`] to a [`Snapshot`].
pub struct FilterEngine<'a> {
    no_region_label: &'a str,
}

impl<'a> FilterEngine<'a> {
    pub fn new(no_region_label: &'a str) -> Self {
        Self { no_region_label }
    }

    pub fn apply(&self, snapshot: &Snapshot, selection: &FilterSelection) -> FilteredSnapshot {
        let regions: HashSet<&str> = selection.regions.iter().map(String::as_str).collect();
        let school_names: Option<HashSet<&str>> = selection
            .schools
            .as_ref()
            .map(|names| names.iter().map(String::as_str).collect());

        // Schools: region, then exact name
        let schools: Vec<School> = snapshot
            .schools
            .iter()
            .filter(|s| regions.contains(s.region_label(self.no_region_label)))
            .filter(|s| {
                school_names
                    .as_ref()
                    .map_or(true, |names| names.contains(s.name.as_str()))
            })
            .cloned()
            .collect();
        let school_ids: HashSet<i64> = schools.iter().map(|s| s.id).collect();

        // Students of surviving schools
        let students: Vec<Student> = snapshot
            .students
            .iter()
            .filter(|s| s.school_id.is_some_and(|id| school_ids.contains(&id)))
            .cloned()
            .collect();
        let student_ids: HashSet<i64> = students.iter().map(|s| s.id).collect();

        // Exams of surviving students, then by date
        let date_range = selection
            .date_range
            .or_else(|| DateRange::span_of(&snapshot.exams));
        let mut exams_missing_timestamp = 0;
        let exams: Vec<Exam> = snapshot
            .exams
            .iter()
            .filter(|e| student_ids.contains(&e.student_id))
            .filter(|e| match e.date() {
                Some(date) => date_range.is_some_and(|r| r.contains(date)),
                None => {
                    exams_missing_timestamp += 1;
                    false
                }
            })
            .cloned()
            .collect();

        let quality = DataQuality {
            exams_missing_timestamp,
            exams_unparseable_timestamp: snapshot.warnings.unparseable_exam_timestamps,
            exams_without_student: count_orphan_exams(snapshot),
            students_without_school: count_unschooled_students(snapshot),
        };
        if exams_missing_timestamp > 0 {
            tracing::warn!(
                excluded = exams_missing_timestamp,
                "exams without a usable timestamp were excluded"
            );
        }

        FilteredSnapshot {
            schools,
            students,
            exams,
            date_range,
            quality,
        }
    }
}

fn count_orphan_exams(snapshot: &Snapshot) -> usize {
    let known: HashSet<i64> = snapshot.students.iter().map(|s| s.id).collect();
    snapshot
        .exams
        .iter()
        .filter(|e| !known.contains(&e.student_id))
        .count()
}

fn count_unschooled_students(snapshot: &Snapshot) -> usize {
    let known: HashSet<i64> = snapshot.schools.iter().map(|s| s.id).collect();
    snapshot
        .students
        .iter()
        .filter(|s| !s.school_id.is_some_and(|id| known.contains(&id)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, EyeMeasurements};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn school(id: i64, name: &str, region: Option<&str>) -> School {
        School {
            id,
            name: name.into(),
            address: Address::default(),
            region: region.map(Into::into),
            latitude: None,
            longitude: None,
            total_students: 0,
        }
    }

    fn student(id: i64, school_id: Option<i64>) -> Student {
        Student {
            id,
            name: format!("Student {id}"),
            birth_date: date(2015, 1, 1),
            sex: "F".into(),
            school_id,
            region: None,
        }
    }

    fn exam(id: i64, student_id: i64, day: Option<NaiveDate>) -> Exam {
        Exam {
            id,
            student_id,
            student_name: format!("Student {student_id}"),
            taken_at: day.and_then(|d| d.and_hms_opt(9, 0, 0)),
            right: EyeMeasurements::default(),
            left: EyeMeasurements::default(),
            interpupillary_distance_mm: None,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            schools: vec![
                school(1, "EC 01", Some("Ceilândia")),
                school(2, "EC 02", Some("Taguatinga")),
                school(3, "EC 03", None),
            ],
            students: vec![
                student(10, Some(1)),
                student(11, Some(2)),
                student(12, Some(3)),
                student(13, None),
            ],
            exams: vec![
                exam(100, 10, Some(date(2024, 1, 10))),
                exam(101, 11, Some(date(2024, 2, 1))),
                exam(102, 12, Some(date(2024, 3, 5))),
                exam(103, 10, None),
                exam(104, 99, Some(date(2024, 1, 1))),
            ],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_region_cascade() {
        let engine = FilterEngine::new("Sem Região");
        let selection = FilterSelection {
            regions: vec!["Ceilândia".into()],
            ..FilterSelection::default()
        };
        let filtered = engine.apply(&snapshot(), &selection);

        assert_eq!(filtered.schools.len(), 1);
        assert_eq!(filtered.students.iter().map(|s| s.id).collect::<Vec<_>>(), vec![10]);
        assert_eq!(filtered.exams.iter().map(|e| e.id).collect::<Vec<_>>(), vec![100]);
        assert_eq!(filtered.quality.exams_missing_timestamp, 1);
    }

    #[test]
    fn test_no_region_label_selects_regionless_schools() {
        let engine = FilterEngine::new("Sem Região");
        let selection = FilterSelection {
            regions: vec!["Sem Região".into()],
            ..FilterSelection::default()
        };
        let filtered = engine.apply(&snapshot(), &selection);
        assert_eq!(filtered.schools.len(), 1);
        assert_eq!(filtered.schools[0].id, 3);
        assert_eq!(filtered.exams.len(), 1);
    }

    #[test]
    fn test_school_name_filter() {
        let engine = FilterEngine::new("Sem Região");
        let selection = FilterSelection::all_regions(&snapshot(), "Sem Região").with_schools(["EC 02"]);
        let filtered = engine.apply(&snapshot(), &selection);
        assert_eq!(filtered.schools.len(), 1);
        assert_eq!(filtered.students.len(), 1);
        assert_eq!(filtered.exams[0].id, 101);
    }

    #[test]
    fn test_date_range_inclusive() {
        let engine = FilterEngine::new("Sem Região");
        let range = DateRange::new(date(2024, 1, 10), date(2024, 2, 1)).unwrap();
        let selection = FilterSelection::all_regions(&snapshot(), "Sem Região").with_date_range(range);
        let filtered = engine.apply(&snapshot(), &selection);
        let ids: Vec<i64> = filtered.exams.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![100, 101]);
    }

    #[test]
    fn test_default_date_range_spans_snapshot() {
        let engine = FilterEngine::new("Sem Região");
        let selection = FilterSelection::all_regions(&snapshot(), "Sem Região");
        let filtered = engine.apply(&snapshot(), &selection);
        assert_eq!(
            filtered.date_range,
            Some(DateRange {
                start: date(2024, 1, 1),
                end: date(2024, 3, 5)
            })
        );
        assert_eq!(filtered.exams.len(), 3);
    }

    #[test]
    fn test_empty_selection_is_empty() {
        let engine = FilterEngine::new("Sem Região");
        let filtered = engine.apply(&snapshot(), &FilterSelection::default());
        assert!(filtered.schools.is_empty());
        assert!(filtered.students.is_empty());
        assert!(filtered.exams.is_empty());
    }

    #[test]
    fn test_quality_counters() {
        let engine = FilterEngine::new("Sem Região");
        let filtered = engine.apply(&snapshot(), &FilterSelection::default());
        assert_eq!(filtered.quality.exams_without_student, 1);
        assert_eq!(filtered.quality.students_without_school, 1);
        assert!(!filtered.quality.is_clean());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = DateRange::new(date(2024, 2, 1), date(2024, 1, 1));
        assert!(matches!(result, Err(PipelineError::InvalidDateRange { .. })));
    }
}
