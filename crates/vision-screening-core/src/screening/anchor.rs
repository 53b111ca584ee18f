//! Per-student anchor exam selection.

use std::collections::{BTreeMap, HashMap};

use super::classify::CriticalClassifier;
use super::filter::FilteredSnapshot;
use crate::models::{AnchorRecord, CriticalStatus, Exam, School, StudentId};

/// Picks each student's earliest in-range exam.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorSelector {
    classifier: CriticalClassifier,
}

impl AnchorSelector {
    pub fn new(classifier: CriticalClassifier) -> Self {
        Self { classifier }
    }

    /// One anchor per student with at least one surviving exam, ordered by
    /// student id. Ties on timestamp go to the lowest exam id. The record is
    /// critical when any of the student's in-range exams is.
    pub fn select(&self, filtered: &FilteredSnapshot) -> Vec<AnchorRecord> {
        let schools: HashMap<i64, &School> = filtered.schools.iter().map(|s| (s.id, s)).collect();
        let students: HashMap<StudentId, _> = filtered.students.iter().map(|s| (s.id, s)).collect();

        let mut by_student: BTreeMap<StudentId, Vec<&Exam>> = BTreeMap::new();
        for exam in &filtered.exams {
            if exam.taken_at.is_some() {
                by_student.entry(exam.student_id).or_default().push(exam);
            }
        }

        let mut anchors = Vec::with_capacity(by_student.len());
        for (student_id, exams) in by_student {
            let Some(student) = students.get(&student_id) else {
                continue;
            };
            let Some(school) = student.school_id.and_then(|id| schools.get(&id)) else {
                continue;
            };
            let Some((taken_at, exam_id)) = exams
                .iter()
                .filter_map(|e| e.taken_at.map(|at| (at, e.id)))
                .min()
            else {
                continue;
            };

            let critical = if exams
                .iter()
                .any(|e| self.classifier.classify(e).is_critical())
            {
                CriticalStatus::Critical
            } else {
                CriticalStatus::Normal
            };

            anchors.push(AnchorRecord {
                student_id,
                student_name: student.name.clone(),
                exam_id,
                taken_at,
                school_id: school.id,
                school_name: school.name.clone(),
                region: school.region.clone(),
                critical,
                exam_count: exams.len(),
            });
        }

        tracing::debug!(anchors = anchors.len(), "anchor exams selected");
        anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, EyeMeasurements, Student};
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn exam(id: i64, student_id: i64, taken_at: chrono::NaiveDateTime, sph: f64) -> Exam {
        Exam {
            id,
            student_id,
            student_name: String::new(),
            taken_at: Some(taken_at),
            right: EyeMeasurements::refraction(sph, 0.0),
            left: EyeMeasurements::default(),
            interpupillary_distance_mm: None,
        }
    }

    fn filtered(exams: Vec<Exam>) -> FilteredSnapshot {
        FilteredSnapshot {
            schools: vec![School {
                id: 1,
                name: "EC 01".into(),
                address: Address::default(),
                region: Some("Norte".into()),
                latitude: None,
                longitude: None,
                total_students: 2,
            }],
            students: [1, 2]
                .into_iter()
                .map(|id| Student {
                    id,
                    name: format!("Aluno {id}"),
                    birth_date: NaiveDate::from_ymd_opt(2015, 5, 1).unwrap(),
                    sex: "M".into(),
                    school_id: Some(1),
                    region: None,
                })
                .collect(),
            exams,
            ..FilteredSnapshot::default()
        }
    }

    #[test]
    fn test_earliest_exam_is_anchor() {
        let snapshot = filtered(vec![
            exam(10, 1, at(5, 9), 0.0),
            exam(11, 1, at(2, 9), 0.0),
            exam(12, 2, at(7, 9), 0.0),
        ]);
        let anchors = AnchorSelector::default().select(&snapshot);

        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].student_id, 1);
        assert_eq!(anchors[0].exam_id, 11);
        assert_eq!(anchors[0].taken_at, at(2, 9));
        assert_eq!(anchors[0].exam_count, 2);
        assert_eq!(anchors[0].region.as_deref(), Some("Norte"));
        assert_eq!(anchors[1].exam_id, 12);
    }

    #[test]
    fn test_timestamp_tie_goes_to_lowest_id() {
        let snapshot = filtered(vec![exam(21, 1, at(3, 8), 0.0), exam(20, 1, at(3, 8), 0.0)]);
        let anchors = AnchorSelector::default().select(&snapshot);
        assert_eq!(anchors[0].exam_id, 20);
    }

    #[test]
    fn test_any_critical_exam_marks_record() {
        let snapshot = filtered(vec![exam(10, 1, at(1, 9), 0.5), exam(11, 1, at(9, 9), 5.0)]);
        let anchors = AnchorSelector::default().select(&snapshot);
        assert_eq!(anchors[0].exam_id, 10);
        assert_eq!(anchors[0].critical, CriticalStatus::Critical);
    }

    #[test]
    fn test_no_exams_no_anchor() {
        let anchors = AnchorSelector::default().select(&filtered(Vec::new()));
        assert!(anchors.is_empty());
    }
}
