//! Dashboard KPIs and distributions over the filtered snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::funnel::format_percent;
use super::series::MonthlySeries;
use crate::models::{ExamId, School, SchoolId, ScreeningRecord, StudentId};
use crate::screening::{CriticalClassifier, FilteredSnapshot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct KpiTotals {
    /// Sum of enrolled students over the filtered schools
    pub total_students: u64,
    pub total_exams: usize,
    pub distinct_schools: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionCount {
    pub region: String,
    pub students: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchoolExamShare {
    pub school_id: SchoolId,
    pub school_name: String,
    pub exams: usize,
    /// Share of all filtered exams, e.g. "12.5%"
    pub share: String,
}

/// Map layer point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticalSchoolPoint {
    pub school_id: SchoolId,
    pub school_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub critical_students: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionRefraction {
    pub region: String,
    pub exams: usize,
    pub mean_spherical_od: Option<f64>,
    pub mean_cylindrical_od: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamRow {
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub student_name: String,
    pub school_name: String,
    pub region: String,
    pub date: NaiveDate,
    pub spherical_od: Option<f64>,
    pub cylindrical_od: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OverviewMetrics {
    pub totals: KpiTotals,
    pub students_by_region: Vec<RegionCount>,
    pub exams_by_school: Vec<SchoolExamShare>,
    pub critical_by_school: Vec<CriticalSchoolPoint>,
    pub monthly_exams: MonthlySeries,
    pub refraction_by_region: Vec<RegionRefraction>,
    pub exam_rows: Vec<ExamRow>,
}

/// Labels used when grouping by region.
#[derive(Debug, Clone, Copy)]
pub struct OverviewLabels<'a> {
    pub no_region: &'a str,
    pub other_regions: &'a str,
    pub top_regions: usize,
}

impl OverviewMetrics {
    pub fn compute(
        filtered: &FilteredSnapshot,
        records: &[ScreeningRecord],
        classifier: &CriticalClassifier,
        labels: OverviewLabels<'_>,
    ) -> Self {
        let schools: HashMap<SchoolId, &School> =
            filtered.schools.iter().map(|s| (s.id, s)).collect();
        let school_of: HashMap<StudentId, &School> = filtered
            .students
            .iter()
            .filter_map(|st| Some((st.id, *schools.get(&st.school_id?)?)))
            .collect();

        let totals = KpiTotals {
            total_students: filtered.schools.iter().map(|s| u64::from(s.total_students)).sum(),
            total_exams: filtered.exams.len(),
            distinct_schools: filtered
                .schools
                .iter()
                .map(|s| s.name.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
        };

        Self {
            totals,
            students_by_region: students_by_region(filtered, &schools, labels),
            exams_by_school: exams_by_school(filtered, &school_of),
            critical_by_school: critical_by_school(filtered, records),
            monthly_exams: MonthlySeries::from_dates(filtered.exams.iter().filter_map(|e| e.date())),
            refraction_by_region: refraction_by_region(filtered, &school_of, labels.no_region),
            exam_rows: exam_rows(filtered, &school_of, classifier, labels.no_region),
        }
    }
}

/// Top regions by student count with the rest folded into one bucket.
fn students_by_region(
    filtered: &FilteredSnapshot,
    schools: &HashMap<SchoolId, &School>,
    labels: OverviewLabels<'_>,
) -> Vec<RegionCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for student in &filtered.students {
        if let Some(school) = student.school_id.and_then(|id| schools.get(&id)) {
            *counts.entry(school.region_label(labels.no_region)).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<RegionCount> = counts
        .into_iter()
        .map(|(region, students)| RegionCount {
            region: region.to_string(),
            students,
        })
        .collect();
    ranked.sort_by(|a, b| b.students.cmp(&a.students).then_with(|| a.region.cmp(&b.region)));

    if ranked.len() > labels.top_regions {
        let rest: usize = ranked.drain(labels.top_regions..).map(|r| r.students).sum();
        ranked.push(RegionCount {
            region: labels.other_regions.to_string(),
            students: rest,
        });
    }
    ranked
}

fn exams_by_school(
    filtered: &FilteredSnapshot,
    school_of: &HashMap<StudentId, &School>,
) -> Vec<SchoolExamShare> {
    let mut counts: BTreeMap<SchoolId, (&School, usize)> = BTreeMap::new();
    for exam in &filtered.exams {
        if let Some(school) = school_of.get(&exam.student_id) {
            counts.entry(school.id).or_insert((*school, 0)).1 += 1;
        }
    }
    let total = filtered.exams.len().max(1) as f64;
    let mut shares: Vec<SchoolExamShare> = counts
        .into_values()
        .map(|(school, exams)| SchoolExamShare {
            school_id: school.id,
            school_name: school.name.clone(),
            exams,
            share: format_percent(exams as f64 / total * 100.0),
        })
        .collect();
    shares.sort_by(|a, b| a.exams.cmp(&b.exams).then_with(|| a.school_name.cmp(&b.school_name)));
    shares
}

fn critical_by_school(
    filtered: &FilteredSnapshot,
    records: &[ScreeningRecord],
) -> Vec<CriticalSchoolPoint> {
    let mut critical: HashMap<SchoolId, usize> = HashMap::new();
    for record in records.iter().filter(|r| r.critical.is_critical()) {
        *critical.entry(record.school_id).or_insert(0) += 1;
    }
    filtered
        .schools
        .iter()
        .filter_map(|school| {
            let (latitude, longitude) = school.coordinates()?;
            Some(CriticalSchoolPoint {
                school_id: school.id,
                school_name: school.name.clone(),
                latitude,
                longitude,
                critical_students: critical.get(&school.id).copied().unwrap_or(0),
            })
        })
        .collect()
}

fn refraction_by_region(
    filtered: &FilteredSnapshot,
    school_of: &HashMap<StudentId, &School>,
    no_region: &str,
) -> Vec<RegionRefraction> {
    #[derive(Default)]
    struct Acc {
        exams: usize,
        sph: (f64, usize),
        cyl: (f64, usize),
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for exam in &filtered.exams {
        let Some(school) = school_of.get(&exam.student_id) else {
            continue;
        };
        let acc = groups.entry(school.region_label(no_region)).or_default();
        acc.exams += 1;
        if let Some(v) = exam.right.spherical {
            acc.sph.0 += v;
            acc.sph.1 += 1;
        }
        if let Some(v) = exam.right.cylindrical {
            acc.cyl.0 += v;
            acc.cyl.1 += 1;
        }
    }

    let mean = |(sum, n): (f64, usize)| (n > 0).then(|| sum / n as f64);
    groups
        .into_iter()
        .map(|(region, acc)| RegionRefraction {
            region: region.to_string(),
            exams: acc.exams,
            mean_spherical_od: mean(acc.sph),
            mean_cylindrical_od: mean(acc.cyl),
        })
        .collect()
}

fn exam_rows(
    filtered: &FilteredSnapshot,
    school_of: &HashMap<StudentId, &School>,
    classifier: &CriticalClassifier,
    no_region: &str,
) -> Vec<ExamRow> {
    let mut rows: Vec<ExamRow> = filtered
        .exams
        .iter()
        .filter_map(|exam| {
            let school = school_of.get(&exam.student_id)?;
            Some(ExamRow {
                exam_id: exam.id,
                student_id: exam.student_id,
                student_name: exam.student_name.clone(),
                school_name: school.name.clone(),
                region: school.region_label(no_region).to_string(),
                date: exam.date()?,
                spherical_od: exam.right.spherical,
                cylindrical_od: exam.right.cylindrical,
                status: classifier.classify(exam).label().to_string(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.exam_id.cmp(&b.exam_id)));
    rows
}
