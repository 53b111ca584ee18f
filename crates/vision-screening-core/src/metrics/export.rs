//! JSON and CSV exports.

use super::ranking::SchoolDelivery;
use super::ScreeningMetrics;
use crate::models::ScreeningRecord;

impl ScreeningMetrics {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Screening records as CSV, one row per student.
pub fn records_csv(records: &[ScreeningRecord], no_region_label: &str) -> String {
    let mut csv = String::new();
    csv.push_str("student_id,student_name,school_name,region,anchor_exam_id,anchor_date,critical,exam_done,needs_glasses,other_pathology,delivered\n");

    for record in records {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            record.student_id,
            escape_csv(&record.student_name),
            escape_csv(&record.school_name),
            escape_csv(record.region_label(no_region_label)),
            record.anchor_exam_id,
            record.anchor_date().format(crate::db::DATE_FORMAT),
            record.critical.label(),
            record.stages.exam_done,
            record.stages.needs_glasses,
            record.stages.other_pathology,
            record.stages.delivered,
        ));
    }

    csv
}

/// Delivery ranking as CSV. The rate keeps one decimal.
pub fn ranking_csv(ranking: &[SchoolDelivery]) -> String {
    let mut csv = String::new();
    csv.push_str("rank,school_id,school_name,needs_glasses,delivered,rate\n");

    for (i, school) in ranking.iter().enumerate() {
        csv.push_str(&format!(
            "{},{},{},{},{},{:.1}\n",
            i + 1,
            school.school_id,
            escape_csv(&school.school_name),
            school.needs_glasses,
            school.delivered,
            school.rate,
        ));
    }

    csv
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
