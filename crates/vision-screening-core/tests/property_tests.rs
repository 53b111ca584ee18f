//! # Property-Based Tests
//!
//! Classification, anchoring, reconciliation and metric invariants.

use chrono::NaiveDate;
use proptest::collection::vec;
use proptest::prelude::*;
use vision_screening_core::metrics::{regional_stack, FunnelCounts, Ratio};
use vision_screening_core::models::{
    Address, CriticalStatus, Exam, EyeMeasurements, FlagSnapshot, School, ScreeningRecord,
    Snapshot, StageFlags, StageVersions, Student,
};
use vision_screening_core::screening::{
    AnchorSelector, CriticalClassifier, FilterEngine, FilterSelection, StageReconciler,
};

fn exam(id: i64, student_id: i64, day_offset: u32, spherical: Option<f64>, cylindrical: Option<f64>) -> Exam {
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(u64::from(day_offset));
    Exam {
        id,
        student_id,
        student_name: format!("Aluno {student_id}"),
        taken_at: day.and_hms_opt(8, 0, 0),
        right: EyeMeasurements {
            spherical,
            cylindrical,
            ..EyeMeasurements::default()
        },
        left: EyeMeasurements::default(),
        interpupillary_distance_mm: None,
    }
}

fn snapshot(exams: Vec<Exam>, students: i64) -> Snapshot {
    Snapshot {
        schools: vec![School {
            id: 1,
            name: "EC 01".into(),
            address: Address::default(),
            region: Some("Norte".into()),
            latitude: None,
            longitude: None,
            total_students: students as u32,
        }],
        students: (0..students)
            .map(|id| Student {
                id,
                name: format!("Aluno {id}"),
                birth_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                sex: "F".into(),
                school_id: Some(1),
                region: None,
            })
            .collect(),
        exams,
        ..Snapshot::default()
    }
}

fn record(student_id: i64, region: Option<String>, stages: StageFlags) -> ScreeningRecord {
    ScreeningRecord {
        student_id,
        student_name: format!("Aluno {student_id}"),
        anchor_exam_id: student_id,
        anchor_at: NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        school_id: 1,
        school_name: "EC 01".into(),
        region,
        critical: CriticalStatus::Normal,
        stages,
        versions: StageVersions::default(),
    }
}

fn stage_flags() -> impl Strategy<Value = StageFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(a, b, c, d)| StageFlags {
        exam_done: a,
        needs_glasses: b,
        other_pathology: c,
        delivered: d,
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Critical iff a right-eye reading strictly exceeds the threshold.
    #[test]
    fn classifier_matches_threshold(
        sph in proptest::option::of(-10.0f64..10.0),
        cyl in proptest::option::of(-10.0f64..10.0),
    ) {
        let status = CriticalClassifier::default().classify(&exam(1, 1, 0, sph, cyl));
        let expected = sph.is_some_and(|v| v > 4.0) || cyl.is_some_and(|v| v > 4.0);
        prop_assert_eq!(status.is_critical(), expected);
    }

    /// Each anchor is the student's earliest in-range exam.
    #[test]
    fn anchor_is_minimum_date(
        raw in vec((0i64..5, 0u32..200), 1..40)
    ) {
        let exams: Vec<Exam> = raw
            .iter()
            .enumerate()
            .map(|(i, (student, day))| exam(i as i64, *student, *day, None, None))
            .collect();
        let snapshot = snapshot(exams.clone(), 5);
        let selection = FilterSelection::all_regions(&snapshot, "Sem Região");
        let filtered = FilterEngine::new("Sem Região").apply(&snapshot, &selection);
        let anchors = AnchorSelector::default().select(&filtered);

        for anchor in &anchors {
            let earliest = exams
                .iter()
                .filter(|e| e.student_id == anchor.student_id)
                .filter_map(|e| e.taken_at)
                .min()
                .unwrap();
            prop_assert_eq!(anchor.taken_at, earliest);
        }
        let students_with_exams: std::collections::BTreeSet<i64> =
            exams.iter().map(|e| e.student_id).collect();
        prop_assert_eq!(anchors.len(), students_with_exams.len());
    }

    /// Reconciling twice gives the same records.
    #[test]
    fn reconciliation_idempotent(n in 0i64..20) {
        let exams: Vec<Exam> = (0..n).map(|i| exam(i, i, i as u32, Some(i as f64), None)).collect();
        let snapshot = snapshot(exams, n);
        let selection = FilterSelection::all_regions(&snapshot, "Sem Região");
        let filtered = FilterEngine::new("Sem Região").apply(&snapshot, &selection);
        let anchors = AnchorSelector::default().select(&filtered);

        let first = StageReconciler::new().reconcile(&anchors, &FlagSnapshot::default());
        let second = StageReconciler::new().reconcile(&anchors, &FlagSnapshot::default());
        prop_assert_eq!(first, second);
    }

    /// Regional sums equal the ungrouped funnel totals.
    #[test]
    fn regional_sums_equal_totals(
        rows in vec((proptest::option::of("[A-C]"), stage_flags()), 0..50)
    ) {
        let records: Vec<ScreeningRecord> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (region, stages))| record(i as i64, region, stages))
            .collect();
        let funnel = FunnelCounts::from_records(&records);
        let regional = regional_stack(&records, "Sem Região");

        prop_assert_eq!(regional.iter().map(|r| r.exam_done).sum::<usize>(), funnel.examined);
        prop_assert_eq!(regional.iter().map(|r| r.needs_glasses).sum::<usize>(), funnel.needs_glasses);
        prop_assert_eq!(regional.iter().map(|r| r.delivered).sum::<usize>(), funnel.delivered);
    }

    /// Ratios never divide by zero and always carry one decimal.
    #[test]
    fn ratio_label_has_one_decimal(num in 0usize..1000, den in 0usize..1000) {
        let ratio = Ratio::new(num, den);
        prop_assert!(ratio.percent.is_finite());
        prop_assert!(ratio.label.ends_with('%'));
        let digits = ratio.label.trim_end_matches('%');
        let decimals = digits.split('.').nth(1).map(str::len);
        prop_assert_eq!(decimals, Some(1));
        if den == 0 {
            prop_assert_eq!(ratio.percent, num as f64 * 100.0);
        }
    }
}
