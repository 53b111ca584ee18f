//! Monthly time series.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{ScreeningRecord, Stage};

/// Calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {s:?}"))?;
        let year: i32 = year.parse().map_err(|_| format!("bad year in {s:?}"))?;
        let month: u32 = month.parse().map_err(|_| format!("bad month in {s:?}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in {s:?}"));
        }
        Ok(Self { year, month })
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Counts per month. Months with no events are absent unless the series
/// has been [`filled`](MonthlySeries::filled).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct MonthlySeries {
    points: BTreeMap<YearMonth, usize>,
}

impl MonthlySeries {
    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut points = BTreeMap::new();
        for date in dates {
            *points.entry(YearMonth::from_date(date)).or_insert(0) += 1;
        }
        Self { points }
    }

    pub fn get(&self, month: YearMonth) -> usize {
        self.points.get(&month).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.points.values().sum()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (YearMonth, usize)> + '_ {
        self.points.iter().map(|(m, c)| (*m, *c))
    }

    /// Copy with every month between the first and last present, zeros
    /// included.
    pub fn filled(&self) -> Self {
        let (Some(first), Some(last)) = (
            self.points.keys().next().copied(),
            self.points.keys().next_back().copied(),
        ) else {
            return Self::default();
        };
        let mut points = BTreeMap::new();
        let mut month = first;
        while month <= last {
            points.insert(month, self.get(month));
            month = month.next();
        }
        Self { points }
    }
}

/// One monthly series per stage, bucketed by anchor date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StageSeries {
    pub exam_done: MonthlySeries,
    pub needs_glasses: MonthlySeries,
    pub other_pathology: MonthlySeries,
    pub delivered: MonthlySeries,
}

impl StageSeries {
    pub fn from_records(records: &[ScreeningRecord]) -> Self {
        let series = |stage: Stage| {
            MonthlySeries::from_dates(
                records
                    .iter()
                    .filter(|r| r.stages.get(stage))
                    .map(ScreeningRecord::anchor_date),
            )
        };
        Self {
            exam_done: series(Stage::ExamDone),
            needs_glasses: series(Stage::NeedsGlasses),
            other_pathology: series(Stage::OtherPathology),
            delivered: series(Stage::Delivered),
        }
    }

    pub fn for_stage(&self, stage: Stage) -> &MonthlySeries {
        match stage {
            Stage::ExamDone => &self.exam_done,
            Stage::NeedsGlasses => &self.needs_glasses,
            Stage::OtherPathology => &self.other_pathology,
            Stage::Delivered => &self.delivered,
        }
    }

    pub fn filled(&self) -> Self {
        Self {
            exam_done: self.exam_done.filled(),
            needs_glasses: self.needs_glasses.filled(),
            other_pathology: self.other_pathology.filled(),
            delivered: self.delivered.filled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth { year, month }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_empty_months_omitted() {
        let series = MonthlySeries::from_dates([d(2024, 1, 3), d(2024, 1, 30), d(2024, 4, 2)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.get(ym(2024, 1)), 2);
        assert_eq!(series.get(ym(2024, 2)), 0);
        assert_eq!(series.total(), 3);
    }

    #[test]
    fn test_filled_across_year_boundary() {
        let series = MonthlySeries::from_dates([d(2023, 11, 1), d(2024, 2, 1)]).filled();
        let months: Vec<String> = series.iter().map(|(m, _)| m.to_string()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(series.total(), 2);
    }

    #[test]
    fn test_filled_empty_is_empty() {
        assert!(MonthlySeries::default().filled().is_empty());
    }

    #[test]
    fn test_json_keys_are_month_strings() {
        let series = MonthlySeries::from_dates([d(2024, 3, 9)]);
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, r#"{"2024-03":1}"#);
        let back: MonthlySeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back, series);
    }

    #[test]
    fn test_stage_series_by_anchor_month() {
        use crate::metrics::testing::record;

        let mut march = record(1, 1, None);
        march.stages.exam_done = true;
        march.stages.delivered = true;
        let mut may = record(2, 1, None);
        may.anchor_at = d(2024, 5, 20).and_hms_opt(8, 0, 0).unwrap();
        may.stages.exam_done = true;

        let series = StageSeries::from_records(&[march, may]);
        let exams = series.for_stage(Stage::ExamDone);
        assert_eq!(exams.get(ym(2024, 3)), 1);
        assert_eq!(exams.get(ym(2024, 5)), 1);
        assert_eq!(series.for_stage(Stage::Delivered).total(), 1);
        assert!(series.for_stage(Stage::NeedsGlasses).is_empty());

        let filled = series.filled();
        assert_eq!(filled.for_stage(Stage::ExamDone).len(), 3);
        assert_eq!(filled.for_stage(Stage::ExamDone).get(ym(2024, 4)), 0);
    }

    #[test]
    fn test_year_month_parse_rejects_bad_month() {
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert_eq!("2024-07".parse::<YearMonth>().unwrap(), ym(2024, 7));
    }
}
