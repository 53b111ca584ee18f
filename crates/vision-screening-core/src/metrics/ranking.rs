//! Delivery-rate ranking of schools.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{SchoolId, ScreeningRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchoolDelivery {
    pub school_id: SchoolId,
    pub school_name: String,
    pub needs_glasses: usize,
    pub delivered: usize,
    /// `delivered / needs_glasses * 100`, or 0 when nobody needs glasses
    pub rate: f64,
}

impl SchoolDelivery {
    fn rank_order(&self, other: &Self) -> Ordering {
        other
            .rate
            .total_cmp(&self.rate)
            .then_with(|| other.delivered.cmp(&self.delivered))
            .then_with(|| self.school_name.cmp(&other.school_name))
            .then_with(|| self.school_id.cmp(&other.school_id))
    }
}

/// Top `limit` schools by delivery rate, highest first. Ties go to more
/// deliveries, then school name.
pub fn delivery_ranking(records: &[ScreeningRecord], limit: usize) -> Vec<SchoolDelivery> {
    let mut per_school: BTreeMap<SchoolId, SchoolDelivery> = BTreeMap::new();
    for record in records {
        let entry = per_school
            .entry(record.school_id)
            .or_insert_with(|| SchoolDelivery {
                school_id: record.school_id,
                school_name: record.school_name.clone(),
                needs_glasses: 0,
                delivered: 0,
                rate: 0.0,
            });
        entry.needs_glasses += usize::from(record.stages.needs_glasses);
        entry.delivered += usize::from(record.stages.delivered);
    }

    let mut ranking: Vec<SchoolDelivery> = per_school
        .into_values()
        .map(|mut school| {
            school.rate = if school.needs_glasses == 0 {
                0.0
            } else {
                school.delivered as f64 / school.needs_glasses as f64 * 100.0
            };
            school
        })
        .collect();
    ranking.sort_by(SchoolDelivery::rank_order);
    ranking.truncate(limit);
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::record;

    fn school_records(school_id: i64, needs: usize, delivered: usize) -> Vec<ScreeningRecord> {
        (0..needs.max(delivered))
            .map(|i| {
                let mut r = record(school_id * 100 + i as i64, school_id, Some("Sul"));
                r.stages.needs_glasses = i < needs;
                r.stages.delivered = i < delivered;
                r
            })
            .collect()
    }

    #[test]
    fn test_rate_and_order() {
        let mut records = school_records(1, 4, 1);
        records.extend(school_records(2, 2, 2));
        records.extend(school_records(3, 0, 0));
        records.push(record(999, 3, None));

        let ranking = delivery_ranking(&records, 20);
        let ids: Vec<i64> = ranking.iter().map(|s| s.school_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(ranking[0].rate, 100.0);
        assert_eq!(ranking[1].rate, 25.0);
        assert_eq!(ranking[2].rate, 0.0);
    }

    #[test]
    fn test_zero_needs_glasses_rate_is_zero() {
        let ranking = delivery_ranking(&school_records(1, 0, 2), 20);
        assert_eq!(ranking[0].delivered, 2);
        assert_eq!(ranking[0].rate, 0.0);
    }

    #[test]
    fn test_ties_break_on_deliveries_then_name() {
        let mut records = school_records(1, 1, 1);
        records.extend(school_records(2, 3, 3));
        records.extend(school_records(3, 3, 3));
        let ranking = delivery_ranking(&records, 20);
        let ids: Vec<i64> = ranking.iter().map(|s| s.school_id).collect();
        // schools 2 and 3 share rate and deliveries; "School 2" < "School 3"
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_limit() {
        let records: Vec<_> = (1..=30).flat_map(|id| school_records(id, 1, 1)).collect();
        assert_eq!(delivery_ranking(&records, 20).len(), 20);
    }
}
