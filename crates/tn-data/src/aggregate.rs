//! Per-event aggregation of show-level records.

use crate::record::RawRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row per distinct event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// Event identifier.
    pub event_id: String,
    /// Sum of capacities across the event's shows.
    pub capacity_total: u64,
    /// Sum of reservations across the event's shows.
    pub reservations_total: u64,
    /// Number of shows in the event.
    pub show_count: u64,
    /// Paid/free classification produced by the paid policy.
    pub is_paid: bool,
}

impl EventSummary {
    /// `is_paid` as a 0/1 covariate.
    #[inline]
    pub fn paid_indicator(&self) -> f64 {
        if self.is_paid { 1.0 } else { 0.0 }
    }

    /// Observed reservation rate `reservations_total / capacity_total` (NaN for zero capacity).
    pub fn reservation_rate(&self) -> f64 {
        if self.capacity_total == 0 {
            return f64::NAN;
        }
        self.reservations_total as f64 / self.capacity_total as f64
    }
}

/// Default paid policy: an event is paid only if every one of its shows was paid.
///
/// A partially-paid event is classified as free.
#[inline]
pub fn classify_paid(paid_sum: u64, show_count: u64) -> bool {
    paid_sum == show_count
}

/// Alternate paid policy: an event is paid if strictly more than half of its shows were paid.
#[inline]
pub fn classify_paid_majority(paid_sum: u64, show_count: u64) -> bool {
    2 * paid_sum > show_count
}

/// Selectable paid/free policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaidPolicy {
    /// [`classify_paid`]
    #[default]
    AllShows,
    /// [`classify_paid_majority`]
    Majority,
}

impl PaidPolicy {
    /// Classifier function implementing this policy.
    pub fn classifier(self) -> fn(u64, u64) -> bool {
        match self {
            PaidPolicy::AllShows => classify_paid,
            PaidPolicy::Majority => classify_paid_majority,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    capacity: u64,
    reservations: u64,
    shows: u64,
    paid: u64,
}

/// Aggregate with the default [`classify_paid`] policy.
pub fn aggregate(records: &[RawRecord]) -> Vec<EventSummary> {
    aggregate_with(records, classify_paid)
}

/// Group records by event id and aggregate, classifying paid status with `classify`.
///
/// Output is ordered by event id.
pub fn aggregate_with<F>(records: &[RawRecord], classify: F) -> Vec<EventSummary>
where
    F: Fn(u64, u64) -> bool,
{
    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for r in records {
        let acc = groups.entry(r.event_id.as_str()).or_default();
        acc.capacity += r.capacity;
        acc.reservations += r.reservations;
        acc.shows += 1;
        acc.paid += u64::from(r.paid);
    }

    groups
        .into_iter()
        .map(|(event_id, acc)| {
            if acc.paid > 0 && acc.paid < acc.shows {
                tracing::warn!(
                    event = event_id,
                    paid_shows = acc.paid,
                    shows = acc.shows,
                    "event mixes paid and free shows"
                );
            }
            EventSummary {
                event_id: event_id.to_string(),
                capacity_total: acc.capacity,
                reservations_total: acc.reservations,
                show_count: acc.shows,
                is_paid: classify(acc.paid, acc.shows),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(e: &str, cap: u64, res: u64, paid: bool) -> RawRecord {
        RawRecord::new(e, cap, res, paid)
    }

    #[test]
    fn test_all_paid_event_is_paid() {
        let rows = vec![rec("A", 40, 30, true), rec("A", 40, 35, true), rec("A", 40, 38, true)];
        let out = aggregate(&rows);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_paid);
        assert_eq!(out[0].paid_indicator(), 1.0);
    }

    #[test]
    fn test_mixed_event_is_free() {
        let rows = vec![rec("A", 40, 30, true), rec("A", 40, 35, false)];
        let out = aggregate(&rows);
        assert!(!out[0].is_paid);
        assert_eq!(out[0].paid_indicator(), 0.0);
    }

    #[test]
    fn test_all_free_event_is_free() {
        let rows = vec![rec("A", 40, 30, false), rec("A", 40, 35, false)];
        assert!(!aggregate(&rows)[0].is_paid);
    }

    #[test]
    fn test_sums_and_counts() {
        let rows = vec![
            rec("B", 50, 20, false),
            rec("A", 40, 30, true),
            rec("B", 60, 25, false),
            rec("A", 38, 31, true),
            rec("B", 55, 40, false),
        ];
        let out = aggregate(&rows);
        assert_eq!(out.len(), 2);

        // Ordered by event id.
        assert_eq!(out[0].event_id, "A");
        assert_eq!(out[0].capacity_total, 78);
        assert_eq!(out[0].reservations_total, 61);
        assert_eq!(out[0].show_count, 2);

        assert_eq!(out[1].event_id, "B");
        assert_eq!(out[1].capacity_total, 165);
        assert_eq!(out[1].reservations_total, 85);
        assert_eq!(out[1].show_count, 3);
    }

    #[test]
    fn test_majority_policy_substitution() {
        let rows = vec![rec("A", 40, 30, true), rec("A", 40, 35, true), rec("A", 40, 20, false)];
        assert!(!aggregate(&rows)[0].is_paid);
        assert!(aggregate_with(&rows, PaidPolicy::Majority.classifier())[0].is_paid);
        assert!(!aggregate_with(&rows, PaidPolicy::AllShows.classifier())[0].is_paid);
    }

    #[test]
    fn test_classify_paid_rules() {
        assert!(classify_paid(3, 3));
        assert!(!classify_paid(2, 3));
        assert!(!classify_paid(0, 3));
        assert!(classify_paid_majority(2, 3));
        assert!(!classify_paid_majority(1, 2));
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_reservation_rate() {
        let out = aggregate(&[rec("A", 40, 30, true)]);
        assert!((out[0].reservation_rate() - 0.75).abs() < 1e-12);
    }

    fn arb_records() -> impl Strategy<Value = Vec<RawRecord>> {
        proptest::collection::vec(
            (0u8..5, 1u64..200, 0u64..200, any::<bool>())
                .prop_map(|(e, cap, res, paid)| rec(&format!("E{}", e), cap, res, paid)),
            1..40,
        )
    }

    proptest! {
        #[test]
        fn prop_totals_equal_group_sums(rows in arb_records()) {
            let out = aggregate(&rows);
            let total_shows: u64 = out.iter().map(|s| s.show_count).sum();
            prop_assert_eq!(total_shows as usize, rows.len());

            for s in &out {
                let group: Vec<&RawRecord> = rows.iter().filter(|r| r.event_id == s.event_id).collect();
                prop_assert_eq!(s.show_count as usize, group.len());
                prop_assert_eq!(s.capacity_total, group.iter().map(|r| r.capacity).sum::<u64>());
                prop_assert_eq!(s.reservations_total, group.iter().map(|r| r.reservations).sum::<u64>());
                prop_assert_eq!(s.is_paid, group.iter().all(|r| r.paid));
            }
        }
    }
}
