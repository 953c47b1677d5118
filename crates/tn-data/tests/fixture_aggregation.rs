//! Loading and aggregating the repository fixtures end to end.

use std::path::PathBuf;
use tn_data::describe::NUMERIC_COLUMNS;
use tn_data::{PaidPolicy, aggregate, aggregate_with, describe, read_records, validate_binomial_support};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures").join(name)
}

#[test]
fn past_events_fixture_aggregates() {
    let records = read_records(&fixture_path("past_events.csv")).unwrap();
    assert_eq!(records.len(), 22);

    let events = aggregate(&records);
    assert_eq!(events.len(), 8);
    validate_binomial_support(&events).unwrap();

    let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let summer = events.iter().find(|e| e.event_id == "summer-2024").unwrap();
    assert_eq!(summer.capacity_total, 152);
    assert_eq!(summer.reservations_total, 141);
    assert_eq!(summer.show_count, 4);
    assert!(summer.is_paid);

    let shows: u64 = events.iter().map(|e| e.show_count).sum();
    assert_eq!(shows as usize, records.len());
}

#[test]
fn mixed_event_follows_policy() {
    let records = read_records(&fixture_path("past_events.csv")).unwrap();
    let find = |policy: PaidPolicy| {
        aggregate_with(&records, policy.classifier())
            .into_iter()
            .find(|e| e.event_id == "spring-2024")
            .unwrap()
            .is_paid
    };
    assert!(!find(PaidPolicy::AllShows));
    assert!(find(PaidPolicy::Majority));
}

#[test]
fn japanese_headers_fixture() {
    let events = aggregate(&read_records(&fixture_path("ja_headers.csv")).unwrap());
    assert_eq!(events.len(), 2);
    let paid: Vec<bool> = events.iter().map(|e| e.is_paid).collect();
    assert_eq!(paid.iter().filter(|&&p| p).count(), 1);
}

#[test]
fn over_capacity_fixture_is_rejected() {
    let events = aggregate(&read_records(&fixture_path("over_capacity.csv")).unwrap());
    let err = validate_binomial_support(&events).unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn describe_covers_numeric_columns() {
    let events = aggregate(&read_records(&fixture_path("past_events.csv")).unwrap());
    let table = describe(&events);
    assert_eq!(table.columns.len(), NUMERIC_COLUMNS.len());
    let shows = table.column("show_count").unwrap();
    assert_eq!(shows.count, 8);
    assert_eq!(shows.min, 2.0);
    assert_eq!(shows.max, 4.0);
}
