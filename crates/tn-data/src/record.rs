//! Show-level attendance records read from CSV.
//!
//! One row per show. Recognised headers are `event`, `capacity`,
//! `reservations` and `paid`; the Japanese headers used by the original
//! spreadsheet export (企画, キャパ, 予約数, 有料公演) are accepted as aliases.
//! Extra columns are ignored.

use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;
use tn_core::{Error, Result};

/// One individual show performance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    /// Event (program) identifier; shows sharing it are aggregated together.
    #[serde(rename = "event", alias = "event_id", alias = "企画")]
    pub event_id: String,
    /// Venue capacity for this show.
    #[serde(alias = "キャパ")]
    pub capacity: u64,
    /// Number of reservations for this show.
    #[serde(alias = "予約数")]
    pub reservations: u64,
    /// Whether the show was a paid performance.
    #[serde(alias = "paid_flag", alias = "有料公演", deserialize_with = "de_flag")]
    pub paid: bool,
}

impl RawRecord {
    /// Convenience constructor (mostly for tests and fixtures).
    pub fn new(event_id: impl Into<String>, capacity: u64, reservations: u64, paid: bool) -> Self {
        Self { event_id: event_id.into(), capacity, reservations, paid }
    }
}

/// Accepts `0`/`1` and `true`/`false` in any case.
fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(true),
        "0" | "0.0" | "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "paid flag must be 0/1 or true/false, got '{}'",
            other
        ))),
    }
}

/// Read all records from a CSV file with a header row.
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
    })?;
    let records = read_records_from_reader(file)?;
    tracing::debug!(path = %path.display(), rows = records.len(), "records loaded");
    Ok(records)
}

/// Read all records from any CSV source with a header row.
///
/// Fails on the first malformed row; an input without data rows is a
/// validation error.
pub fn read_records_from_reader<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);

    let mut out = Vec::new();
    for row in rdr.deserialize::<RawRecord>() {
        out.push(row?);
    }

    if out.is_empty() {
        return Err(Error::Validation("CSV input contains no data rows".to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_english_headers() {
        let csv = "event,capacity,reservations,paid\nA,40,30,1\nA,40,35,1\nB,50,20,0\n";
        let rows = read_records_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], RawRecord::new("A", 40, 30, true));
        assert_eq!(rows[2], RawRecord::new("B", 50, 20, false));
    }

    #[test]
    fn test_read_original_headers_and_bool_flags() {
        let csv = "企画,公演日,キャパ,予約数,有料公演\nX,2024-01-01,38,30,TRUE\nX,2024-01-02,38,31,False\n";
        let rows = read_records_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].paid);
        assert!(!rows[1].paid);
        assert_eq!(rows[1].capacity, 38);
    }

    #[test]
    fn test_missing_column_is_error() {
        let csv = "event,capacity,paid\nA,40,1\n";
        let err = read_records_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Csv(_)), "unexpected error: {}", err);
    }

    #[test]
    fn test_bad_flag_is_error() {
        let csv = "event,capacity,reservations,paid\nA,40,30,maybe\n";
        assert!(read_records_from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_negative_count_is_error() {
        let csv = "event,capacity,reservations,paid\nA,40,-3,1\n";
        assert!(read_records_from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_empty_input_is_validation_error() {
        let csv = "event,capacity,reservations,paid\n";
        let err = read_records_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_records(Path::new("/nonexistent/turnout/past_events.csv")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("past_events.csv"));
    }
}
