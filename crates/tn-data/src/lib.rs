//! # tn-data
//!
//! Show-level attendance records and their per-event aggregation.
//!
//! - [`record`]: CSV loading of one row per show
//! - [`aggregate`]: grouping into [`EventSummary`] rows, paid/free policy
//! - [`validate`]: Binomial support checks on aggregated data
//! - [`describe`]: descriptive statistics and table previews

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod describe;
pub mod record;
pub mod validate;

pub use aggregate::{EventSummary, PaidPolicy, aggregate, aggregate_with, classify_paid};
pub use describe::{ColumnStats, DescribeTable, describe, format_head};
pub use record::{RawRecord, read_records, read_records_from_reader};
pub use validate::validate_binomial_support;
