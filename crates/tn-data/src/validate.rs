//! Checks on aggregated data before it reaches the Binomial likelihood.

use crate::aggregate::EventSummary;
use tn_core::{Error, Result};

/// Fail fast unless every event satisfies `reservations_total <= capacity_total`.
///
/// An empty table is rejected too: there is nothing to fit.
pub fn validate_binomial_support(events: &[EventSummary]) -> Result<()> {
    if events.is_empty() {
        return Err(Error::Validation("no events to fit: aggregated table is empty".to_string()));
    }
    for e in events {
        if e.reservations_total > e.capacity_total {
            return Err(Error::Validation(format!(
                "event '{}' has {} reservations for a total capacity of {} (reservations must not exceed capacity)",
                e.event_id, e.reservations_total, e.capacity_total
            )));
        }
    }
    Ok(())
}
