//! Highest-density interval of a sample.

use std::cmp::Ordering;
use tn_core::{Error, Result};

/// Narrowest interval `[lower, upper]` holding `floor(prob * n) + 1` sorted draws.
///
/// Scans every window of that many consecutive order statistics and keeps the
/// first narrowest one. Fails for an empty sample, non-finite draws, or `prob`
/// outside `(0, 1)`.
pub fn hdi(samples: &[f64], prob: f64) -> Result<(f64, f64)> {
    if !(prob > 0.0 && prob < 1.0) {
        return Err(Error::Validation(format!("HDI probability must be in (0, 1), got {}", prob)));
    }
    if samples.is_empty() {
        return Err(Error::Validation("HDI of an empty sample".to_string()));
    }
    if samples.iter().any(|x| !x.is_finite()) {
        return Err(Error::Validation("HDI sample contains non-finite values".to_string()));
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = sorted.len();
    let inc = (prob * n as f64).floor() as usize;
    let n_intervals = n - inc;
    if n_intervals == 0 {
        return Err(Error::Computation(format!("too few draws ({}) for a {} HDI", n, prob)));
    }

    let mut best = 0;
    let mut best_width = f64::INFINITY;
    for i in 0..n_intervals {
        let width = sorted[i + inc] - sorted[i];
        if width < best_width {
            best_width = width;
            best = i;
        }
    }
    Ok((sorted[best], sorted[best + inc]))
}
