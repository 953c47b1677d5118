//! Descriptive statistics for the aggregated event table.

use crate::aggregate::EventSummary;
use serde::Serialize;
use std::fmt;

/// Summary statistics of one numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    /// Column name.
    pub name: String,
    /// Number of values.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (ddof = 1). NaN for fewer than two values.
    pub std: f64,
    /// Minimum.
    pub min: f64,
    /// 25th percentile.
    pub q25: f64,
    /// Median.
    pub q50: f64,
    /// 75th percentile.
    pub q75: f64,
    /// Maximum.
    pub max: f64,
}

impl ColumnStats {
    /// Compute statistics of `values`. Percentiles use linear interpolation.
    pub fn from_values(name: impl Into<String>, values: &[f64]) -> Self {
        let name = name.into();
        let n = values.len();
        if n == 0 {
            return Self {
                name,
                count: 0,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                q25: f64::NAN,
                q50: f64::NAN,
                q75: f64::NAN,
                max: f64::NAN,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n < 2 {
            f64::NAN
        } else {
            (values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
        };

        Self {
            name,
            count: n,
            mean,
            std,
            min: sorted[0],
            q25: quantile_sorted(&sorted, 0.25),
            q50: quantile_sorted(&sorted, 0.50),
            q75: quantile_sorted(&sorted, 0.75),
            max: sorted[n - 1],
        }
    }

    fn row_values(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std,
            self.min,
            self.q25,
            self.q50,
            self.q75,
            self.max,
        ]
    }
}

/// Linear-interpolation quantile of sorted data.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() as f64 - 1.0);
    let i0 = pos.floor() as usize;
    let i1 = pos.ceil() as usize;
    if i0 == i1 {
        return sorted[i0];
    }
    let f = pos - i0 as f64;
    sorted[i0] * (1.0 - f) + sorted[i1] * f
}

/// Describe table over the numeric event columns.
#[derive(Debug, Clone, Serialize)]
pub struct DescribeTable {
    /// One entry per numeric column, in table order.
    pub columns: Vec<ColumnStats>,
}

impl DescribeTable {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Names of the numeric columns of [`EventSummary`], in table order.
pub const NUMERIC_COLUMNS: [&str; 4] = ["capacity_total", "reservations_total", "show_count", "is_paid"];

/// Numeric columns of the event table as `(name, values)` pairs.
pub fn numeric_columns(events: &[EventSummary]) -> Vec<(&'static str, Vec<f64>)> {
    vec![
        (NUMERIC_COLUMNS[0], events.iter().map(|e| e.capacity_total as f64).collect()),
        (NUMERIC_COLUMNS[1], events.iter().map(|e| e.reservations_total as f64).collect()),
        (NUMERIC_COLUMNS[2], events.iter().map(|e| e.show_count as f64).collect()),
        (NUMERIC_COLUMNS[3], events.iter().map(|e| e.paid_indicator()).collect()),
    ]
}

/// Descriptive statistics (count, mean, std, min, quartiles, max) per numeric column.
pub fn describe(events: &[EventSummary]) -> DescribeTable {
    let columns = numeric_columns(events)
        .into_iter()
        .map(|(name, values)| ColumnStats::from_values(name, &values))
        .collect();
    DescribeTable { columns }
}

fn fmt_cell(v: f64) -> String {
    if v.is_nan() { "NaN".to_string() } else { format!("{:.6}", v) }
}

impl fmt::Display for DescribeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ROWS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

        let cells: Vec<Vec<String>> = self
            .columns
            .iter()
            .map(|c| c.row_values().iter().map(|&v| fmt_cell(v)).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .zip(&cells)
            .map(|(c, col)| col.iter().map(String::len).chain([c.name.len()]).max().unwrap_or(0))
            .collect();

        write!(f, "{:<6}", "")?;
        for (c, w) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>w$}", c.name, w = w)?;
        }
        writeln!(f)?;

        for (r, row_name) in ROWS.iter().enumerate() {
            write!(f, "{:<6}", row_name)?;
            for (col, w) in cells.iter().zip(&widths) {
                write!(f, "  {:>w$}", col[r], w = w)?;
            }
            if r + 1 < ROWS.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Render the first `n` events as a fixed-width table.
pub fn format_head(events: &[EventSummary], n: usize) -> String {
    let header = ["event", "capacity_total", "reservations_total", "show_count", "is_paid"];
    let rows: Vec<[String; 5]> = events
        .iter()
        .take(n)
        .map(|e| {
            [
                e.event_id.clone(),
                e.capacity_total.to_string(),
                e.reservations_total.to_string(),
                e.show_count.to_string(),
                u8::from(e.is_paid).to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |cells: Vec<&str>, out: &mut String| {
        let mut parts = Vec::with_capacity(cells.len());
        for (i, (cell, w)) in cells.iter().zip(&widths).enumerate() {
            let pad = w.saturating_sub(cell.chars().count());
            if i == 0 {
                parts.push(format!("{}{}", cell, " ".repeat(pad)));
            } else {
                parts.push(format!("{}{}", " ".repeat(pad), cell));
            }
        }
        out.push_str(parts.join("  ").trim_end());
        out.push('\n');
    };
    line(header.to_vec(), &mut out);
    for row in &rows {
        line(row.iter().map(String::as_str).collect(), &mut out);
    }
    out.pop();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: &str, cap: u64, res: u64, shows: u64, paid: bool) -> EventSummary {
        EventSummary {
            event_id: id.to_string(),
            capacity_total: cap,
            reservations_total: res,
            show_count: shows,
            is_paid: paid,
        }
    }

    #[test]
    fn test_column_stats_known_values() {
        let s = ColumnStats::from_values("x", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(s.count, 5);
        assert!((s.mean - 3.0).abs() < 1e-12);
        assert!((s.std - 2.5_f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.q25, 2.0);
        assert_eq!(s.q50, 3.0);
        assert_eq!(s.q75, 4.0);
        assert_eq!(s.max, 5.0);
    }

    #[test]
    fn test_quartiles_interpolate() {
        let s = ColumnStats::from_values("x", &[10.0, 20.0, 30.0, 40.0]);
        assert!((s.q25 - 17.5).abs() < 1e-12);
        assert!((s.q50 - 25.0).abs() < 1e-12);
        assert!((s.q75 - 32.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_std_is_nan() {
        let s = ColumnStats::from_values("x", &[7.0]);
        assert!(s.std.is_nan());
        assert_eq!(s.q50, 7.0);
    }

    #[test]
    fn test_describe_columns() {
        let events =
            vec![ev("A", 80, 60, 2, true), ev("B", 120, 90, 3, false), ev("C", 150, 140, 4, true)];
        let table = describe(&events);
        assert_eq!(table.columns.len(), 4);
        let paid = table.column("is_paid").unwrap();
        assert!((paid.mean - 2.0 / 3.0).abs() < 1e-12);
        let shows = table.column("show_count").unwrap();
        assert_eq!(shows.max, 4.0);

        let rendered = table.to_string();
        assert!(rendered.starts_with("      "));
        assert!(rendered.contains("reservations_total"));
        assert_eq!(rendered.lines().count(), 9);
    }

    #[test]
    fn test_format_head_limits_rows() {
        let events: Vec<EventSummary> =
            (0..8).map(|i| ev(&format!("E{}", i), 100, 50, 2, i % 2 == 0)).collect();
        let head = format_head(&events, 5);
        assert_eq!(head.lines().count(), 6);
        assert!(head.lines().next().unwrap().starts_with("event"));
        assert!(head.contains("E4"));
        assert!(!head.contains("E5"));
    }
}
