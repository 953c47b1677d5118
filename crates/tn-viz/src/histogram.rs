//! Grid of per-column histograms, one panel per numeric column.
//!
//! Bins are equal-width over `[min, max]` of each column; the last bin is
//! closed on the right so the maximum is counted. A constant column gets
//! the range `[v - 0.5, v + 0.5]`.

use crate::axes::Axis;
use crate::canvas::Canvas;
use crate::color::{self, Color};
use crate::primitives::{LineStyle, Style, TextAnchor, TextBaseline, TextStyle, estimate_text_width};
use crate::{RenderError, Result};

/// Equal-width bin counts of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` ascending bin edges.
    pub edges: Vec<f64>,
    /// Count per bin.
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(values: &[f64], bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(RenderError::Layout("histogram needs at least one bin".into()));
        }
        if values.is_empty() {
            return Err(RenderError::Layout("histogram of an empty column".into()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RenderError::Layout("histogram column contains non-finite values".into()));
        }

        let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + i as f64 * width).collect();

        let mut counts = vec![0usize; bins];
        for &v in values {
            let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Ok(Self { edges, counts })
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }
}

/// Panel geometry and binning of [`render_histograms`].
#[derive(Debug, Clone)]
pub struct HistogramConfig {
    pub bins: usize,
    /// Panels per row.
    pub columns: usize,
    pub panel_width: f64,
    pub panel_height: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self { bins: 10, columns: 2, panel_width: 320.0, panel_height: 240.0 }
    }
}

const TITLE_SIZE: f64 = 11.0;
const TICK_SIZE: f64 = 8.0;
const TICK_LEN: f64 = 3.5;

/// Render one histogram panel per `(name, values)` column into an SVG document.
pub fn render_histograms(columns: &[(&str, Vec<f64>)], config: &HistogramConfig) -> Result<String> {
    if columns.is_empty() {
        return Err(RenderError::Layout("no columns to plot".into()));
    }
    if config.columns == 0 {
        return Err(RenderError::Layout("grid needs at least one panel per row".into()));
    }

    let n_cols = config.columns.min(columns.len());
    let n_rows = columns.len().div_ceil(n_cols);
    let mut canvas = Canvas::new(
        config.panel_width * n_cols as f64,
        config.panel_height * n_rows as f64,
    )?;

    for (i, (name, values)) in columns.iter().enumerate() {
        let hist = Histogram::new(values, config.bins).map_err(|e| match e {
            RenderError::Layout(msg) => RenderError::Layout(format!("column '{}': {}", name, msg)),
            other => other,
        })?;
        let x0 = (i % n_cols) as f64 * config.panel_width;
        let y0 = (i / n_cols) as f64 * config.panel_height;
        draw_panel(&mut canvas, name, &hist, x0, y0, config.panel_width, config.panel_height);
    }

    tracing::debug!(panels = columns.len(), rows = n_rows, cols = n_cols, "rendered histogram grid");
    Ok(canvas.to_string())
}

fn draw_panel(canvas: &mut Canvas, title: &str, hist: &Histogram, x0: f64, y0: f64, w: f64, h: f64) {
    let (lo, hi) = hist.range();
    let x_axis = Axis::fixed(lo, hi, 5);
    let y_axis = Axis::auto_linear(0.0, hist.max_count().max(1) as f64, 5);

    let label_w = y_axis
        .tick_labels
        .iter()
        .map(|l| estimate_text_width(l, TICK_SIZE))
        .fold(0.0, f64::max);
    let left = x0 + label_w + TICK_LEN + 10.0;
    let right = x0 + w - 14.0;
    let top = y0 + 24.0;
    let bottom = y0 + h - 22.0;

    let title_style = TextStyle { size: TITLE_SIZE, ..Default::default() }
        .anchored(TextAnchor::Middle, TextBaseline::Alphabetic);
    canvas.text((left + right) / 2.0, y0 + 16.0, title, &title_style);

    let grid = LineStyle::solid(Color::hex(color::GRID).with_alpha(0.5), 0.5);
    let tick = LineStyle::solid(Color::BLACK, 0.6);

    let y_label = TextStyle::sized(TICK_SIZE).anchored(TextAnchor::End, TextBaseline::Central);
    for (v, label) in y_axis.tick_positions.iter().zip(&y_axis.tick_labels) {
        let py = y_axis.data_to_pixel(*v, bottom, top);
        canvas.line(left, py, right, py, &grid);
        canvas.line(left - TICK_LEN, py, left, py, &tick);
        canvas.text(left - TICK_LEN - 2.0, py, label, &y_label);
    }

    let x_label = TextStyle::sized(TICK_SIZE).anchored(TextAnchor::Middle, TextBaseline::Hanging);
    for (v, label) in x_axis.tick_positions.iter().zip(&x_axis.tick_labels) {
        let px = x_axis.data_to_pixel(*v, left, right);
        canvas.line(px, top, px, bottom, &grid);
        canvas.line(px, bottom, px, bottom + TICK_LEN, &tick);
        canvas.text(px, bottom + TICK_LEN + 2.0, label, &x_label);
    }

    let bar = Style::filled(Color::hex(color::BAR_FILL)).with_stroke(Color::WHITE, 0.5);
    for (b, &count) in hist.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let bx0 = x_axis.data_to_pixel(hist.edges[b], left, right);
        let bx1 = x_axis.data_to_pixel(hist.edges[b + 1], left, right);
        let by = y_axis.data_to_pixel(count as f64, bottom, top);
        canvas.rect(bx0, by, bx1 - bx0, bottom - by, &bar);
    }

    canvas.rect(left, top, right - left, bottom - top, &Style::stroked(Color::BLACK, 0.8));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn counts_and_edges() {
        let h = Histogram::new(&[0.0, 1.0, 2.0, 3.0, 4.0, 10.0], 10).unwrap();
        assert_eq!(h.edges.len(), 11);
        assert_eq!(h.range(), (0.0, 10.0));
        assert_eq!(h.counts, vec![1, 1, 1, 1, 1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn maximum_lands_in_last_bin() {
        let h = Histogram::new(&[1.0, 2.0], 4).unwrap();
        assert_eq!(h.counts, vec![1, 0, 0, 1]);
    }

    #[test]
    fn constant_column() {
        let h = Histogram::new(&[1.0, 1.0, 1.0], 10).unwrap();
        assert_eq!(h.range(), (0.5, 1.5));
        assert_eq!(h.total(), 3);
        assert_eq!(h.max_count(), 3);
    }

    #[test]
    fn invalid_columns() {
        assert!(Histogram::new(&[], 10).is_err());
        assert!(Histogram::new(&[1.0], 0).is_err());
        assert!(Histogram::new(&[1.0, f64::NAN], 10).is_err());
    }

    #[test]
    fn grid_layout() {
        let cols = vec![
            ("capacity_total", vec![76.0, 114.0, 152.0]),
            ("reservations_total", vec![60.0, 100.0, 140.0]),
            ("show_count", vec![2.0, 3.0, 4.0]),
            ("is_paid", vec![0.0, 1.0, 1.0]),
        ];
        let svg = render_histograms(&cols, &HistogramConfig::default()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"width="640" height="480""#));
        for (name, _) in &cols {
            assert!(svg.contains(name), "missing title {}", name);
        }
    }

    #[test]
    fn odd_column_count_adds_row() {
        let cols = vec![("a", vec![1.0]), ("b", vec![2.0]), ("c", vec![3.0])];
        let svg = render_histograms(&cols, &HistogramConfig::default()).unwrap();
        assert!(svg.contains(r#"width="640" height="480""#));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(render_histograms(&[], &HistogramConfig::default()).is_err());
        let bad = vec![("x", vec![])];
        assert!(render_histograms(&bad, &HistogramConfig::default()).is_err());
    }

    proptest! {
        #[test]
        fn every_value_is_counted(values in prop::collection::vec(-1e6f64..1e6, 1..200), bins in 1usize..30) {
            let h = Histogram::new(&values, bins).unwrap();
            prop_assert_eq!(h.total(), values.len());
            prop_assert_eq!(h.bins(), bins);
        }
    }
}
