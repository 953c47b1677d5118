//! # tn-viz
//!
//! Small immediate-mode SVG renderer used for the histogram preview of the
//! aggregated event table, plus rasterization to PNG.

#![warn(clippy::all)]

pub mod axes;
pub mod canvas;
pub mod color;
pub mod histogram;
pub mod output;
pub mod primitives;

pub use histogram::{Histogram, HistogramConfig, render_histograms};
pub use output::png::svg_to_png;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("layout error: {0}")]
    Layout(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PNG encoding error: {0}")]
    Png(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
