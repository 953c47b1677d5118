//! Plain-text report sections for the console and `pymc_summary.txt`.

use std::fmt::Write as _;

use tn_data::{DescribeTable, EventSummary, format_head};
use tn_inference::{Forecast, Interval, PosteriorSummary, QualityStatus, QualitySummary};

const RULE: &str = "-----------------";

fn fmt_interval(i: &Interval) -> String {
    format!("[{:.4}, {:.4}]", i.lower, i.upper)
}

fn pct(prob: f64) -> String {
    let p = prob * 100.0;
    if (p - p.round()).abs() < 1e-9 { format!("{:.0}%", p) } else { format!("{:.1}%", p) }
}

fn scenario_label(f: &Forecast) -> String {
    let (shows, paid) = f.scenario.covariates();
    format!("show_count={}, is_paid={}", shows, paid)
}

/// Head, describe table and row count of the aggregated events.
pub fn data_preview(events: &[EventSummary], describe: &DescribeTable, head_rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "----- Data -----");
    let _ = writeln!(out, "{}", format_head(events, head_rows));
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{}", describe);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Data count: {}", events.len());
    let _ = writeln!(out, "{}", RULE);
    out
}

/// Coefficient table followed by the sampler quality verdict.
pub fn posterior_section(summary: &PosteriorSummary, quality: &QualitySummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### Posterior summary of coefficients ###");
    let _ = write!(out, "{}", summary);
    let _ = writeln!(out, "Sampler quality: {}", quality.status);
    for w in quality.failures.iter().chain(&quality.warnings) {
        let _ = writeln!(out, "  - {}", w);
    }
    if quality.status != QualityStatus::Ok {
        let _ = writeln!(out, "  (estimates above may be unreliable)");
    }
    out
}

/// Posterior mean and HDI of the new-condition probability plus the four
/// attendance forecasts.
pub fn forecast_section(f: &Forecast) -> String {
    let label = scenario_label(f);
    let hdi = pct(f.hdi_prob);
    let mut out = String::new();
    let _ = writeln!(out, "Posterior mean of p ({}): {:.4}", label, f.p_mean);
    let _ = writeln!(out, "{} HDI of p ({}): {}", hdi, label, fmt_interval(&f.p_hdi));
    let _ = writeln!(out, "----------------------------------------");
    let _ = writeln!(
        out,
        "Capacity {} per show, {} shows, {} event.",
        f.scenario.capacity_per_show,
        f.scenario.show_count,
        if f.scenario.is_paid { "paid" } else { "free" }
    );
    let _ = writeln!(out, "Expected reservations per show: {:.4}", f.per_show_mean);
    let _ = writeln!(out, "Expected total reservations: {:.4}", f.total_mean);
    let _ = writeln!(out, "{} interval of reservations per show: {}", hdi, fmt_interval(&f.per_show_hdi));
    let _ = writeln!(out, "{} interval of total reservations: {}", hdi, fmt_interval(&f.total_hdi));
    out
}

/// Contents of `pymc_summary.txt`.
pub fn summary_file(describe: &DescribeTable, f: &Forecast) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-------- Past events --------");
    let _ = writeln!(out, "{}", describe);
    let _ = writeln!(out, "-------- Forecast from past data --------");
    out.push_str(&forecast_section(f));
    out
}

/// Console output of a full run.
pub fn console_report(
    preview: &str,
    summary: &PosteriorSummary,
    quality: &QualitySummary,
    forecast: &Forecast,
) -> String {
    let mut out = String::with_capacity(preview.len() + 2048);
    out.push_str(preview);
    out.push_str(&posterior_section(summary, quality));
    let _ = writeln!(out, "--------------------");
    out.push_str(&forecast_section(forecast));
    let _ = writeln!(out, "--------------------");
    out
}
