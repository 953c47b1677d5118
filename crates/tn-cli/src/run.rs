//! `turnout run` / `turnout aggregate` orchestration.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tn_data::describe::numeric_columns;
use tn_data::{DescribeTable, EventSummary, aggregate_with, describe, read_records, validate_binomial_support};
use tn_inference::{
    DiagnosticsResult, Forecast, LogisticBinomialModel, Posterior, PosteriorSummary, QualityGates,
    QualityStatus, QualitySummary, compute_diagnostics, default_priors, predict, quality_summary,
    sample_nuts_multichain, summarize,
};
use tn_viz::HistogramConfig;

use crate::config::{RunConfig, SamplerConfig};
use crate::report;

/// Aggregated input and its descriptive statistics.
pub struct PreparedData {
    pub events: Vec<EventSummary>,
    pub describe: DescribeTable,
}

/// Load, aggregate and validate the show-level CSV.
pub fn prepare_data(config: &RunConfig) -> Result<PreparedData> {
    let records = read_records(&config.input)
        .with_context(|| format!("failed to load records from {}", config.input.display()))?;
    let events = aggregate_with(&records, config.paid_policy.classifier());
    validate_binomial_support(&events).context("aggregated data is not valid Binomial input")?;
    tracing::info!(rows = records.len(), events = events.len(), policy = ?config.paid_policy, "data aggregated");
    let describe = describe(&events);
    Ok(PreparedData { events, describe })
}

/// Machine-readable record of a run, written to `summary.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub version: &'static str,
    pub n_events: usize,
    pub sampler: &'a SamplerConfig,
    pub posterior: &'a PosteriorSummary,
    pub diagnostics: &'a DiagnosticsResult,
    pub quality: &'a QualitySummary,
    pub forecast: &'a Forecast,
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Text for stdout.
    pub console: String,
    pub artifacts: Vec<PathBuf>,
    pub quality: QualityStatus,
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("output directory {} does not exist", dir.display());
    }
    Ok(())
}

fn write_file(path: &Path, bytes: impl AsRef<[u8]>) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn write_histogram(config: &RunConfig, events: &[EventSummary]) -> Result<PathBuf> {
    let columns = numeric_columns(events);
    let hist_cfg = HistogramConfig { bins: config.histogram_bins, ..Default::default() };
    let svg = tn_viz::render_histograms(&columns, &hist_cfg).context("failed to render histograms")?;
    let png = tn_viz::svg_to_png(&svg, config.histogram_dpi).context("failed to rasterize histograms")?;
    let path = config.histogram_path();
    write_file(&path, png)?;
    tracing::info!(path = %path.display(), "histogram written");
    Ok(path)
}

/// Full pipeline: aggregate, plot, sample, summarize, predict, write.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutcome> {
    config.validate()?;
    ensure_output_dir(&config.output_dir)?;

    let data = prepare_data(config)?;
    let preview = report::data_preview(&data.events, &data.describe, config.head_rows);
    let histogram = write_histogram(config, &data.events)?;

    let model = LogisticBinomialModel::from_events(&data.events)?;
    let posterior = Posterior::new(&model).with_priors(default_priors())?;
    let s = &config.sampler;
    let result =
        sample_nuts_multichain(&posterior, s.n_chains, s.n_warmup, s.n_samples, s.seed, s.nuts())
            .context("sampling failed")?;

    let diagnostics = compute_diagnostics(&result);
    let quality = quality_summary(&diagnostics, s.n_chains, s.n_samples, &QualityGates::default());
    for msg in quality.failures.iter().chain(&quality.warnings) {
        tracing::warn!(status = %quality.status, "{}", msg);
    }

    let summary = summarize(&result, &diagnostics, config.hdi_prob)?;
    let forecast = predict(&result, &config.scenario, config.hdi_prob)?;
    tracing::info!(p_mean = forecast.p_mean, total_mean = forecast.total_mean, "forecast ready");

    let text_path = config.summary_text_path();
    write_file(&text_path, report::summary_file(&data.describe, &forecast))?;

    let json_path = config.summary_json_path();
    let run_summary = RunSummary {
        version: tn_core::VERSION,
        n_events: data.events.len(),
        sampler: &config.sampler,
        posterior: &summary,
        diagnostics: &diagnostics,
        quality: &quality,
        forecast: &forecast,
    };
    write_file(&json_path, serde_json::to_string_pretty(&run_summary)?)?;

    Ok(RunOutcome {
        console: report::console_report(&preview, &summary, &quality, &forecast),
        artifacts: vec![histogram, text_path, json_path],
        quality: quality.status,
    })
}

/// Aggregation-only preview (no sampling, nothing written).
pub fn run_aggregate(config: &RunConfig) -> Result<String> {
    let data = prepare_data(config)?;
    Ok(report::data_preview(&data.events, &data.describe, config.head_rows))
}
