//! # tn-inference
//!
//! Bayesian inference for the Turnout attendance model.
//!
//! This crate provides:
//! - the logistic-binomial reservation-rate model ([`model`])
//! - a posterior with Normal coefficient priors ([`posterior`])
//! - NUTS sampling with windowed adaptation, run over parallel chains
//! - MCMC diagnostics (R-hat, bulk/tail ESS, E-BFMI)
//! - HDI, posterior summary tables and scenario forecasts

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Adaptation: step-size dual averaging and mass matrix estimation (Welford).
pub mod adapt;
/// Chain storage and multi-chain parallel runner.
pub mod chain;
/// MCMC diagnostics: split R-hat, bulk/tail ESS, E-BFMI, quality gates.
pub mod diagnostics;
/// Highest-density intervals.
pub mod hdi;
/// HMC leapfrog integrator and Euclidean metric.
pub mod hmc;
/// Logistic-binomial regression over aggregated events.
pub mod model;
/// NUTS tree-building and sampling.
pub mod nuts;
/// Posterior API: log-pdf and gradient with priors.
pub mod posterior;
/// Posterior predictive forecasts for a new event scenario.
pub mod predict;
/// Per-parameter posterior summary table.
pub mod summary;

pub use chain::{Chain, SamplerResult, sample_nuts_multichain};
pub use diagnostics::{
    DiagnosticsResult, QualityGates, QualityStatus, QualitySummary, compute_diagnostics,
    quality_summary,
};
pub use hdi::hdi;
pub use model::{LogisticBinomialModel, default_priors};
pub use nuts::{NutsConfig, sample_nuts};
pub use posterior::{Posterior, Prior};
pub use predict::{Forecast, Interval, Scenario, predict, predictive_probabilities};
pub use summary::{ParamSummary, PosteriorSummary, summarize};
