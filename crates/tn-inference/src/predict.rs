//! Posterior predictive forecast of the reservation rate for a new event.
//!
//! For each retained draw `beta`, the new-condition probability is
//! `p = sigmoid(beta_0 + beta_1 * show_count + beta_2 * paid)`. The draws
//! of `p` are reduced to a mean and an HDI, then scaled into seat counts
//! per show and over the whole run.

use crate::chain::SamplerResult;
use crate::hdi::hdi;
use crate::model::{N_COEFFICIENTS, linear_predictor};
use serde::{Deserialize, Serialize};
use tn_core::{Error, Result};
use tn_prob::math::sigmoid;

/// Covariates and scaling constants of the event being forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Planned number of shows.
    pub show_count: u64,
    /// Whether the event is paid.
    pub is_paid: bool,
    /// Seats per show.
    pub capacity_per_show: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self { show_count: 4, is_paid: true, capacity_per_show: 38.0 }
    }
}

impl Scenario {
    /// Seats across all shows.
    pub fn total_capacity(&self) -> f64 {
        self.capacity_per_show * self.show_count as f64
    }

    /// `(show_count, paid indicator)` as model covariates.
    pub fn covariates(&self) -> (f64, f64) {
        (self.show_count as f64, if self.is_paid { 1.0 } else { 0.0 })
    }

    /// At least one show and a finite positive capacity.
    pub fn validate(&self) -> Result<()> {
        if self.show_count == 0 {
            return Err(Error::Validation("scenario show_count must be >= 1".to_string()));
        }
        if !self.capacity_per_show.is_finite() || self.capacity_per_show <= 0.0 {
            return Err(Error::Validation(format!(
                "scenario capacity_per_show must be finite and > 0, got {}",
                self.capacity_per_show
            )));
        }
        Ok(())
    }
}

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Interval {
    /// Both bounds multiplied by `factor`.
    pub fn scale(self, factor: f64) -> Self {
        Self { lower: self.lower * factor, upper: self.upper * factor }
    }

    /// `true` if `x` lies within the interval.
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

impl From<(f64, f64)> for Interval {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self { lower, upper }
    }
}

/// Forecast for a [`Scenario`].
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    /// Scenario the forecast was made for.
    pub scenario: Scenario,
    /// HDI probability mass.
    pub hdi_prob: f64,
    /// Posterior mean of the reservation probability.
    pub p_mean: f64,
    /// HDI of the reservation probability.
    pub p_hdi: Interval,
    /// Expected reservations per show.
    pub per_show_mean: f64,
    /// Expected reservations over all shows.
    pub total_mean: f64,
    /// Per-show reservation interval.
    pub per_show_hdi: Interval,
    /// Total reservation interval.
    pub total_hdi: Interval,
    /// Number of posterior draws used.
    pub n_draws: usize,
}

/// New-condition probability for every pooled draw, chain by chain.
pub fn predictive_probabilities(result: &SamplerResult, scenario: &Scenario) -> Result<Vec<f64>> {
    if result.dim() != N_COEFFICIENTS {
        return Err(Error::Validation(format!(
            "expected {} coefficients, sampler result has {}",
            N_COEFFICIENTS,
            result.dim()
        )));
    }
    let (shows, paid) = scenario.covariates();
    Ok(result.all_draws().map(|beta| sigmoid(linear_predictor(beta, shows, paid))).collect())
}

/// Forecast reservations for `scenario` from posterior draws.
pub fn predict(result: &SamplerResult, scenario: &Scenario, hdi_prob: f64) -> Result<Forecast> {
    scenario.validate()?;
    let p = predictive_probabilities(result, scenario)?;
    if p.is_empty() {
        return Err(Error::Validation("no posterior draws to predict from".to_string()));
    }

    let p_mean = p.iter().sum::<f64>() / p.len() as f64;
    let p_hdi = Interval::from(hdi(&p, hdi_prob)?);

    let per_show = scenario.capacity_per_show;
    let total = scenario.total_capacity();
    tracing::debug!(p_mean, lower = p_hdi.lower, upper = p_hdi.upper, "predictive probability");

    Ok(Forecast {
        scenario: scenario.clone(),
        hdi_prob,
        p_mean,
        p_hdi,
        per_show_mean: p_mean * per_show,
        total_mean: p_mean * total,
        per_show_hdi: p_hdi.scale(per_show),
        total_hdi: p_hdi.scale(total),
        n_draws: p.len(),
    })
}
