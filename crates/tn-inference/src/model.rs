//! Logistic-binomial regression of reservation counts.
//!
//! Model, per aggregated event `i`:
//! - `eta_i = beta_0 + beta_1 * show_count_i + beta_2 * is_paid_i`
//! - `p_i = sigmoid(eta_i)`
//! - `reservations_total_i ~ Binomial(capacity_total_i, p_i)`
//!
//! Coefficient priors live in the [`crate::posterior::Posterior`]; the model
//! itself only carries the likelihood. [`default_priors`] gives the standard
//! `Normal(0, 1)` priors on all three coefficients.

use crate::posterior::Prior;
use tn_core::traits::LogDensityModel;
use tn_core::{Error, Result};
use tn_data::EventSummary;
use tn_prob::binomial::ln_choose;
use tn_prob::math::{log_sigmoid, sigmoid};

/// Number of regression coefficients.
pub const N_COEFFICIENTS: usize = 3;

/// Coefficient names, in parameter order.
pub const PARAMETER_NAMES: [&str; N_COEFFICIENTS] = ["beta_0", "beta_1", "beta_2"];

/// Linear predictor `beta_0 + beta_1 * show_count + beta_2 * paid`.
#[inline]
pub fn linear_predictor(beta: &[f64], show_count: f64, paid: f64) -> f64 {
    beta[0] + beta[1] * show_count + beta[2] * paid
}

/// Independent `Normal(0, 1)` priors on every coefficient.
pub fn default_priors() -> Vec<Prior> {
    vec![Prior::Normal { center: 0.0, width: 1.0 }; N_COEFFICIENTS]
}

/// One Binomial observation with its covariates.
#[derive(Debug, Clone, PartialEq)]
pub struct EventObservation {
    /// Number of trials (`capacity_total`).
    pub trials: u64,
    /// Number of successes (`reservations_total`).
    pub successes: u64,
    /// Show-count covariate.
    pub show_count: f64,
    /// Paid indicator covariate (0 or 1).
    pub paid: f64,
}

impl From<&EventSummary> for EventObservation {
    fn from(e: &EventSummary) -> Self {
        Self {
            trials: e.capacity_total,
            successes: e.reservations_total,
            show_count: e.show_count as f64,
            paid: e.paid_indicator(),
        }
    }
}

/// Logistic-binomial reservation-rate model.
#[derive(Debug, Clone)]
pub struct LogisticBinomialModel {
    obs: Vec<EventObservation>,
    // Cached `ln(n choose k)` per observation.
    log_norm: Vec<f64>,
}

impl LogisticBinomialModel {
    /// Build the model from Binomial observations.
    ///
    /// Rejects an empty data set, `successes > trials` and non-finite covariates.
    pub fn new(obs: Vec<EventObservation>) -> Result<Self> {
        if obs.is_empty() {
            return Err(Error::Validation("model requires at least one observation".to_string()));
        }
        for (i, o) in obs.iter().enumerate() {
            if o.successes > o.trials {
                return Err(Error::Validation(format!(
                    "observation {}: successes ({}) exceed trials ({})",
                    i, o.successes, o.trials
                )));
            }
            if !o.show_count.is_finite() || !o.paid.is_finite() {
                return Err(Error::Validation(format!(
                    "observation {}: covariates must be finite",
                    i
                )));
            }
        }
        let log_norm = obs.iter().map(|o| ln_choose(o.trials, o.successes)).collect();
        Ok(Self { obs, log_norm })
    }

    /// Build the model from aggregated event rows.
    pub fn from_events(events: &[EventSummary]) -> Result<Self> {
        Self::new(events.iter().map(EventObservation::from).collect())
    }

    /// Observations in model order.
    pub fn observations(&self) -> &[EventObservation] {
        &self.obs
    }

    /// Number of observations.
    pub fn n_obs(&self) -> usize {
        self.obs.len()
    }

    /// Fitted reservation probability for observation `i` at `beta`.
    pub fn probability(&self, i: usize, beta: &[f64]) -> f64 {
        let o = &self.obs[i];
        sigmoid(linear_predictor(beta, o.show_count, o.paid))
    }

    fn check_dim(&self, params: &[f64]) -> Result<()> {
        if params.len() != N_COEFFICIENTS {
            return Err(Error::Validation(format!(
                "expected {} parameters, got {}",
                N_COEFFICIENTS,
                params.len()
            )));
        }
        Ok(())
    }
}

impl LogDensityModel for LogisticBinomialModel {
    fn dim(&self) -> usize {
        N_COEFFICIENTS
    }

    fn parameter_names(&self) -> Vec<String> {
        PARAMETER_NAMES.iter().map(|s| s.to_string()).collect()
    }

    // Non-finite parameters propagate as NaN instead of erroring, so the
    // sampler can flag the trajectory as divergent.
    fn nll(&self, params: &[f64]) -> Result<f64> {
        self.check_dim(params)?;

        let mut ll = 0.0;
        for (o, &lc) in self.obs.iter().zip(&self.log_norm) {
            let eta = linear_predictor(params, o.show_count, o.paid);
            let k = o.successes as f64;
            let n = o.trials as f64;
            ll += lc + k * log_sigmoid(eta) + (n - k) * log_sigmoid(-eta);
        }
        Ok(-ll)
    }

    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.check_dim(params)?;

        // d(loglik)/d(eta) = k - n * sigmoid(eta)
        let mut grad = vec![0.0; N_COEFFICIENTS];
        for o in &self.obs {
            let eta = linear_predictor(params, o.show_count, o.paid);
            let resid = o.successes as f64 - o.trials as f64 * sigmoid(eta);
            grad[0] -= resid;
            grad[1] -= resid * o.show_count;
            grad[2] -= resid * o.paid;
        }
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tn_prob::binomial::logpmf_logit;

    fn toy_model() -> LogisticBinomialModel {
        LogisticBinomialModel::new(vec![
            EventObservation { trials: 200, successes: 160, show_count: 2.0, paid: 0.0 },
            EventObservation { trials: 150, successes: 140, show_count: 3.0, paid: 1.0 },
            EventObservation { trials: 300, successes: 250, show_count: 4.0, paid: 1.0 },
        ])
        .unwrap()
    }

    #[test]
    fn test_nll_matches_binomial_logpmf() {
        let m = toy_model();
        let beta = [0.3, 0.2, 0.5];
        let expected: f64 = m
            .observations()
            .iter()
            .map(|o| {
                let eta = linear_predictor(&beta, o.show_count, o.paid);
                -logpmf_logit(o.successes, o.trials, eta).unwrap()
            })
            .sum();
        let nll = m.nll(&beta).unwrap();
        assert!((nll - expected).abs() < 1e-9, "nll={} expected={}", nll, expected);
    }

    #[test]
    fn test_grad_vs_finite_diff() {
        let m = toy_model();
        let beta = vec![0.1, -0.2, 0.7];
        let grad = m.grad_nll(&beta).unwrap();

        let eps = 1e-6;
        for i in 0..beta.len() {
            let mut plus = beta.clone();
            plus[i] += eps;
            let mut minus = beta.clone();
            minus[i] -= eps;
            let fd = (m.nll(&plus).unwrap() - m.nll(&minus).unwrap()) / (2.0 * eps);
            let scale = grad[i].abs().max(1.0);
            assert!(
                (grad[i] - fd).abs() / scale < 1e-5,
                "grad[{}]: analytical={}, fd={}",
                i,
                grad[i],
                fd
            );
        }
    }

    #[test]
    fn test_from_events_uses_paid_indicator() {
        let events = vec![
            EventSummary {
                event_id: "A".to_string(),
                capacity_total: 80,
                reservations_total: 70,
                show_count: 2,
                is_paid: true,
            },
            EventSummary {
                event_id: "B".to_string(),
                capacity_total: 90,
                reservations_total: 45,
                show_count: 3,
                is_paid: false,
            },
        ];
        let m = LogisticBinomialModel::from_events(&events).unwrap();
        assert_eq!(m.n_obs(), 2);
        assert_eq!(m.observations()[0].paid, 1.0);
        assert_eq!(m.observations()[1].paid, 0.0);
        assert_eq!(m.observations()[1].show_count, 3.0);
        assert!((m.probability(0, &[0.0, 0.0, 0.0]) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_overbooked_observation() {
        let err = LogisticBinomialModel::new(vec![EventObservation {
            trials: 10,
            successes: 11,
            show_count: 1.0,
            paid: 0.0,
        }])
        .unwrap_err();
        assert!(err.to_string().contains("exceed"));
    }

    #[test]
    fn test_rejects_empty_and_wrong_dim() {
        assert!(LogisticBinomialModel::new(vec![]).is_err());
        let m = toy_model();
        assert!(m.nll(&[0.0, 0.0]).is_err());
        assert!(m.grad_nll(&[0.0; 4]).is_err());
    }

    #[test]
    fn test_nonfinite_params_propagate_nan() {
        let m = toy_model();
        let v = m.nll(&[f64::NAN, 0.0, 0.0]).unwrap();
        assert!(!v.is_finite());
    }

    #[test]
    fn test_default_priors_are_standard_normal() {
        let priors = default_priors();
        assert_eq!(priors.len(), 3);
        for p in priors {
            match p {
                Prior::Normal { center, width } => {
                    assert_eq!(center, 0.0);
                    assert_eq!(width, 1.0);
                }
                Prior::Flat => panic!("expected Normal prior"),
            }
        }
    }

    #[test]
    fn test_parameter_names() {
        assert_eq!(toy_model().parameter_names(), vec!["beta_0", "beta_1", "beta_2"]);
    }
}
