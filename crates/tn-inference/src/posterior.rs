//! Posterior distribution for Bayesian inference.
//!
//! Wraps any [`LogDensityModel`] and adds per-parameter priors:
//!
//! - `logpdf(theta) = -model.nll(theta) + sum(prior_logpdf)`
//!
//! All parameters are unconstrained reals, so the sampler works directly in
//! model space.

use tn_core::traits::LogDensityModel;
use tn_core::{Error, Result};

/// Prior distribution for a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Prior {
    /// Flat (improper) prior, contributes 0 to log-posterior.
    Flat,
    /// Normal prior: `log p(theta) = -0.5 * ((theta - center) / width)^2 + const`.
    Normal {
        /// Center of the Gaussian prior.
        center: f64,
        /// Width (standard deviation) of the Gaussian prior.
        width: f64,
    },
}

impl Prior {
    fn validate(&self) -> Result<()> {
        match self {
            Prior::Flat => Ok(()),
            Prior::Normal { center, width } => {
                if !center.is_finite() || !width.is_finite() || *width <= 0.0 {
                    return Err(Error::Validation(format!(
                        "Normal prior requires finite center and width > 0, got center={} width={}",
                        center, width
                    )));
                }
                Ok(())
            }
        }
    }

    #[inline]
    fn logpdf(&self, x: f64) -> Result<f64> {
        match self {
            Prior::Flat => Ok(0.0),
            Prior::Normal { center, width } => tn_prob::normal::logpdf(x, *center, *width),
        }
    }

    #[inline]
    fn grad(&self, x: f64) -> f64 {
        match self {
            Prior::Flat => 0.0,
            Prior::Normal { center, width } => tn_prob::normal::dlogpdf_dx(x, *center, *width),
        }
    }
}

/// Posterior wrapping a model with priors.
pub struct Posterior<'a, M: LogDensityModel + ?Sized> {
    model: &'a M,
    priors: Vec<Prior>,
}

impl<'a, M: LogDensityModel + ?Sized> Posterior<'a, M> {
    /// Create a new posterior with flat priors.
    pub fn new(model: &'a M) -> Self {
        let priors = vec![Prior::Flat; model.dim()];
        Self { model, priors }
    }

    /// Set priors (one per parameter).
    pub fn with_priors(mut self, priors: Vec<Prior>) -> Result<Self> {
        if priors.len() != self.model.dim() {
            return Err(Error::Validation(format!(
                "expected {} priors, got {}",
                self.model.dim(),
                priors.len()
            )));
        }
        for p in &priors {
            p.validate()?;
        }
        self.priors = priors;
        Ok(self)
    }

    /// Number of parameters.
    pub fn dim(&self) -> usize {
        self.model.dim()
    }

    /// Reference to the underlying model.
    pub fn model(&self) -> &M {
        self.model
    }

    /// Priors in parameter order.
    pub fn priors(&self) -> &[Prior] {
        &self.priors
    }

    /// Log-posterior density (up to a constant).
    pub fn logpdf(&self, theta: &[f64]) -> Result<f64> {
        let mut lp = -self.model.nll(theta)?;
        for (prior, &x) in self.priors.iter().zip(theta) {
            lp += prior.logpdf(x)?;
        }
        Ok(lp)
    }

    /// Gradient of the log-posterior.
    pub fn grad(&self, theta: &[f64]) -> Result<Vec<f64>> {
        let mut g = self.model.grad_nll(theta)?;

        // grad(logpdf) = -grad(nll) + grad(prior)
        for ((gi, prior), &x) in g.iter_mut().zip(&self.priors).zip(theta) {
            *gi = -*gi + prior.grad(x);
        }
        Ok(g)
    }
}
