//! Probability building blocks for Turnout.
//!
//! - small numeric helpers (stable log/exp/sigmoid primitives)
//! - Binomial log-PMF (probability or logit parameterisation)
//! - Normal log-PDF (used for coefficient priors)

pub mod binomial;
pub mod math;
pub mod normal;
