//! Core traits for Turnout
//!
//! The sampler in `tn-inference` only sees a model through
//! [`LogDensityModel`]: a smooth negative log-likelihood over an
//! unconstrained real parameter vector together with its gradient.

use crate::Result;

/// A differentiable model over `dim()` real parameters.
///
/// Priors are not part of the model; they are attached by the posterior.
pub trait LogDensityModel: Send + Sync {
    /// Number of parameters.
    fn dim(&self) -> usize;

    /// Parameter names, in parameter order.
    fn parameter_names(&self) -> Vec<String>;

    /// Default starting point for sampling.
    fn parameter_init(&self) -> Vec<f64> {
        vec![0.0; self.dim()]
    }

    /// Negative log-likelihood at `params`.
    fn nll(&self, params: &[f64]) -> Result<f64>;

    /// Gradient of [`LogDensityModel::nll`] with respect to `params`.
    fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic;

    impl LogDensityModel for Quadratic {
        fn dim(&self) -> usize {
            2
        }

        fn parameter_names(&self) -> Vec<String> {
            vec!["a".to_string(), "b".to_string()]
        }

        fn nll(&self, params: &[f64]) -> Result<f64> {
            Ok(0.5 * params.iter().map(|x| x * x).sum::<f64>())
        }

        fn grad_nll(&self, params: &[f64]) -> Result<Vec<f64>> {
            Ok(params.to_vec())
        }
    }

    #[test]
    fn test_default_init_is_zero() {
        let m = Quadratic;
        assert_eq!(m.parameter_init(), vec![0.0, 0.0]);
        assert_eq!(m.nll(&[1.0, 1.0]).unwrap(), 1.0);
    }
}
