//! Normal distribution utilities.

use tn_core::{Error, Result};

/// Natural log of `sqrt(2π)`.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Log-PDF of a Normal distribution `N(mu, sigma)` at `x`.
///
/// `log p(x) = -0.5 * ((x-mu)/sigma)^2 - ln(sigma) - ln(sqrt(2π))`
pub fn logpdf(x: f64, mu: f64, sigma: f64) -> Result<f64> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::Validation(format!("sigma must be finite and > 0, got {}", sigma)));
    }
    let z = (x - mu) / sigma;
    Ok(-0.5 * z * z - sigma.ln() - LN_SQRT_2PI)
}

/// Derivative of [`logpdf`] with respect to `x`: `-(x - mu) / sigma^2`.
#[inline]
pub fn dlogpdf_dx(x: f64, mu: f64, sigma: f64) -> f64 {
    -(x - mu) / (sigma * sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_at_zero() {
        let lp = logpdf(0.0, 0.0, 1.0).unwrap();
        assert!((lp + LN_SQRT_2PI).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry() {
        let lp1 = logpdf(1.3, 0.0, 2.0).unwrap();
        let lp2 = logpdf(-1.3, 0.0, 2.0).unwrap();
        assert!((lp1 - lp2).abs() < 1e-12);
    }

    #[test]
    fn test_derivative_vs_finite_diff() {
        let (mu, sigma) = (0.4, 1.7);
        let x = -0.9;
        let eps = 1e-6;
        let fd = (logpdf(x + eps, mu, sigma).unwrap() - logpdf(x - eps, mu, sigma).unwrap())
            / (2.0 * eps);
        assert!((fd - dlogpdf_dx(x, mu, sigma)).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(logpdf(0.0, 0.0, 0.0).is_err());
        assert!(logpdf(0.0, 0.0, -1.0).is_err());
    }
}
