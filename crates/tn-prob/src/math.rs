//! Small numerically-stable math utilities used across probability code.

/// Stable `log(1 + exp(x))`.
///
/// `log(1+exp(x)) = max(x,0) + log(1+exp(-|x|))`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let e = (-x.abs()).exp(); // always in (0, 1], no overflow
    x.max(0.0) + e.ln_1p()
}

/// Stable logistic function: `1 / (1 + exp(-x))`.
///
/// This is the inverse link of the reservation-rate model. A single
/// `exp(-|x|)` is evaluated so neither tail overflows.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    let recip = 1.0 / (1.0 + e);
    // x >= 0: 1/(1+exp(-x)); x < 0: exp(x)/(1+exp(x))
    if x >= 0.0 { recip } else { e * recip }
}

/// Stable `log(sigmoid(x))`.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    // log(sigmoid(x)) = -log(1 + exp(-x))
    if x >= 0.0 { -(-x).exp().ln_1p() } else { x - x.exp().ln_1p() }
}

/// Log-odds of `p`. Returns `±inf` at the boundaries.
#[inline]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}
