//! Warmup adaptation for NUTS: step size via dual averaging and the
//! Euclidean metric via windowed Welford estimates.
//!
//! The schedule follows Stan: a fast initial buffer, doubling slow windows
//! that estimate the posterior (co)variance, then a terminal buffer where
//! only the step size moves.

use crate::hmc::{LeapfrogIntegrator, Metric};
use crate::posterior::Posterior;
use nalgebra::DMatrix;
use tn_core::traits::LogDensityModel;

/// Largest dimension for which a dense metric is estimated.
pub const DENSE_METRIC_MAX_DIM: usize = 32;

/// Dual averaging for step size adaptation (Nesterov 2009, Stan variant).
pub struct DualAveraging {
    target_accept: f64,
    log_eps: f64,
    log_eps_bar: f64,
    h_bar: f64,
    mu: f64,
    gamma: f64,
    t0: f64,
    kappa: f64,
    step: usize,
}

impl DualAveraging {
    /// Create with target acceptance rate and initial step size.
    pub fn new(target_accept: f64, init_eps: f64) -> Self {
        // Smoothed iterate starts at init_eps rather than 1.0; short warmups
        // otherwise end with a badly biased step size.
        let log_eps0 = init_eps.ln();
        Self {
            target_accept,
            log_eps: log_eps0,
            log_eps_bar: log_eps0,
            h_bar: 0.0,
            mu: (10.0 * init_eps).ln(),
            gamma: 0.05,
            t0: 10.0,
            kappa: 0.75,
            step: 0,
        }
    }

    /// Update with the acceptance statistic of one transition.
    pub fn update(&mut self, accept_prob: f64) {
        let accept_prob = if accept_prob.is_finite() { accept_prob.clamp(0.0, 1.0) } else { 0.0 };
        self.step += 1;
        let m = self.step as f64;
        let w = 1.0 / (m + self.t0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.target_accept - accept_prob);

        self.log_eps = self.mu - (m.sqrt() / self.gamma) * self.h_bar;
        let m_kappa = m.powf(-self.kappa);
        self.log_eps_bar = m_kappa * self.log_eps + (1.0 - m_kappa) * self.log_eps_bar;
    }

    /// Step size to use for the next warmup transition.
    pub fn current_step_size(&self) -> f64 {
        self.log_eps.exp()
    }

    /// Smoothed step size, used once warmup ends.
    pub fn adapted_step_size(&self) -> f64 {
        self.log_eps_bar.exp()
    }

    /// Restart the averaging around a new step size.
    pub fn reset(&mut self, init_eps: f64) {
        self.log_eps = init_eps.ln();
        self.log_eps_bar = init_eps.ln();
        self.h_bar = 0.0;
        self.mu = (10.0 * init_eps).ln();
        self.step = 0;
    }
}

/// Online Welford variance estimator (diagonal metric).
pub struct WelfordVariance {
    mean: Vec<f64>,
    m2: Vec<f64>,
    count: usize,
}

impl WelfordVariance {
    pub fn new(dim: usize) -> Self {
        Self { mean: vec![0.0; dim], m2: vec![0.0; dim], count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn update(&mut self, x: &[f64]) {
        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), &xi) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(x) {
            let delta = xi - *mean;
            *mean += delta / n;
            *m2 += delta * (xi - *mean);
        }
    }

    /// Sample variance; `1.0` per dimension until two samples are seen.
    pub fn variance(&self) -> Vec<f64> {
        if self.count < 2 {
            return vec![1.0; self.mean.len()];
        }
        let n = self.count as f64;
        self.m2.iter().map(|&m| (m / (n - 1.0)).max(1e-10)).collect()
    }

    /// Stan-regularised variance: `n/(n+5) * var + 1e-3 * 5/(n+5)`.
    pub fn regularized_variance(&self) -> Vec<f64> {
        let n = self.count as f64;
        let w = n / (n + 5.0);
        self.variance().into_iter().map(|v| w * v + 1e-3 * (1.0 - w)).collect()
    }

    pub fn reset(&mut self) {
        self.mean.fill(0.0);
        self.m2.fill(0.0);
        self.count = 0;
    }
}

/// Online Welford covariance estimator (dense metric).
///
/// Keeps a running mean and a row-major `M2` with `cov = M2 / (n - 1)`.
pub struct WelfordCovariance {
    mean: Vec<f64>,
    m2: Vec<f64>,
    dim: usize,
    count: usize,
}

impl WelfordCovariance {
    pub fn new(dim: usize) -> Self {
        Self { mean: vec![0.0; dim], m2: vec![0.0; dim * dim], dim, count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn update(&mut self, x: &[f64]) {
        self.count += 1;
        let n = self.count as f64;

        let delta: Vec<f64> = x.iter().zip(&self.mean).map(|(&xi, &m)| xi - m).collect();
        for (m, &d) in self.mean.iter_mut().zip(&delta) {
            *m += d / n;
        }
        let delta2: Vec<f64> = x.iter().zip(&self.mean).map(|(&xi, &m)| xi - m).collect();

        for i in 0..self.dim {
            for j in 0..self.dim {
                self.m2[i * self.dim + j] += delta[i] * delta2[j];
            }
        }
    }

    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        if self.count < 2 {
            return None;
        }
        let denom = self.count as f64 - 1.0;
        Some(DMatrix::from_row_slice(self.dim, self.dim, &self.m2).map(|v| v / denom))
    }

    /// Covariance shrunk toward `1e-3 * I` with Stan's `n/(n+5)` weight.
    pub fn regularized_covariance(&self) -> Option<DMatrix<f64>> {
        let mut cov = self.covariance()?;
        let n = self.count as f64;
        let w = n / (n + 5.0);
        cov *= w;
        for i in 0..self.dim {
            cov[(i, i)] += 1e-3 * (1.0 - w);
        }
        Some(cov)
    }

    pub fn reset(&mut self) {
        self.mean.fill(0.0);
        self.m2.fill(0.0);
        self.count = 0;
    }
}

/// Dense metric from a covariance estimate: `M^{-1} = cov = L L^T`.
///
/// Returns `None` when the matrix is not positive definite.
fn dense_metric(cov: DMatrix<f64>) -> Option<Metric> {
    let n = cov.nrows();
    let l = cov.cholesky()?.l();
    let mut row_major = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            row_major[i * n + j] = l[(i, j)];
        }
    }
    if row_major.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Metric::DenseCholesky { dim: n, l: row_major })
}

/// Windowed adaptation combining step size and metric tuning.
///
/// ```text
/// n_warmup = 1000:
///   0..75      fast: step size only
///   75..100    slow: step size, metric at end
///   100..150   slow
///   150..250   slow
///   250..450   slow
///   450..950   slow
///   950..1000  terminal: step size only
/// ```
pub struct WindowedAdaptation {
    dual_avg: DualAveraging,
    welford: WelfordVariance,
    welford_cov: Option<WelfordCovariance>,
    windows: Vec<(usize, usize)>,
    current_window: usize,
    metric: Metric,
}

impl WindowedAdaptation {
    pub fn new(dim: usize, n_warmup: usize, target_accept: f64, init_eps: f64) -> Self {
        let welford_cov =
            if dim <= DENSE_METRIC_MAX_DIM { Some(WelfordCovariance::new(dim)) } else { None };
        Self {
            dual_avg: DualAveraging::new(target_accept, init_eps),
            welford: WelfordVariance::new(dim),
            welford_cov,
            windows: compute_windows(n_warmup),
            current_window: 0,
            metric: Metric::identity(dim),
        }
    }

    /// Feed one warmup transition. Returns `true` when the metric changed.
    pub fn update(&mut self, iter: usize, q: &[f64], accept_prob: f64) -> bool {
        self.dual_avg.update(accept_prob);

        if self.current_window >= self.windows.len() {
            return false;
        }
        let (_, end) = self.windows[self.current_window];
        let is_slow_window =
            self.current_window > 0 && self.current_window + 1 < self.windows.len();

        if is_slow_window {
            self.welford.update(q);
            if let Some(wc) = self.welford_cov.as_mut() {
                wc.update(q);
            }
        }

        if iter + 1 < end {
            return false;
        }

        let mut metric_updated = false;
        if is_slow_window {
            self.metric = self
                .welford_cov
                .as_ref()
                .and_then(WelfordCovariance::regularized_covariance)
                .and_then(dense_metric)
                .unwrap_or_else(|| Metric::Diag(self.welford.regularized_variance()));
            tracing::trace!(window = self.current_window, end, "metric updated");

            self.welford.reset();
            if let Some(wc) = self.welford_cov.as_mut() {
                wc.reset();
            }
            metric_updated = true;
        }

        let eps = self.dual_avg.adapted_step_size();
        self.dual_avg.reset(eps);
        self.current_window += 1;

        metric_updated
    }

    /// Step size for the next warmup transition.
    pub fn step_size(&self) -> f64 {
        self.dual_avg.current_step_size()
    }

    /// Smoothed step size to lock in after warmup.
    pub fn adapted_step_size(&self) -> f64 {
        self.dual_avg.adapted_step_size()
    }

    /// Current metric (inverse mass matrix).
    pub fn metric(&self) -> &Metric {
        &self.metric
    }
}

/// Stan-style adaptation windows as `(start, end)` iteration ranges.
pub fn compute_windows(n_warmup: usize) -> Vec<(usize, usize)> {
    // Too short for stable metric estimates: step size only.
    if n_warmup < 50 {
        return vec![(0, n_warmup)];
    }

    let init_buffer = 75.min(n_warmup / 5);
    let term_buffer = 50.min(n_warmup / 5);
    let slow_end = n_warmup - term_buffer;

    let mut windows = vec![(0, init_buffer)];

    let mut start = init_buffer;
    let mut size = 25usize;
    while start < slow_end {
        let mut end = (start + size).min(slow_end);
        // Fold a too-short trailing window into the current one.
        if slow_end - end < 2 * size {
            end = slow_end;
        }
        windows.push((start, end));
        start = end;
        size *= 2;
    }

    windows.push((slow_end, n_warmup));
    windows
}

/// Find a reasonable initial step size (Hoffman & Gelman 2014, Algorithm 4).
///
/// Doubles or halves `eps` from `0.1` until the one-step acceptance
/// probability crosses 0.5.
pub fn find_reasonable_step_size<M: LogDensityModel + ?Sized>(
    posterior: &Posterior<'_, M>,
    q: &[f64],
    metric: &Metric,
) -> f64 {
    let integrator = LeapfrogIntegrator::new(posterior, 1.0, metric.clone());
    let mut state = match integrator.init_state(q.to_vec()) {
        Ok(s) => s,
        Err(_) => return 0.01,
    };
    state.p.fill(1.0);
    let h0 = state.hamiltonian(metric);

    let test_accept = |eps: f64| -> Option<f64> {
        let mut s = state.clone();
        integrator.step_with_eps(&mut s, eps).ok()?;
        let a = (h0 - s.hamiltonian(metric)).exp();
        if a.is_finite() { Some(a.min(1.0)) } else { None }
    };

    let mut eps = 0.1;
    let accept0 = match test_accept(eps) {
        Some(a) => a,
        None => {
            eps = 0.001;
            match test_accept(eps) {
                Some(a) => a,
                None => return 0.001,
            }
        }
    };

    let direction: f64 = if accept0 > 0.5 { 1.0 } else { -1.0 };
    for _ in 0..50 {
        let new_eps = eps * 2.0_f64.powf(direction);
        if !(1e-10..=1e3).contains(&new_eps) {
            break;
        }
        match test_accept(new_eps) {
            Some(a) if direction > 0.0 && a < 0.5 => break,
            Some(a) if direction < 0.0 && a > 0.5 => {
                eps = new_eps;
                break;
            }
            Some(_) => eps = new_eps,
            None => break,
        }
    }

    eps.clamp(1e-8, 1e3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventObservation, LogisticBinomialModel, default_priors};

    #[test]
    fn test_dual_averaging_converges() {
        let mut da = DualAveraging::new(0.8, 1.0);
        for _ in 0..100 {
            da.update(0.8);
        }
        let eps = da.adapted_step_size();
        assert!(eps > 0.0 && eps.is_finite(), "Step size should be positive finite: {}", eps);
    }

    #[test]
    fn test_dual_averaging_adapts_direction() {
        let mut da_high = DualAveraging::new(0.8, 0.01);
        for _ in 0..200 {
            da_high.update(0.99);
        }
        let mut da_low = DualAveraging::new(0.8, 1.0);
        for _ in 0..200 {
            da_low.update(0.1);
        }
        let (hi, lo) = (da_high.adapted_step_size(), da_low.adapted_step_size());
        assert!(hi > lo, "High accept => larger step: {} vs {}", hi, lo);
    }

    #[test]
    fn test_dual_averaging_ignores_nan() {
        let mut da = DualAveraging::new(0.8, 0.5);
        da.update(f64::NAN);
        assert!(da.current_step_size().is_finite());
    }

    #[test]
    fn test_welford_variance() {
        let mut w = WelfordVariance::new(2);
        for d in [[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]] {
            w.update(&d);
        }
        let var = w.variance();
        assert!((var[0] - 2.5).abs() < 1e-10, "{}", var[0]);
        assert!((var[1] - 250.0).abs() < 1e-10, "{}", var[1]);

        let reg = w.regularized_variance();
        let expected = 0.5 * 2.5 + 0.5 * 1e-3;
        assert!((reg[0] - expected).abs() < 1e-12);

        w.reset();
        assert_eq!(w.variance(), vec![1.0, 1.0]);
        assert_eq!(w.count(), 0);
    }

    #[test]
    fn test_welford_covariance() {
        let mut w = WelfordCovariance::new(2);
        for d in [[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]] {
            w.update(&d);
        }
        let cov = w.covariance().unwrap();
        // var(x) = 5/3, cov(x, 2x) = 10/3, var(2x) = 20/3
        assert!((cov[(0, 0)] - 5.0 / 3.0).abs() < 1e-12);
        assert!((cov[(0, 1)] - 10.0 / 3.0).abs() < 1e-12);
        assert!((cov[(1, 0)] - 10.0 / 3.0).abs() < 1e-12);
        assert!((cov[(1, 1)] - 20.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_dense_metric_reproduces_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 10.0]);
        let metric = dense_metric(cov).unwrap();
        // M^{-1} e_0 = first column of cov
        let v = metric.mul_inv_mass(&[1.0, 0.0]);
        assert!((v[0] - 4.0).abs() < 1e-12);
        assert!((v[1] - 2.0).abs() < 1e-12);
        let v = metric.mul_inv_mass(&[0.0, 1.0]);
        assert!((v[0] - 2.0).abs() < 1e-12);
        assert!((v[1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_dense_metric_rejects_indefinite() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 3.0, 1.0]);
        assert!(dense_metric(cov).is_none());
    }

    #[test]
    fn test_compute_windows() {
        let windows = compute_windows(1000);
        assert!(windows.len() >= 3, "{:?}", windows);
        assert_eq!(windows[0], (0, 75));
        assert_eq!(*windows.last().unwrap(), (950, 1000));
        for i in 1..windows.len() {
            assert_eq!(windows[i].0, windows[i - 1].1, "Windows not contiguous at {}", i);
        }
    }

    #[test]
    fn test_compute_windows_small() {
        assert_eq!(compute_windows(10), vec![(0, 10)]);
        let w = compute_windows(100);
        assert_eq!(w.first().unwrap().0, 0);
        assert_eq!(w.last().unwrap().1, 100);
        for i in 1..w.len() {
            assert_eq!(w[i].0, w[i - 1].1);
        }
    }

    #[test]
    fn test_windowed_adaptation_updates_metric() {
        let mut adapt = WindowedAdaptation::new(2, 200, 0.8, 0.1);
        let mut updated = 0;
        for i in 0..200 {
            let x = (i as f64 * 0.37).sin();
            let q = [x, 3.0 * x + 0.1 * (i as f64 * 0.11).cos()];
            if adapt.update(i, &q, 0.8) {
                updated += 1;
            }
        }
        assert!(updated >= 1);
        assert!(matches!(adapt.metric(), Metric::DenseCholesky { dim: 2, .. }));
        assert!(adapt.adapted_step_size().is_finite());
    }

    #[test]
    fn test_find_reasonable_step_size() {
        let m = LogisticBinomialModel::new(vec![
            EventObservation { trials: 100, successes: 80, show_count: 2.0, paid: 0.0 },
            EventObservation { trials: 100, successes: 95, show_count: 3.0, paid: 1.0 },
        ])
        .unwrap();
        let posterior = Posterior::new(&m).with_priors(default_priors()).unwrap();
        let eps = find_reasonable_step_size(&posterior, &[0.0, 0.0, 0.0], &Metric::identity(3));
        assert!(eps > 0.0 && eps < 10.0, "eps={}", eps);
    }
}
