//! Hamiltonian Monte Carlo (HMC) building blocks: Euclidean metric,
//! phase-space state and the leapfrog integrator. The NUTS sampler in
//! [`crate::nuts`] builds on top of this.

use crate::posterior::Posterior;
use rand_distr::{Distribution, StandardNormal};
use tn_core::Result;
use tn_core::traits::LogDensityModel;

/// Euclidean metric for HMC/NUTS.
///
/// Stores the *inverse* mass matrix, which is what the leapfrog velocity
/// `dq/dt = M^{-1} p` and the kinetic energy `K = 0.5 * p^T M^{-1} p` need.
/// After adaptation the inverse mass approximates the posterior covariance.
///
/// The dense case stores the row-major lower Cholesky factor `L` with
/// `M^{-1} = L L^T`, which gives:
/// - `M^{-1} p` via two triangular multiplies
/// - `p ~ N(0, M)` by solving `L^T p = z`, `z ~ N(0, I)`
#[derive(Debug, Clone)]
pub enum Metric {
    /// Diagonal inverse mass matrix.
    Diag(Vec<f64>),
    /// Dense inverse mass matrix as its row-major Cholesky factor `L`.
    DenseCholesky {
        /// Dimension.
        dim: usize,
        /// Lower-triangular factor, row-major `dim x dim`.
        l: Vec<f64>,
    },
}

impl Metric {
    /// Unit metric.
    pub fn identity(dim: usize) -> Self {
        Self::Diag(vec![1.0; dim])
    }

    /// Dimension.
    pub fn dim(&self) -> usize {
        match self {
            Metric::Diag(v) => v.len(),
            Metric::DenseCholesky { dim, .. } => *dim,
        }
    }

    #[inline]
    fn l_at(l: &[f64], dim: usize, i: usize, j: usize) -> f64 {
        l[i * dim + j]
    }

    /// Multiply by inverse mass: `v = M^{-1} p`.
    pub fn mul_inv_mass(&self, p: &[f64]) -> Vec<f64> {
        match self {
            Metric::Diag(inv_mass_diag) => {
                inv_mass_diag.iter().zip(p).map(|(&m, &pi)| m * pi).collect()
            }
            Metric::DenseCholesky { dim, l } => {
                let n = *dim;
                debug_assert_eq!(p.len(), n);

                // t = L^T p
                let mut t = vec![0.0; n];
                for (i, ti) in t.iter_mut().enumerate() {
                    *ti = (i..n).map(|k| Self::l_at(l, n, k, i) * p[k]).sum();
                }

                // v = L t
                (0..n).map(|i| (0..=i).map(|k| Self::l_at(l, n, i, k) * t[k]).sum()).collect()
            }
        }
    }

    /// Kinetic energy `0.5 * p^T M^{-1} p`.
    pub fn kinetic_energy(&self, p: &[f64]) -> f64 {
        let v = self.mul_inv_mass(p);
        0.5 * p.iter().zip(&v).map(|(&pi, &vi)| pi * vi).sum::<f64>()
    }

    /// Draw a momentum `p ~ N(0, M)`.
    pub fn sample_momentum(&self, rng: &mut impl rand::Rng) -> Vec<f64> {
        match self {
            Metric::Diag(inv_mass_diag) => inv_mass_diag
                .iter()
                .map(|&inv_m| {
                    let sigma = if inv_m > 0.0 { (1.0 / inv_m).sqrt() } else { 1.0 };
                    let z: f64 = StandardNormal.sample(rng);
                    sigma * z
                })
                .collect(),
            Metric::DenseCholesky { dim, l } => {
                let n = *dim;
                let z: Vec<f64> = (0..n).map(|_| StandardNormal.sample(rng)).collect();

                // Back-substitution for L^T p = z.
                let mut p = vec![0.0; n];
                for i in (0..n).rev() {
                    let mut rhs = z[i];
                    for k in (i + 1)..n {
                        rhs -= Self::l_at(l, n, k, i) * p[k];
                    }
                    let diag = Self::l_at(l, n, i, i);
                    p[i] = if !diag.is_finite() || diag.abs() < 1e-14 { z[i] } else { rhs / diag };
                }
                p
            }
        }
    }

    /// Mass matrix diagonal `diag(M)`, for reporting.
    pub fn mass_diag(&self) -> Vec<f64> {
        match self {
            Metric::Diag(inv_mass_diag) => {
                inv_mass_diag.iter().map(|&q| if q > 0.0 { 1.0 / q } else { 1.0 }).collect()
            }
            Metric::DenseCholesky { dim, l } => {
                // diag(M) = diag((L L^T)^{-1}) = column norms of L^{-1}.
                let n = *dim;
                let mut out = vec![0.0; n];
                for i in 0..n {
                    // Solve L y = e_i; row i of (L^{-1})^T ... accumulate y^T y contributions.
                    let mut y = vec![0.0; n];
                    for r in 0..n {
                        let mut rhs = if r == i { 1.0 } else { 0.0 };
                        for c in 0..r {
                            rhs -= Self::l_at(l, n, r, c) * y[c];
                        }
                        let diag = Self::l_at(l, n, r, r);
                        y[r] = if !diag.is_finite() || diag.abs() < 1e-14 { 0.0 } else { rhs / diag };
                    }
                    // Solve L^T x = y, then M e_i = x.
                    let mut x = vec![0.0; n];
                    for r in (0..n).rev() {
                        let mut rhs = y[r];
                        for c in (r + 1)..n {
                            rhs -= Self::l_at(l, n, c, r) * x[c];
                        }
                        let diag = Self::l_at(l, n, r, r);
                        x[r] = if !diag.is_finite() || diag.abs() < 1e-14 { 0.0 } else { rhs / diag };
                    }
                    out[i] = x[i].max(1e-12);
                }
                out
            }
        }
    }
}

/// HMC phase-space state: position + momentum + cached potential/gradient.
#[derive(Debug, Clone)]
pub struct HmcState {
    /// Position.
    pub q: Vec<f64>,
    /// Momentum.
    pub p: Vec<f64>,
    /// Potential energy: `-logpdf(q)`.
    pub potential: f64,
    /// Gradient of potential: `-grad(q)`.
    pub grad_potential: Vec<f64>,
}

impl HmcState {
    /// Kinetic energy: `0.5 * p^T * M^{-1} * p`.
    pub fn kinetic_energy(&self, metric: &Metric) -> f64 {
        metric.kinetic_energy(&self.p)
    }

    /// Total Hamiltonian: `H = U(q) + K(p)`.
    pub fn hamiltonian(&self, metric: &Metric) -> f64 {
        self.potential + self.kinetic_energy(metric)
    }
}

/// Leapfrog integrator for HMC.
pub struct LeapfrogIntegrator<'a, 'b, M: LogDensityModel + ?Sized> {
    posterior: &'a Posterior<'b, M>,
    step_size: f64,
    metric: Metric,
}

impl<'a, 'b, M: LogDensityModel + ?Sized> LeapfrogIntegrator<'a, 'b, M> {
    /// Create a new leapfrog integrator.
    pub fn new(posterior: &'a Posterior<'b, M>, step_size: f64, metric: Metric) -> Self {
        Self { posterior, step_size, metric }
    }

    /// Current step size.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Current metric.
    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    /// Initialize an HMC state at position `q` with zero momentum.
    pub fn init_state(&self, q: Vec<f64>) -> Result<HmcState> {
        let potential = -self.posterior.logpdf(&q)?;
        let grad_potential: Vec<f64> = self.posterior.grad(&q)?.iter().map(|&g| -g).collect();
        Ok(HmcState { p: vec![0.0; q.len()], q, potential, grad_potential })
    }

    /// Single leapfrog step with the configured step size.
    pub fn step(&self, state: &mut HmcState) -> Result<()> {
        self.step_with_eps(state, self.step_size)
    }

    /// Single leapfrog step with explicit (possibly negative) step size.
    pub fn step_with_eps(&self, state: &mut HmcState, eps: f64) -> Result<()> {
        // Half-step momentum
        for (p, &g) in state.p.iter_mut().zip(&state.grad_potential) {
            *p -= 0.5 * eps * g;
        }

        // Full-step position
        let v = self.metric.mul_inv_mass(&state.p);
        for (q, &vi) in state.q.iter_mut().zip(&v) {
            *q += eps * vi;
        }

        // Potential and gradient at the new position
        state.potential = -self.posterior.logpdf(&state.q)?;
        let grad_lp = self.posterior.grad(&state.q)?;
        for (gp, &g) in state.grad_potential.iter_mut().zip(&grad_lp) {
            *gp = -g;
        }

        // Half-step momentum
        for (p, &g) in state.p.iter_mut().zip(&state.grad_potential) {
            *p -= 0.5 * eps * g;
        }

        Ok(())
    }

    /// One leapfrog step in the given direction (`+1` forward, `-1` backward).
    pub fn step_dir(&self, state: &mut HmcState, direction: i32) -> Result<()> {
        debug_assert!(direction == 1 || direction == -1);
        self.step_with_eps(state, self.step_size * f64::from(direction))
    }

    /// `n_steps` leapfrog steps.
    pub fn integrate(&self, mut state: HmcState, n_steps: usize) -> Result<HmcState> {
        for _ in 0..n_steps {
            self.step(&mut state)?;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventObservation, LogisticBinomialModel, default_priors};
    use rand::SeedableRng;

    fn model() -> LogisticBinomialModel {
        LogisticBinomialModel::new(vec![
            EventObservation { trials: 60, successes: 40, show_count: 2.0, paid: 0.0 },
            EventObservation { trials: 90, successes: 80, show_count: 3.0, paid: 1.0 },
            EventObservation { trials: 120, successes: 100, show_count: 4.0, paid: 1.0 },
        ])
        .unwrap()
    }

    #[test]
    fn test_leapfrog_energy_conservation() {
        let m = model();
        let posterior = Posterior::new(&m).with_priors(default_priors()).unwrap();
        let metric = Metric::identity(3);
        let integrator = LeapfrogIntegrator::new(&posterior, 0.001, metric.clone());

        let mut state = integrator.init_state(vec![0.5, 0.1, 0.5]).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        state.p = metric.sample_momentum(&mut rng);

        let h_initial = state.hamiltonian(&metric);
        let state = integrator.integrate(state, 100).unwrap();
        let h_final = state.hamiltonian(&metric);

        let dh = (h_final - h_initial).abs();
        assert!(dh < 0.1, "Energy not conserved: H_init={}, H_final={}, dH={}", h_initial, h_final, dh);
    }

    #[test]
    fn test_leapfrog_is_reversible() {
        let m = model();
        let posterior = Posterior::new(&m).with_priors(default_priors()).unwrap();
        let integrator = LeapfrogIntegrator::new(&posterior, 0.01, Metric::identity(3));

        let mut state = integrator.init_state(vec![0.2, 0.2, 0.2]).unwrap();
        state.p = vec![0.3, -0.4, 0.5];
        let start = state.clone();

        for _ in 0..20 {
            integrator.step_dir(&mut state, 1).unwrap();
        }
        for _ in 0..20 {
            integrator.step_dir(&mut state, -1).unwrap();
        }
        for (a, b) in state.q.iter().zip(&start.q) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_dense_identity_matches_diag() {
        let dense = Metric::DenseCholesky { dim: 2, l: vec![1.0, 0.0, 0.0, 1.0] };
        let diag = Metric::identity(2);
        let p = [0.7, -1.3];
        assert_eq!(dense.mul_inv_mass(&p), diag.mul_inv_mass(&p));
        assert!((dense.kinetic_energy(&p) - diag.kinetic_energy(&p)).abs() < 1e-15);
    }

    #[test]
    fn test_dense_mul_inv_mass() {
        // L = [[2, 0], [1, 3]] => L L^T = [[4, 2], [2, 10]]
        let metric = Metric::DenseCholesky { dim: 2, l: vec![2.0, 0.0, 1.0, 3.0] };
        let v = metric.mul_inv_mass(&[1.0, 1.0]);
        assert!((v[0] - 6.0).abs() < 1e-12);
        assert!((v[1] - 12.0).abs() < 1e-12);

        // M = (L L^T)^{-1} = 1/36 * [[10, -2], [-2, 4]]
        let md = metric.mass_diag();
        assert!((md[0] - 10.0 / 36.0).abs() < 1e-12);
        assert!((md[1] - 4.0 / 36.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_momentum_diag_scale() {
        // inv_mass = 4 => p ~ N(0, 1/4), sd 0.5
        let metric = Metric::Diag(vec![4.0]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let draws: Vec<f64> = (0..20_000).map(|_| metric.sample_momentum(&mut rng)[0]).collect();
        let var = draws.iter().map(|x| x * x).sum::<f64>() / draws.len() as f64;
        assert!((var - 0.25).abs() < 0.02, "var={}", var);
    }
}
