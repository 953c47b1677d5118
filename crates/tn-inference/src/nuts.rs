//! No-U-Turn Sampler (NUTS).
//!
//! Multinomial NUTS with tree doubling: every leapfrog state gets weight
//! `exp(-(H - H0))`, subtrees are merged by uniform progressive sampling and
//! new top-level subtrees by biased progressive sampling, as in Stan.

use crate::adapt::{WindowedAdaptation, find_reasonable_step_size};
use crate::chain::Chain;
use crate::hmc::{HmcState, LeapfrogIntegrator, Metric};
use crate::posterior::Posterior;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tn_core::traits::LogDensityModel;
use tn_core::{Error, Result};

/// NUTS sampler configuration.
#[derive(Debug, Clone)]
pub struct NutsConfig {
    /// Maximum tree depth (default 10).
    pub max_treedepth: usize,
    /// Target acceptance statistic for step-size adaptation (default 0.8).
    pub target_accept: f64,
    /// Stddev of Normal jitter added to the initial position (0 disables).
    ///
    /// Keeps chains from starting at identical points.
    pub init_jitter: f64,
}

impl Default for NutsConfig {
    fn default() -> Self {
        Self { max_treedepth: 10, target_accept: 0.8, init_jitter: 0.5 }
    }
}

impl NutsConfig {
    /// Check ranges: `max_treedepth >= 1`, `target_accept` in (0, 1), finite jitter >= 0.
    pub fn validate(&self) -> Result<()> {
        if self.max_treedepth == 0 {
            return Err(Error::Validation("max_treedepth must be >= 1".to_string()));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(Error::Validation(format!(
                "target_accept must be in (0, 1), got {}",
                self.target_accept
            )));
        }
        if !self.init_jitter.is_finite() || self.init_jitter < 0.0 {
            return Err(Error::Validation(format!(
                "init_jitter must be finite and >= 0, got {}",
                self.init_jitter
            )));
        }
        Ok(())
    }
}

/// Result of one NUTS transition.
pub(crate) struct NutsTransition {
    pub q: Vec<f64>,
    pub potential: f64,
    pub grad_potential: Vec<f64>,
    pub depth: usize,
    pub divergent: bool,
    pub accept_prob: f64,
    pub energy: f64,
    pub n_leapfrog: usize,
}

/// Trajectory segment built during tree doubling.
struct NutsTree {
    left: HmcState,
    right: HmcState,
    proposal: HmcState,
    log_sum_weight: f64,
    n_leapfrog: usize,
    divergent: bool,
    turning: bool,
    sum_accept_prob: f64,
}

/// Energy error beyond which a trajectory is declared divergent.
const DIVERGENCE_THRESHOLD: f64 = 1000.0;

/// No-U-turn criterion on the trajectory endpoints.
fn is_turning(left: &HmcState, right: &HmcState, metric: &Metric) -> bool {
    let dq: Vec<f64> = right.q.iter().zip(&left.q).map(|(&r, &l)| r - l).collect();
    let v_left = metric.mul_inv_mass(&left.p);
    let v_right = metric.mul_inv_mass(&right.p);
    let dot_left: f64 = dq.iter().zip(&v_left).map(|(&d, &v)| d * v).sum();
    let dot_right: f64 = dq.iter().zip(&v_right).map(|(&d, &v)| d * v).sum();
    dot_left < 0.0 || dot_right < 0.0
}

fn log_sum_exp(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY { f64::NEG_INFINITY } else { max + ((a - max).exp() + (b - max).exp()).ln() }
}

/// One leapfrog step from `state`.
fn build_leaf<M: LogDensityModel + ?Sized>(
    integrator: &LeapfrogIntegrator<'_, '_, M>,
    state: &HmcState,
    direction: i32,
    h0: f64,
) -> Result<NutsTree> {
    let mut next = state.clone();
    integrator.step_dir(&mut next, direction)?;

    let h = next.hamiltonian(integrator.metric());
    let energy_error = h - h0;
    let divergent = !h.is_finite() || energy_error > DIVERGENCE_THRESHOLD;
    let (log_weight, accept_prob) = if h.is_finite() {
        (-energy_error, (-energy_error).exp().min(1.0))
    } else {
        (f64::NEG_INFINITY, 0.0)
    };

    Ok(NutsTree {
        left: next.clone(),
        right: next.clone(),
        proposal: next,
        log_sum_weight: log_weight,
        n_leapfrog: 1,
        divergent,
        turning: false,
        sum_accept_prob: accept_prob,
    })
}

/// Recursively build a balanced subtree of `2^depth` leapfrog steps.
fn build_tree<M: LogDensityModel + ?Sized>(
    integrator: &LeapfrogIntegrator<'_, '_, M>,
    state: &HmcState,
    depth: usize,
    direction: i32,
    h0: f64,
    rng: &mut impl Rng,
) -> Result<NutsTree> {
    if depth == 0 {
        return build_leaf(integrator, state, direction, h0);
    }

    let mut inner = build_tree(integrator, state, depth - 1, direction, h0, rng)?;
    if inner.divergent || inner.turning {
        return Ok(inner);
    }

    let edge = if direction > 0 { &inner.right } else { &inner.left };
    let outer = build_tree(integrator, edge, depth - 1, direction, h0, rng)?;

    inner.n_leapfrog += outer.n_leapfrog;
    inner.sum_accept_prob += outer.sum_accept_prob;
    inner.divergent |= outer.divergent;
    inner.turning |= outer.turning;
    if inner.divergent || inner.turning {
        return Ok(inner);
    }

    // Uniform progressive sampling within the subtree.
    let new_log_sum_weight = log_sum_exp(inner.log_sum_weight, outer.log_sum_weight);
    let accept_outer = (outer.log_sum_weight - new_log_sum_weight).exp();
    if rng.random::<f64>() < accept_outer {
        inner.proposal = outer.proposal;
    }
    inner.log_sum_weight = new_log_sum_weight;

    if direction > 0 {
        inner.right = outer.right;
    } else {
        inner.left = outer.left;
    }
    inner.turning = is_turning(&inner.left, &inner.right, integrator.metric());
    Ok(inner)
}

/// Run one NUTS transition from `current`.
pub(crate) fn nuts_transition<M: LogDensityModel + ?Sized>(
    integrator: &LeapfrogIntegrator<'_, '_, M>,
    current: &HmcState,
    max_treedepth: usize,
    rng: &mut impl Rng,
) -> Result<NutsTransition> {
    let mut start = current.clone();
    start.p = integrator.metric().sample_momentum(rng);
    let h0 = start.hamiltonian(integrator.metric());

    let mut tree = NutsTree {
        left: start.clone(),
        right: start.clone(),
        proposal: start,
        log_sum_weight: 0.0,
        n_leapfrog: 0,
        divergent: false,
        turning: false,
        sum_accept_prob: 0.0,
    };

    // Depth counts doublings performed, so a single leapfrog step is depth 1.
    let mut depth = 0;
    while depth < max_treedepth {
        let direction: i32 = if rng.random::<bool>() { 1 } else { -1 };
        let edge = if direction > 0 { &tree.right } else { &tree.left };
        let subtree = build_tree(integrator, edge, depth, direction, h0, rng)?;
        depth += 1;

        tree.n_leapfrog += subtree.n_leapfrog;
        tree.sum_accept_prob += subtree.sum_accept_prob;

        if subtree.divergent {
            tree.divergent = true;
            break;
        }
        if subtree.turning {
            break;
        }

        // Biased progressive sampling favours the newer subtree.
        let accept_subtree = (subtree.log_sum_weight - tree.log_sum_weight).exp().min(1.0);
        if rng.random::<f64>() < accept_subtree {
            tree.proposal = subtree.proposal;
        }
        tree.log_sum_weight = log_sum_exp(tree.log_sum_weight, subtree.log_sum_weight);

        if direction > 0 {
            tree.right = subtree.right;
        } else {
            tree.left = subtree.left;
        }
        if is_turning(&tree.left, &tree.right, integrator.metric()) {
            tree.turning = true;
            break;
        }
    }

    let accept_prob = tree.sum_accept_prob / tree.n_leapfrog.max(1) as f64;

    Ok(NutsTransition {
        q: tree.proposal.q,
        potential: tree.proposal.potential,
        grad_potential: tree.proposal.grad_potential,
        depth,
        divergent: tree.divergent,
        accept_prob,
        energy: h0,
        n_leapfrog: tree.n_leapfrog,
    })
}

/// Draw the starting point: the model's init plus optional Normal jitter.
fn initial_position<M: LogDensityModel + ?Sized>(
    posterior: &Posterior<'_, M>,
    jitter: f64,
    rng: &mut impl Rng,
) -> Result<Vec<f64>> {
    let init = posterior.model().parameter_init();
    if jitter <= 0.0 {
        return Ok(init);
    }
    let normal = Normal::new(0.0, jitter)
        .map_err(|e| Error::Validation(format!("invalid init_jitter {}: {}", jitter, e)))?;
    Ok(init.into_iter().map(|x| x + normal.sample(rng)).collect())
}

/// Run one NUTS chain on a posterior.
///
/// Warmup transitions adapt the step size and metric and are discarded;
/// the returned chain holds `n_samples` post-warmup draws. Identical
/// arguments yield identical draws.
pub fn sample_nuts<M: LogDensityModel + ?Sized>(
    posterior: &Posterior<'_, M>,
    n_warmup: usize,
    n_samples: usize,
    seed: u64,
    config: NutsConfig,
) -> Result<Chain> {
    config.validate()?;
    if n_samples == 0 {
        return Err(Error::Validation("n_samples must be >= 1".to_string()));
    }

    let dim = posterior.dim();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let q_init = initial_position(posterior, config.init_jitter, &mut rng)?;
    let init_lp = posterior.logpdf(&q_init)?;
    if !init_lp.is_finite() {
        return Err(Error::Computation(format!(
            "log-posterior is not finite at the initial point (seed {})",
            seed
        )));
    }

    let identity = Metric::identity(dim);
    let init_eps = find_reasonable_step_size(posterior, &q_init, &identity);
    tracing::debug!(seed, init_eps, "initial step size");

    let mut adaptation = WindowedAdaptation::new(dim, n_warmup, config.target_accept, init_eps);
    let mut state = LeapfrogIntegrator::new(posterior, init_eps, identity).init_state(q_init)?;

    for i in 0..n_warmup {
        let integrator =
            LeapfrogIntegrator::new(posterior, adaptation.step_size(), adaptation.metric().clone());
        let transition = nuts_transition(&integrator, &state, config.max_treedepth, &mut rng)?;

        state.q = transition.q;
        state.potential = transition.potential;
        state.grad_potential = transition.grad_potential;

        adaptation.update(i, &state.q, transition.accept_prob);
    }

    let step_size = if n_warmup > 0 { adaptation.adapted_step_size() } else { init_eps };
    let metric = adaptation.metric().clone();
    let integrator = LeapfrogIntegrator::new(posterior, step_size, metric.clone());
    tracing::debug!(seed, step_size, "warmup finished");

    let mut draws = Vec::with_capacity(n_samples);
    let mut divergences = Vec::with_capacity(n_samples);
    let mut tree_depths = Vec::with_capacity(n_samples);
    let mut accept_probs = Vec::with_capacity(n_samples);
    let mut energies = Vec::with_capacity(n_samples);
    let mut n_leapfrog = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let transition = nuts_transition(&integrator, &state, config.max_treedepth, &mut rng)?;

        state.q = transition.q;
        state.potential = transition.potential;
        state.grad_potential = transition.grad_potential;

        draws.push(state.q.clone());
        divergences.push(transition.divergent);
        tree_depths.push(transition.depth);
        accept_probs.push(transition.accept_prob);
        energies.push(transition.energy);
        n_leapfrog.push(transition.n_leapfrog);
    }

    Ok(Chain {
        draws,
        divergences,
        tree_depths,
        accept_probs,
        energies,
        n_leapfrog,
        max_treedepth: config.max_treedepth,
        step_size,
        mass_diag: metric.mass_diag(),
    })
}
