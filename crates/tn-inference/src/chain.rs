//! Chain storage and multi-chain runner.

use crate::nuts::{NutsConfig, sample_nuts};
use crate::posterior::Posterior;
use tn_core::traits::LogDensityModel;
use tn_core::{Error, Result};

/// Raw MCMC chain from one NUTS run.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Post-warmup draws, one parameter vector per iteration.
    pub draws: Vec<Vec<f64>>,
    /// Divergence flag per draw.
    pub divergences: Vec<bool>,
    /// Tree depth per draw.
    pub tree_depths: Vec<usize>,
    /// Mean acceptance statistic per draw.
    pub accept_probs: Vec<f64>,
    /// Hamiltonian at the start of each transition (after momentum resampling).
    pub energies: Vec<f64>,
    /// Leapfrog steps per draw.
    pub n_leapfrog: Vec<usize>,
    /// Configured maximum tree depth.
    pub max_treedepth: usize,
    /// Final adapted step size.
    pub step_size: f64,
    /// Diagonal of the final adapted mass matrix.
    pub mass_diag: Vec<f64>,
}

impl Chain {
    /// Number of post-warmup draws.
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    /// `true` when the chain holds no draws.
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Number of divergent transitions.
    pub fn n_divergent(&self) -> usize {
        self.divergences.iter().filter(|&&d| d).count()
    }
}

/// Result of a multi-chain NUTS run.
#[derive(Debug, Clone)]
pub struct SamplerResult {
    /// Individual chains, ordered by chain id.
    pub chains: Vec<Chain>,
    /// Parameter names.
    pub param_names: Vec<String>,
    /// Warmup iterations per chain.
    pub n_warmup: usize,
    /// Post-warmup draws per chain.
    pub n_samples: usize,
}

impl SamplerResult {
    /// Total number of post-warmup draws across all chains.
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(Chain::len).sum()
    }

    /// Number of parameters.
    pub fn dim(&self) -> usize {
        self.param_names.len()
    }

    /// Index of a named parameter.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|n| n == name)
    }

    /// Draws for one parameter, per chain.
    pub fn param_draws(&self, param_idx: usize) -> Vec<Vec<f64>> {
        self.chains.iter().map(|c| c.draws.iter().map(|d| d[param_idx]).collect()).collect()
    }

    /// Draws for one parameter, all chains pooled in chain order.
    pub fn pooled_draws(&self, param_idx: usize) -> Vec<f64> {
        self.all_draws().map(|d| d[param_idx]).collect()
    }

    /// Every post-warmup parameter vector, chain by chain.
    pub fn all_draws(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.chains.iter().flat_map(|c| c.draws.iter().map(Vec::as_slice))
    }

    /// Mean of a parameter across all draws and chains.
    pub fn param_mean(&self, param_idx: usize) -> f64 {
        let n = self.total_draws();
        let sum: f64 = self.all_draws().map(|d| d[param_idx]).sum();
        sum / n as f64
    }

    /// Total divergent transitions across chains.
    pub fn n_divergent(&self) -> usize {
        self.chains.iter().map(Chain::n_divergent).sum()
    }
}

/// Run NUTS on `n_chains` independent chains in parallel via Rayon.
///
/// Chain `i` uses seed `seed + i`, so results do not depend on thread
/// scheduling.
pub fn sample_nuts_multichain<M: LogDensityModel + ?Sized>(
    posterior: &Posterior<'_, M>,
    n_chains: usize,
    n_warmup: usize,
    n_samples: usize,
    seed: u64,
    config: NutsConfig,
) -> Result<SamplerResult> {
    use rayon::prelude::*;

    if n_chains == 0 {
        return Err(Error::Validation("n_chains must be >= 1".to_string()));
    }
    tracing::info!(n_chains, n_warmup, n_samples, seed, "starting NUTS");

    let chains: Vec<Result<Chain>> = (0..n_chains)
        .into_par_iter()
        .map(|chain_id| {
            let chain_seed = seed.wrapping_add(chain_id as u64);
            let chain = sample_nuts(posterior, n_warmup, n_samples, chain_seed, config.clone())?;
            tracing::debug!(
                chain = chain_id,
                step_size = chain.step_size,
                divergent = chain.n_divergent(),
                "chain finished"
            );
            Ok(chain)
        })
        .collect();
    let chains = chains.into_iter().collect::<Result<Vec<_>>>()?;

    Ok(SamplerResult {
        chains,
        param_names: posterior.model().parameter_names(),
        n_warmup,
        n_samples,
    })
}
