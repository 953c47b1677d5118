//! MCMC diagnostics.
//!
//! - split R-hat, and its rank-normalized folded variant (Vehtari et al. 2021)
//! - bulk and tail effective sample size (Geyer initial monotone sequence)
//! - divergence and max-treedepth rates, E-BFMI per chain
//! - a coarse ok/warn/fail quality summary over all of the above

use std::cmp::Ordering;
use std::fmt;

use crate::chain::SamplerResult;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use tn_data::describe::quantile_sorted;

/// Diagnostics for a multi-chain NUTS run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsResult {
    /// Rank-normalized folded split R-hat per parameter.
    pub r_hat: Vec<f64>,
    /// Bulk ESS (rank-normalized) per parameter.
    pub ess_bulk: Vec<f64>,
    /// Tail ESS (5% / 95% quantile indicators) per parameter.
    pub ess_tail: Vec<f64>,
    /// ESS of the raw draws per parameter; used for the MCSE of the mean.
    pub ess_mean: Vec<f64>,
    /// Fraction of divergent transitions.
    pub divergence_rate: f64,
    /// Fraction of transitions that hit the maximum tree depth.
    pub max_treedepth_rate: f64,
    /// E-BFMI per chain.
    pub ebfmi: Vec<f64>,
}

/// Overall sampling quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    /// Every gate passed.
    Ok,
    /// Some gates raised warnings.
    Warn,
    /// At least one gate failed.
    Fail,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityStatus::Ok => "ok",
            QualityStatus::Warn => "warn",
            QualityStatus::Fail => "fail",
        })
    }
}

/// Thresholds for the quality gates.
///
/// Sampling problems are reported, never fatal: the caller decides what to
/// do with a `Fail`.
#[derive(Debug, Clone)]
pub struct QualityGates {
    /// R-hat/ESS/E-BFMI gates need at least this many chains.
    pub min_chains: usize,
    /// R-hat/ESS/E-BFMI gates need at least this many draws per chain.
    pub min_draws_per_chain: usize,
    /// Divergence rate above which to warn.
    pub max_divergence_rate_warn: f64,
    /// Divergence rate above which to fail.
    pub max_divergence_rate_fail: f64,
    /// Max-treedepth rate above which to warn.
    pub max_treedepth_rate_warn: f64,
    /// Max-treedepth rate above which to fail.
    pub max_treedepth_rate_fail: f64,
    /// R-hat above which to warn.
    pub max_rhat_warn: f64,
    /// R-hat above which to fail.
    pub max_rhat_fail: f64,
    /// Minimum ESS as a fraction of total draws before warning.
    pub min_ess_frac_warn: f64,
    /// Minimum ESS as a fraction of total draws before failing.
    pub min_ess_frac_fail: f64,
    /// E-BFMI below which to warn.
    pub min_ebfmi_warn: f64,
    /// E-BFMI below which to fail.
    pub min_ebfmi_fail: f64,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            min_chains: 2,
            min_draws_per_chain: 50,
            max_divergence_rate_warn: 0.0,
            max_divergence_rate_fail: 0.05,
            max_treedepth_rate_warn: 0.01,
            max_treedepth_rate_fail: 0.10,
            max_rhat_warn: 1.01,
            max_rhat_fail: 1.10,
            min_ess_frac_warn: 0.10,
            min_ess_frac_fail: 0.01,
            min_ebfmi_warn: 0.30,
            min_ebfmi_fail: 0.20,
        }
    }
}

/// Outcome of [`quality_summary`].
#[derive(Debug, Clone, Serialize)]
pub struct QualitySummary {
    /// Aggregated status.
    pub status: QualityStatus,
    /// Human-readable warnings.
    pub warnings: Vec<String>,
    /// Human-readable failures.
    pub failures: Vec<String>,
    /// Whether the R-hat/ESS/E-BFMI gates ran (long enough run).
    pub enabled: bool,
    /// Total post-warmup draws.
    pub total_draws: usize,
    /// Largest R-hat across parameters.
    pub max_r_hat: f64,
    /// Smallest bulk ESS across parameters.
    pub min_ess_bulk: f64,
    /// Smallest tail ESS across parameters.
    pub min_ess_tail: f64,
    /// Smallest E-BFMI across chains.
    pub min_ebfmi: f64,
}

fn finite_max(values: &[f64]) -> f64 {
    values.iter().copied().filter(|v| v.is_finite()).fold(f64::NAN, f64::max)
}

fn finite_min(values: &[f64]) -> f64 {
    values.iter().copied().filter(|v| v.is_finite()).fold(f64::NAN, f64::min)
}

struct Gate<'a> {
    warnings: &'a mut Vec<String>,
    failures: &'a mut Vec<String>,
}

impl Gate<'_> {
    fn upper(&mut self, what: &str, value: f64, warn: f64, fail: f64) {
        if value > fail {
            self.failures.push(format!("{} {:.4} exceeds {}", what, value, fail));
        } else if value > warn {
            self.warnings.push(format!("{} {:.4} exceeds {}", what, value, warn));
        }
    }

    fn lower(&mut self, what: &str, value: f64, warn: f64, fail: f64) {
        if value < fail {
            self.failures.push(format!("{} {:.4} below {}", what, value, fail));
        } else if value < warn {
            self.warnings.push(format!("{} {:.4} below {}", what, value, warn));
        }
    }
}

/// Apply the quality gates to a diagnostics result.
pub fn quality_summary(
    diag: &DiagnosticsResult,
    n_chains: usize,
    n_samples: usize,
    gates: &QualityGates,
) -> QualitySummary {
    let total_draws = n_chains.saturating_mul(n_samples);
    let enabled = n_chains >= gates.min_chains && n_samples >= gates.min_draws_per_chain;

    // NaN max/min means no finite value was available.
    let max_r_hat = finite_max(&diag.r_hat);
    let min_ess_bulk = finite_min(&diag.ess_bulk);
    let min_ess_tail = finite_min(&diag.ess_tail);
    let min_ebfmi = finite_min(&diag.ebfmi);

    let mut warnings = Vec::new();
    let mut failures = Vec::new();
    let mut gate = Gate { warnings: &mut warnings, failures: &mut failures };

    gate.upper(
        "divergence rate",
        diag.divergence_rate,
        gates.max_divergence_rate_warn,
        gates.max_divergence_rate_fail,
    );
    gate.upper(
        "max-treedepth rate",
        diag.max_treedepth_rate,
        gates.max_treedepth_rate_warn,
        gates.max_treedepth_rate_fail,
    );

    if enabled {
        if max_r_hat.is_nan() {
            gate.failures.push("R-hat unavailable".to_string());
        } else {
            gate.upper("R-hat", max_r_hat, gates.max_rhat_warn, gates.max_rhat_fail);
        }

        let n = total_draws as f64;
        gate.lower(
            "bulk ESS",
            min_ess_bulk,
            gates.min_ess_frac_warn * n,
            gates.min_ess_frac_fail * n,
        );
        gate.lower(
            "tail ESS",
            min_ess_tail,
            gates.min_ess_frac_warn * n,
            gates.min_ess_frac_fail * n,
        );

        if min_ebfmi.is_nan() {
            gate.warnings.push("E-BFMI unavailable".to_string());
        } else {
            gate.lower("E-BFMI", min_ebfmi, gates.min_ebfmi_warn, gates.min_ebfmi_fail);
        }
    } else {
        gate.warnings.push(format!(
            "run too short for convergence gates ({} chains x {} draws)",
            n_chains, n_samples
        ));
    }

    let status = if !failures.is_empty() {
        QualityStatus::Fail
    } else if !warnings.is_empty() {
        QualityStatus::Warn
    } else {
        QualityStatus::Ok
    };

    QualitySummary {
        status,
        warnings,
        failures,
        enabled,
        total_draws,
        max_r_hat,
        min_ess_bulk,
        min_ess_tail,
        min_ebfmi,
    }
}

/// Split each chain in half and truncate to a common length of at least `min_len`.
fn split_halves<'a>(chains: &[&'a [f64]], min_len: usize) -> Option<Vec<&'a [f64]>> {
    if chains.is_empty() {
        return None;
    }
    let mut halves = Vec::with_capacity(chains.len() * 2);
    for c in chains {
        let mid = c.len() / 2;
        halves.push(&c[..mid]);
        halves.push(&c[mid..]);
    }
    let len = halves.iter().map(|c| c.len()).min().unwrap_or(0);
    if len < min_len {
        return None;
    }
    Some(halves.into_iter().map(|c| &c[..len]).collect())
}

fn mean_and_var(chain: &[f64]) -> (f64, f64) {
    let n = chain.len() as f64;
    let mean = chain.iter().sum::<f64>() / n;
    let var = chain.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
    (mean, var)
}

/// Within-chain variance `W` and marginal variance estimate `var+`.
fn variance_components(chains: &[&[f64]]) -> (f64, f64) {
    let m = chains.len() as f64;
    let n = chains[0].len() as f64;
    let stats: Vec<(f64, f64)> = chains.iter().map(|c| mean_and_var(c)).collect();
    let grand_mean = stats.iter().map(|s| s.0).sum::<f64>() / m;
    let b = if m > 1.0 {
        stats.iter().map(|s| (s.0 - grand_mean).powi(2)).sum::<f64>() * n / (m - 1.0)
    } else {
        0.0
    };
    let w = stats.iter().map(|s| s.1).sum::<f64>() / m;
    (w, (n - 1.0) / n * w + b / n)
}

/// Split R-hat for one parameter: `sqrt(var+ / W)` over `2M` half-chains.
///
/// NaN when chains are shorter than 4 draws or have no variance.
pub fn r_hat(chains: &[&[f64]]) -> f64 {
    let halves = match split_halves(chains, 2) {
        Some(h) => h,
        None => return f64::NAN,
    };
    let (w, var_plus) = variance_components(&halves);
    if w < 1e-30 {
        return f64::NAN;
    }
    (var_plus / w).sqrt()
}

fn sort_nan_last(v: &mut [f64]) {
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Greater));
}

/// Replace every draw with the normal quantile of its pooled average rank.
fn rank_normalize(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let normal = Normal::standard();
    let mut out: Vec<Vec<f64>> = chains.iter().map(|c| vec![0.0; c.len()]).collect();

    let mut flat: Vec<(f64, usize, usize)> = chains
        .iter()
        .enumerate()
        .flat_map(|(ci, c)| c.iter().enumerate().map(move |(ti, &x)| (x, ci, ti)))
        .collect();
    flat.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Greater));

    let n = flat.len();
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && flat[j].0 == flat[i].0 {
            j += 1;
        }
        // Average 1-based rank of the tie group, offset by 3/8 (Blom).
        let rank = 0.5 * ((i + 1) as f64 + j as f64);
        let p = ((rank - 0.375) / (n as f64 + 0.25)).clamp(1e-12, 1.0 - 1e-12);
        let z = normal.inverse_cdf(p);
        for &(_, ci, ti) in &flat[i..j] {
            out[ci][ti] = z;
        }
        i = j;
    }
    out
}

fn as_refs(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    chains.iter().map(Vec::as_slice).collect()
}

/// Rank-normalized split R-hat, maximised with its folded (|x - median|) variant.
pub fn r_hat_rank_normalized_folded(chains: &[Vec<f64>]) -> f64 {
    if chains.is_empty() || chains.iter().any(|c| c.len() < 4) {
        return f64::NAN;
    }
    let r_bulk = r_hat(&as_refs(&rank_normalize(chains)));

    let mut pooled: Vec<f64> = chains.iter().flatten().copied().collect();
    sort_nan_last(&mut pooled);
    let median = quantile_sorted(&pooled, 0.5);
    let folded: Vec<Vec<f64>> =
        chains.iter().map(|c| c.iter().map(|&x| (x - median).abs()).collect()).collect();
    let r_fold = r_hat(&as_refs(&rank_normalize(&folded)));

    r_bulk.max(r_fold)
}

/// Effective sample size of the given chains.
///
/// Autocorrelations come from the multi-chain variogram
/// `rho_t = 1 - V_t / (2 var+)` and are truncated with Geyer's initial
/// monotone sequence. Returns the total draw count for zero-variance input
/// and 0 when chains are too short.
pub fn ess(chains: &[&[f64]]) -> f64 {
    let halves = match split_halves(chains, 4) {
        Some(h) => h,
        None => return 0.0,
    };
    let m = halves.len();
    let n = halves[0].len();
    let total = (m * n) as f64;

    let (_, var_plus) = variance_components(&halves);
    if !var_plus.is_finite() || var_plus < 1e-30 {
        return total;
    }

    let rho_at = |lag: usize| -> f64 {
        let mut sum = 0.0;
        for c in &halves {
            sum += c.windows(lag + 1).map(|w| (w[0] - w[lag]).powi(2)).sum::<f64>();
        }
        let v = sum / (m * (n - lag)) as f64;
        (1.0 - v / (2.0 * var_plus)).clamp(-1.0, 1.0)
    };

    // Paired sums Gamma_k = rho_{2k} + rho_{2k+1}, starting at rho_0 = 1.
    let mut tau = -1.0;
    let mut prev_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let r0 = if lag == 0 { 1.0 } else { rho_at(lag) };
        let pair = r0 + rho_at(lag + 1);
        if pair < 0.0 {
            break;
        }
        let pair = pair.min(prev_pair);
        tau += 2.0 * pair;
        prev_pair = pair;
        lag += 2;
    }

    if !tau.is_finite() || tau <= 0.0 {
        return total;
    }
    // Antithetic chains can exceed the draw count; cap at N log10(N).
    (total / tau).max(1.0).min(total * total.log10().max(1.0))
}

/// Bulk ESS: [`ess`] on rank-normalized draws.
pub fn ess_bulk(chains: &[Vec<f64>]) -> f64 {
    ess(&as_refs(&rank_normalize(chains)))
}

/// Tail ESS: `min(ESS(I[x <= q05]), ESS(I[x >= q95]))`.
pub fn ess_tail(chains: &[Vec<f64>]) -> f64 {
    let mut pooled: Vec<f64> = chains.iter().flatten().copied().collect();
    if pooled.is_empty() {
        return 0.0;
    }
    sort_nan_last(&mut pooled);
    let q05 = quantile_sorted(&pooled, 0.05);
    let q95 = quantile_sorted(&pooled, 0.95);

    let indicator = |pred: &dyn Fn(f64) -> bool| -> Vec<Vec<f64>> {
        chains
            .iter()
            .map(|c| c.iter().map(|&x| if pred(x) { 1.0 } else { 0.0 }).collect())
            .collect()
    };
    let lower = indicator(&|x| x <= q05);
    let upper = indicator(&|x| x >= q95);

    ess(&as_refs(&lower)).min(ess(&as_refs(&upper)))
}

/// E-BFMI of one chain: `mean((E_t - E_{t-1})^2) / var(E)`.
pub fn ebfmi(energies: &[f64]) -> f64 {
    let n = energies.len();
    if n < 4 {
        return f64::NAN;
    }
    let (_, var) = mean_and_var(energies);
    if var < 1e-30 {
        return f64::NAN;
    }
    let msd = energies.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum::<f64>() / (n - 1) as f64;
    msd / var
}

/// Compute all diagnostics for a sampler run.
pub fn compute_diagnostics(result: &SamplerResult) -> DiagnosticsResult {
    let n_params = result.dim();
    let mut r_hat_vals = Vec::with_capacity(n_params);
    let mut ess_bulk_vals = Vec::with_capacity(n_params);
    let mut ess_tail_vals = Vec::with_capacity(n_params);
    let mut ess_mean_vals = Vec::with_capacity(n_params);

    for p in 0..n_params {
        let draws = result.param_draws(p);
        r_hat_vals.push(r_hat_rank_normalized_folded(&draws));
        ess_bulk_vals.push(ess_bulk(&draws));
        ess_tail_vals.push(ess_tail(&draws));
        ess_mean_vals.push(ess(&as_refs(&draws)));
    }

    let total = result.total_draws();
    let rate = |count: usize| if total > 0 { count as f64 / total as f64 } else { 0.0 };

    let n_max_depth: usize = result
        .chains
        .iter()
        .map(|c| c.tree_depths.iter().filter(|&&d| d >= c.max_treedepth).count())
        .sum();

    DiagnosticsResult {
        r_hat: r_hat_vals,
        ess_bulk: ess_bulk_vals,
        ess_tail: ess_tail_vals,
        ess_mean: ess_mean_vals,
        divergence_rate: rate(result.n_divergent()),
        max_treedepth_rate: rate(n_max_depth),
        ebfmi: result.chains.iter().map(|c| ebfmi(&c.energies)).collect(),
    }
}
