//! Per-coefficient posterior summary table.

use std::fmt;

use crate::chain::SamplerResult;
use crate::diagnostics::DiagnosticsResult;
use crate::hdi::hdi;
use serde::Serialize;
use tn_core::{Error, Result};

/// Summary statistics of one parameter's pooled draws.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSummary {
    /// Parameter name.
    pub name: String,
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation (ddof = 1).
    pub sd: f64,
    /// HDI lower bound.
    pub hdi_lower: f64,
    /// HDI upper bound.
    pub hdi_upper: f64,
    /// Monte Carlo standard error of the mean.
    pub mcse_mean: f64,
    /// Bulk effective sample size.
    pub ess_bulk: f64,
    /// Tail effective sample size.
    pub ess_tail: f64,
    /// Rank-normalized folded split R-hat.
    pub r_hat: f64,
}

/// Summary table over all parameters.
#[derive(Debug, Clone, Serialize)]
pub struct PosteriorSummary {
    /// Rows in parameter order.
    pub params: Vec<ParamSummary>,
    /// Probability mass of the reported HDI.
    pub hdi_prob: f64,
}

impl PosteriorSummary {
    /// Row for a named parameter.
    pub fn get(&self, name: &str) -> Option<&ParamSummary> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Column labels of the HDI bounds, e.g. `hdi_3%` / `hdi_97%` for 0.94.
    pub fn hdi_labels(&self) -> (String, String) {
        let tail = (1.0 - self.hdi_prob) / 2.0 * 100.0;
        (format!("hdi_{}%", format_pct(tail)), format!("hdi_{}%", format_pct(100.0 - tail)))
    }
}

fn format_pct(pct: f64) -> String {
    let rounded = (pct * 10.0).round() / 10.0;
    if (rounded - rounded.round()).abs() < 1e-9 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

fn mean_sd(xs: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let sd = if xs.len() > 1 {
        (xs.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };
    (mean, sd)
}

/// Build the summary table from pooled draws and precomputed diagnostics.
pub fn summarize(
    result: &SamplerResult,
    diagnostics: &DiagnosticsResult,
    hdi_prob: f64,
) -> Result<PosteriorSummary> {
    if result.total_draws() == 0 {
        return Err(Error::Validation("cannot summarize an empty sampler result".to_string()));
    }
    if diagnostics.r_hat.len() != result.dim() {
        return Err(Error::Validation(format!(
            "diagnostics cover {} parameters, sampler result has {}",
            diagnostics.r_hat.len(),
            result.dim()
        )));
    }

    let params = result
        .param_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let draws = result.pooled_draws(i);
            let (mean, sd) = mean_sd(&draws);
            let (hdi_lower, hdi_upper) = hdi(&draws, hdi_prob)?;
            let ess_mean = diagnostics.ess_mean[i];
            Ok(ParamSummary {
                name: name.clone(),
                mean,
                sd,
                hdi_lower,
                hdi_upper,
                mcse_mean: if ess_mean > 0.0 { sd / ess_mean.sqrt() } else { f64::NAN },
                ess_bulk: diagnostics.ess_bulk[i],
                ess_tail: diagnostics.ess_tail[i],
                r_hat: diagnostics.r_hat[i],
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PosteriorSummary { params, hdi_prob })
}

impl fmt::Display for PosteriorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo_label, hi_label) = self.hdi_labels();
        let name_w = self.params.iter().map(|p| p.name.len()).max().unwrap_or(0);

        write!(f, "{:name_w$}", "")?;
        for h in ["mean", "sd", lo_label.as_str(), hi_label.as_str(), "mcse_mean", "ess_bulk", "ess_tail", "r_hat"] {
            write!(f, "  {:>9}", h)?;
        }
        writeln!(f)?;

        for p in &self.params {
            writeln!(
                f,
                "{:<name_w$}  {:>9.3}  {:>9.3}  {:>9.3}  {:>9.3}  {:>9.3}  {:>9.0}  {:>9.0}  {:>9.2}",
                p.name,
                p.mean,
                p.sd,
                p.hdi_lower,
                p.hdi_upper,
                p.mcse_mean,
                p.ess_bulk,
                p.ess_tail,
                p.r_hat
            )?;
        }
        Ok(())
    }
}
