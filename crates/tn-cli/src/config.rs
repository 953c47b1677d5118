//! Run configuration: defaults, optional JSON file, command-line overrides.
//!
//! Resolved once in `main` and passed down; nothing below reads the
//! environment or the working directory on its own.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tn_data::PaidPolicy;
use tn_inference::{NutsConfig, Scenario};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Show-level CSV.
    pub input: PathBuf,
    /// Existing directory receiving `histogram.png`, `pymc_summary.txt`, `summary.json`.
    pub output_dir: PathBuf,
    pub paid_policy: PaidPolicy,
    pub sampler: SamplerConfig,
    pub scenario: Scenario,
    pub hdi_prob: f64,
    pub histogram_bins: usize,
    pub histogram_dpi: u32,
    /// Rows of the aggregated table shown in the preview.
    pub head_rows: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/past_events.csv"),
            output_dir: PathBuf::from("outputs"),
            paid_policy: PaidPolicy::default(),
            sampler: SamplerConfig::default(),
            scenario: Scenario::default(),
            hdi_prob: 0.94,
            histogram_bins: 10,
            histogram_dpi: 100,
            head_rows: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    pub n_chains: usize,
    pub n_warmup: usize,
    pub n_samples: usize,
    pub seed: u64,
    pub max_treedepth: usize,
    pub target_accept: f64,
    pub init_jitter: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        let nuts = NutsConfig::default();
        Self {
            n_chains: 2,
            n_warmup: 1000,
            n_samples: 5000,
            seed: 42,
            max_treedepth: nuts.max_treedepth,
            target_accept: nuts.target_accept,
            init_jitter: nuts.init_jitter,
        }
    }
}

impl SamplerConfig {
    pub fn nuts(&self) -> NutsConfig {
        NutsConfig {
            max_treedepth: self.max_treedepth,
            target_accept: self.target_accept,
            init_jitter: self.init_jitter,
        }
    }
}

/// Values given on the command line; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub paid_policy: Option<PaidPolicy>,
    pub chains: Option<usize>,
    pub warmup: Option<usize>,
    pub samples: Option<usize>,
    pub seed: Option<u64>,
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Defaults, then the optional config file, then command-line overrides.
    pub fn resolve(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut cfg = match config_path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        cfg.apply(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.input {
            self.input = v;
        }
        if let Some(v) = o.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = o.paid_policy {
            self.paid_policy = v;
        }
        if let Some(v) = o.chains {
            self.sampler.n_chains = v;
        }
        if let Some(v) = o.warmup {
            self.sampler.n_warmup = v;
        }
        if let Some(v) = o.samples {
            self.sampler.n_samples = v;
        }
        if let Some(v) = o.seed {
            self.sampler.seed = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.hdi_prob > 0.0 && self.hdi_prob < 1.0) {
            bail!("hdi_prob must be in (0, 1), got {}", self.hdi_prob);
        }
        if self.sampler.n_chains == 0 {
            bail!("sampler.n_chains must be >= 1");
        }
        if self.sampler.n_samples == 0 {
            bail!("sampler.n_samples must be >= 1");
        }
        if self.histogram_bins == 0 {
            bail!("histogram_bins must be >= 1");
        }
        if self.histogram_dpi == 0 {
            bail!("histogram_dpi must be >= 1");
        }
        self.sampler.nuts().validate()?;
        self.scenario.validate()?;
        Ok(())
    }

    pub fn histogram_path(&self) -> PathBuf {
        self.output_dir.join("histogram.png")
    }

    pub fn summary_text_path(&self) -> PathBuf {
        self.output_dir.join("pymc_summary.txt")
    }

    pub fn summary_json_path(&self) -> PathBuf {
        self.output_dir.join("summary.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let c = RunConfig::default();
        assert_eq!(c.sampler.n_chains, 2);
        assert_eq!(c.sampler.n_warmup, 1000);
        assert_eq!(c.sampler.n_samples, 5000);
        assert_eq!(c.sampler.seed, 42);
        assert_eq!(c.hdi_prob, 0.94);
        assert_eq!(c.scenario.total_capacity(), 152.0);
        assert_eq!(c.summary_text_path(), PathBuf::from("outputs/pymc_summary.txt"));
        c.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: RunConfig = serde_json::from_str(
            r#"{"sampler": {"n_samples": 200}, "scenario": {"show_count": 3}, "paid_policy": "majority"}"#,
        )
        .unwrap();
        assert_eq!(c.sampler.n_samples, 200);
        assert_eq!(c.sampler.n_warmup, 1000);
        assert_eq!(c.scenario.show_count, 3);
        assert_eq!(c.scenario.capacity_per_show, 38.0);
        assert_eq!(c.paid_policy, PaidPolicy::Majority);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(serde_json::from_str::<RunConfig>(r#"{"n_samples": 10}"#).is_err());
    }

    #[test]
    fn overrides_win() {
        let mut c = RunConfig::default();
        c.apply(Overrides {
            chains: Some(4),
            seed: Some(7),
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        });
        assert_eq!(c.sampler.n_chains, 4);
        assert_eq!(c.sampler.seed, 7);
        assert_eq!(c.sampler.n_samples, 5000);
        assert_eq!(c.histogram_path(), PathBuf::from("/tmp/out/histogram.png"));
    }

    #[test]
    fn invalid_values_rejected() {
        let mut c = RunConfig { hdi_prob: 1.0, ..Default::default() };
        assert!(c.validate().is_err());
        c.hdi_prob = 0.94;
        c.sampler.n_chains = 0;
        assert!(c.validate().is_err());
        c.sampler.n_chains = 2;
        c.sampler.target_accept = 1.5;
        assert!(c.validate().is_err());
        c.sampler.target_accept = 0.8;
        c.scenario.show_count = 0;
        assert!(c.validate().is_err());
    }
}
