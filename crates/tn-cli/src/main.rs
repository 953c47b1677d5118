//! turnout CLI

mod config;
mod report;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tn_data::PaidPolicy;

use config::{Overrides, RunConfig};

#[derive(Parser)]
#[command(name = "turnout")]
#[command(about = "Turnout - attendance forecasting from past event records")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate, fit the model, forecast and write the output artifacts
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Directory for histogram.png, pymc_summary.txt and summary.json (must exist)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of chains
        #[arg(long)]
        chains: Option<usize>,

        /// Warmup (tuning) iterations per chain
        #[arg(long)]
        warmup: Option<usize>,

        /// Retained draws per chain
        #[arg(long)]
        samples: Option<usize>,

        /// Random seed; chain i uses seed + i
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Aggregate the input and print the event table preview only
    Aggregate {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Print version information
    Version,
}

#[derive(clap::Args)]
struct DataArgs {
    /// Show-level CSV (default: data/past_events.csv)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// JSON run configuration; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How an event with some paid shows is classified
    #[arg(long, value_enum)]
    paid_policy: Option<PolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Paid only if every show was paid
    AllShows,
    /// Paid if more than half of the shows were paid
    Majority,
}

impl From<PolicyArg> for PaidPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::AllShows => PaidPolicy::AllShows,
            PolicyArg::Majority => PaidPolicy::Majority,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { data, output_dir, chains, warmup, samples, seed } => {
            let overrides = Overrides {
                input: data.input,
                output_dir,
                paid_policy: data.paid_policy.map(PaidPolicy::from),
                chains,
                warmup,
                samples,
                seed,
            };
            let cfg = RunConfig::resolve(data.config.as_deref(), overrides)?;
            cmd_run(&cfg)
        }
        Commands::Aggregate { data } => {
            let overrides = Overrides {
                input: data.input,
                paid_policy: data.paid_policy.map(PaidPolicy::from),
                ..Default::default()
            };
            let cfg = RunConfig::resolve(data.config.as_deref(), overrides)?;
            print!("{}", run::run_aggregate(&cfg)?);
            Ok(())
        }
        Commands::Version => {
            println!("turnout {}", tn_core::VERSION);
            Ok(())
        }
    }
}

fn cmd_run(cfg: &RunConfig) -> Result<()> {
    let outcome = run::run_pipeline(cfg)?;
    print!("{}", outcome.console);
    for path in &outcome.artifacts {
        tracing::info!(path = %path.display(), "artifact written");
    }
    tracing::info!(quality = %outcome.quality, "run complete");
    Ok(())
}
