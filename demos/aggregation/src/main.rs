//! `ps-aggregation` — gossip-based averaging on a simulated overlay.
//!
//! ```text
//! ps-aggregation configs/cycle.txt
//! ps-aggregation configs/event.txt --seed 9 --set network.size=5000 --csv avg.csv
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

mod average;
mod components;
mod distribution;
mod observer;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ps_core::{Params, PsError};
use ps_sim::{NoopObserver, SimBuilder, SimError};

#[derive(Parser, Debug)]
#[command(name = "ps-aggregation", version, about = "Push-pull averaging on a simulated overlay")]
struct Args {
    /// Configuration file, one `key value` pair per line.
    config: PathBuf,

    /// Overrides `random.seed`.
    #[arg(long)]
    seed: Option<u64>,

    /// Extra `key=value` settings, applied after the file.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Append every observer row to this CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if is_parameter_error(&e) {
                error!("configuration error: {e:#}");
            } else {
                error!("simulation failed: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut params = Params::from_path(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    for assignment in &args.set {
        params.apply_override(assignment)?;
    }
    if let Some(seed) = args.seed {
        params.set("random.seed", seed.to_string());
    }

    let registry = components::registry(args.csv.clone());
    let mut sim = SimBuilder::from_params(&params, &registry)?;
    let report = sim.run(&mut NoopObserver)?;
    info!(
        stop = ?report.stop,
        time = %report.time,
        size = sim.network.len(),
        "done"
    );
    Ok(())
}

fn is_parameter_error(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause.downcast_ref::<SimError>().is_some_and(SimError::is_parameter_error)
            || cause.downcast_ref::<PsError>().is_some_and(PsError::is_parameter_error)
    })
}
