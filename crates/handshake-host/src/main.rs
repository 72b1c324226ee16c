mod cli;
mod sim;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::sim::Simulation;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    let simulation = Simulation {
        config,
        request: cli.request.as_bytes(),
        response: cli.response.as_bytes(),
        target: cli.target,
        cycles: cli.cycles,
        max_ticks: cli.max_ticks,
    };
    let report = simulation.run()?;

    println!(
        "{} round trips in {} ticks: slave got {:?}, master got {:?}",
        report.cycles,
        report.ticks,
        String::from_utf8_lossy(&report.request),
        String::from_utf8_lossy(&report.response),
    );
    Ok(())
}
