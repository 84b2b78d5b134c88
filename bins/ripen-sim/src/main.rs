//! Ripen scenario simulator.
//!
//! Replays a JSON scenario of pools and timed position operations against an
//! in-memory farm, then prints pool state, open positions, paid rewards, and
//! the event log as JSON on stdout. Logs go to stderr.

mod scenario;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ripen_engine::EngineConfig;
use tracing::info;

use crate::scenario::Scenario;

#[derive(Parser, Debug)]
#[command(
    name = "ripen-sim",
    version,
    about = "Replay a reward-farm scenario against an in-memory ledger"
)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Reward units emitted per tick; overrides the scenario and environment
    #[arg(long)]
    emission_rate: Option<u128>,

    /// Native seconds to ticks multiplier; overrides the scenario and environment
    #[arg(long)]
    time_scale: Option<u64>,

    /// Abort on the first rejected step instead of recording it
    #[arg(long)]
    strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Layer environment, scenario, and command-line settings, later wins.
    fn engine_config(&self, scenario: &Scenario) -> Result<EngineConfig> {
        let env = EngineConfig::from_env().context("reading engine config from environment")?;
        let mut config = scenario.engine_config(env);
        if let Some(rate) = self.emission_rate {
            config.emission_rate = rate;
        }
        if let Some(scale) = self.time_scale {
            config.time_scale = scale;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    info!("Ripen simulator v{}", env!("CARGO_PKG_VERSION"));
    let scenario = Scenario::load(&args.scenario)?;
    let config = args.engine_config(&scenario)?;
    info!(
        emission_rate = config.emission_rate,
        time_scale = config.time_scale,
        pools = scenario.pools.len(),
        steps = scenario.steps.len(),
        "running scenario"
    );

    let report = scenario.run(config, args.strict)?;
    let json = serde_json::to_string_pretty(&report).context("serializing report")?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text. Output goes to stderr so the report on
/// stdout stays machine-readable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
