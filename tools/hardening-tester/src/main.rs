mod client;
mod config;
mod errors;
mod orchestrator;
mod report;
mod scenarios;
mod timing;
mod transport;

#[cfg(test)]
mod test_support;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use crate::config::TesterConfig;
use crate::errors::SuiteError;
use crate::orchestrator::Orchestrator;
use crate::report::ConsoleReporter;
use crate::scenarios::Scenario;

const EXIT_FAILED: u8 = 1;
const EXIT_ABORTED: u8 = 2;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // ARGS
    /// Host of the RTMP server under test
    pub host: Option<String>,
    /// Port of the RTMP server under test
    pub port: Option<u16>,

    // OPTS
    /// TOML file with target, limits, timing and publish settings
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// The server's maximum number of concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,
    /// The server's maximum number of concurrent connections from one address
    #[arg(long)]
    pub max_connections_per_address: Option<usize>,
    #[arg(long)]
    pub publish_timeout_ms: Option<u64>,
    #[arg(long)]
    pub video_data_timeout_ms: Option<u64>,
    #[arg(long)]
    pub io_timeout_ms: Option<u64>,

    /// Run the battery this many times back to back
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub rounds: u32,

    /// Only run the named (or numbered) scenario.  Can be repeated.
    #[arg(long = "scenario", short = 's')]
    pub scenarios: Vec<String>,
}

impl Args {
    /// Layers command line values over the config file over the defaults
    fn load_config(&self) -> Result<TesterConfig, SuiteError> {
        let mut config = match &self.config {
            Some(path) => TesterConfig::from_file(path)?,
            None => TesterConfig::default(),
        };

        if let Some(host) = &self.host {
            config.target.host = host.clone();
        }

        if let Some(port) = self.port {
            config.target.port = port;
        }

        if let Some(value) = self.max_connections {
            config.limits.max_connections = value;
        }

        if let Some(value) = self.max_connections_per_address {
            config.limits.max_connections_per_address = value;
        }

        if let Some(value) = self.publish_timeout_ms {
            config.limits.publish_timeout_ms = value;
        }

        if let Some(value) = self.video_data_timeout_ms {
            config.limits.video_data_timeout_ms = value;
        }

        if let Some(value) = self.io_timeout_ms {
            config.limits.io_timeout_ms = value;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let outcome = run(&args);
    if let Some(line) = outcome.as_ref().err().and_then(abort_line) {
        println!("{}", line);
    }

    ExitCode::from(exit_code(&outcome))
}

fn exit_code(outcome: &Result<bool, SuiteError>) -> u8 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => EXIT_FAILED,
        Err(_) => EXIT_ABORTED,
    }
}

/// The reporter already announces an unreachable target
fn abort_line(error: &SuiteError) -> Option<String> {
    match error {
        SuiteError::TargetUnreachable { .. } => None,
        error => Some(format!("ABORT: {}", error)),
    }
}

/// Runs every requested round.  `Ok(false)` means at least one scenario failed somewhere.
fn run(args: &Args) -> Result<bool, SuiteError> {
    let config = args.load_config()?;
    let scenarios = Scenario::select(&args.scenarios)?;
    debug!(?config, scenarios = scenarios.len(), "configuration loaded");

    let rounds = args.rounds as usize;
    let mut all_passed = true;
    let mut orchestrator = Orchestrator::new(&config, &scenarios, ConsoleReporter::new());

    for round in 1..=rounds {
        let summary = orchestrator.run(round, rounds)?;
        all_passed &= summary.all_passed();
    }

    Ok(all_passed)
}
