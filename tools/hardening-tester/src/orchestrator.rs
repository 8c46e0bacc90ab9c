//! Runs the battery one scenario at a time against a single target.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::ProtocolClient;
use crate::config::TesterConfig;
use crate::errors::SuiteError;
use crate::report::Reporter;
use crate::scenarios::{Category, Probe, ScenarioContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    PreflightCheck,
    RunningScenario(usize),
    Cooldown(usize),
    Summarizing,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub number: usize,
    pub name: &'static str,
    pub category: Category,
    pub passed: bool,
    pub detail: String,
    pub elapsed: Duration,
}

/// Results of one pass through the battery, in the order the scenarios ran
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteSummary {
    pub round: usize,
    pub results: Vec<ScenarioResult>,
}

impl SuiteSummary {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }
}

pub struct Orchestrator<'a, P: Probe, R: Reporter> {
    config: &'a TesterConfig,
    probes: &'a [P],
    reporter: R,
    stage: Stage,
}

impl<'a, P: Probe, R: Reporter> Orchestrator<'a, P, R> {
    pub fn new(config: &'a TesterConfig, probes: &'a [P], reporter: R) -> Self {
        Orchestrator {
            config,
            probes,
            reporter,
            stage: Stage::Idle,
        }
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[cfg(test)]
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Checks the target is reachable, then runs every probe with a cooldown after each.
    /// Failed probes never stop the run; only an unreachable target does.
    pub fn run(&mut self, round: usize, rounds: usize) -> Result<SuiteSummary, SuiteError> {
        let target = self.config.target_address();
        self.reporter
            .suite_started(&target, self.config, round, rounds);

        self.transition(Stage::PreflightCheck);
        let address = match self.preflight(&target) {
            Ok(address) => address,
            Err(error) => {
                self.reporter.preflight_failed(&error);
                self.transition(Stage::Done);
                return Err(error);
            }
        };

        self.reporter.preflight_passed(address);
        thread::sleep(self.config.timing.cooldown());

        let client = match ProtocolClient::new(address, self.config) {
            Ok(client) => client,
            Err(error) => {
                self.transition(Stage::Done);
                return Err(error.into());
            }
        };

        let context = ScenarioContext {
            client: &client,
            config: self.config,
        };

        let mut results = Vec::with_capacity(self.probes.len());
        for (index, probe) in self.probes.iter().enumerate() {
            self.transition(Stage::RunningScenario(index));
            self.reporter.scenario_started(
                probe.number(),
                probe.name(),
                probe.category(),
                probe.expectation(),
            );

            let result = run_probe(probe, &context);
            self.reporter.scenario_finished(&result);
            results.push(result);

            self.transition(Stage::Cooldown(index));
            thread::sleep(self.config.timing.cooldown());
        }

        self.transition(Stage::Summarizing);
        let summary = SuiteSummary { round, results };
        self.reporter.summary(&summary);

        info!(
            round,
            passed = summary.passed_count(),
            failed = summary.failed_count(),
            "round finished"
        );

        self.transition(Stage::Done);
        Ok(summary)
    }

    /// Resolves the target and makes sure a plain TCP connect goes through
    fn preflight(&self, target: &str) -> Result<SocketAddr, SuiteError> {
        let unreachable = |source| SuiteError::TargetUnreachable {
            address: target.to_string(),
            source,
        };

        let timeout = self.config.timing.preflight_timeout();
        let candidates: Vec<SocketAddr> = target.to_socket_addrs().map_err(unreachable)?.collect();

        let mut last_error = std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "host did not resolve to any address",
        );

        for address in candidates {
            match TcpStream::connect_timeout(&address, timeout) {
                Ok(stream) => {
                    drop(stream);
                    debug!(%address, "preflight connect succeeded");
                    return Ok(address);
                }

                Err(error) => {
                    warn!(%address, %error, "preflight connect failed");
                    last_error = error;
                }
            }
        }

        Err(unreachable(last_error))
    }

    fn transition(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "stage transition");
        self.stage = stage;
    }
}

/// Runs one probe and folds any error into a failed result
fn run_probe<P: Probe>(probe: &P, context: &ScenarioContext) -> ScenarioResult {
    let started = Instant::now();
    let (passed, detail) = match probe.run(context) {
        Ok(verdict) => (verdict.passed, verdict.detail),
        Err(error) => {
            warn!(scenario = probe.name(), %error, "scenario aborted");
            (false, format!("ERROR: {}", error))
        }
    };

    ScenarioResult {
        number: probe.number(),
        name: probe.name(),
        category: probe.category(),
        passed,
        detail,
        elapsed: started.elapsed(),
    }
}
