use std::net::SocketAddr;

use crate::config::TesterConfig;
use crate::errors::SuiteError;
use crate::orchestrator::{ScenarioResult, SuiteSummary};
use crate::scenarios::Category;

const RULE_WIDTH: usize = 60;

/// Receives progress from the orchestrator and renders it for a human
pub trait Reporter {
    fn suite_started(&mut self, target: &str, config: &TesterConfig, round: usize, rounds: usize);
    fn preflight_passed(&mut self, address: SocketAddr);
    fn preflight_failed(&mut self, error: &SuiteError);
    fn scenario_started(&mut self, number: usize, name: &str, category: Category, expectation: &str);
    fn scenario_finished(&mut self, result: &ScenarioResult);
    fn summary(&mut self, summary: &SuiteSummary);
}

/// Prints to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> ConsoleReporter {
        ConsoleReporter
    }

    fn rule() -> String {
        "=".repeat(RULE_WIDTH)
    }
}

impl Reporter for ConsoleReporter {
    fn suite_started(&mut self, target: &str, config: &TesterConfig, round: usize, rounds: usize) {
        println!("RTMP Server Security Test Suite");
        println!("Target: {}", target);
        println!(
            "Max connections setting: {} ({} per address)",
            config.limits.max_connections, config.limits.max_connections_per_address
        );

        if rounds > 1 {
            println!("Round {} of {}", round, rounds);
        }

        println!();
        println!("Pre-flight: checking server is reachable...");
    }

    fn preflight_passed(&mut self, _address: SocketAddr) {
        println!("  OK: Server is reachable");
    }

    fn preflight_failed(&mut self, error: &SuiteError) {
        println!("  ABORT: {}", error);
    }

    fn scenario_started(&mut self, number: usize, name: &str, category: Category, expectation: &str) {
        println!();
        println!("{}", Self::rule());
        println!("TEST {}: {} [{}]", number, name, category);
        println!("{}", Self::rule());
        println!("  Expect: {}", expectation);
    }

    fn scenario_finished(&mut self, result: &ScenarioResult) {
        let status = if result.passed { "PASS" } else { "FAIL" };
        println!(
            "  {}: {} ({:.1}s)",
            status,
            result.detail,
            result.elapsed.as_secs_f64()
        );
    }

    fn summary(&mut self, summary: &SuiteSummary) {
        println!();
        println!("{}", Self::rule());
        println!("RESULTS SUMMARY");
        println!("{}", Self::rule());

        for result in &summary.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            println!("  [{}] {}. {}", status, result.number, result.name);
        }

        println!();
        println!(
            "  {}/{} passed, {} failed",
            summary.passed_count(),
            summary.results.len(),
            summary.failed_count()
        );

        if summary.all_passed() {
            println!();
            println!("  All tests PASSED. Server hardening is working correctly.");
        } else {
            println!();
            println!("  Some tests FAILED. Check the server logs for details.");
        }
    }
}
