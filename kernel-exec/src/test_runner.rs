//! Sandbox-backed test runner (spec §4.J.1): produces the baseline/patched
//! pass/fail counts the planner's test-delta reward consumes, without the
//! reward computation ever depending on which backend ran the tests.

use crate::backend::{ExecBackend, ShellRequest};
use async_trait::async_trait;
use kernel_types::ToolError;
use regex::Regex;
use std::sync::Arc;

/// Parsed test counts from one test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestRunResult {
    /// Tests that passed.
    pub passed: u32,
    /// Tests that failed.
    pub failed: u32,
    /// Wall-clock duration of the run, in milliseconds.
    pub duration_ms: u64,
}

impl TestRunResult {
    /// Whether every test in the run passed (and at least one ran).
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.passed > 0
    }

    /// Total tests observed in the run.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }
}

/// Produces a [`TestRunResult`] for a workdir, regardless of backend.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run the test suite rooted at `workdir`.
    async fn run(&self, workdir: &str) -> Result<TestRunResult, ToolError>;
}

/// A [`TestRunner`] that shells out to `cargo test` through any
/// [`ExecBackend`] — sandboxed or host, the parsing is identical.
pub struct ExecTestRunner {
    backend: Arc<dyn ExecBackend>,
    command: String,
    timeout_secs: u64,
}

impl ExecTestRunner {
    /// Run `cargo test` with a 300-second timeout through `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn ExecBackend>) -> Self {
        Self { backend, command: "cargo test".to_string(), timeout_secs: 300 }
    }

    /// Override the test command (e.g. `"cargo test --workspace"`).
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

#[async_trait]
impl TestRunner for ExecTestRunner {
    async fn run(&self, workdir: &str) -> Result<TestRunResult, ToolError> {
        let mut request = ShellRequest::new(self.command.clone(), workdir.to_string());
        request.timeout_secs = self.timeout_secs;
        let started = std::time::Instant::now();
        let result = self.backend.run(request).await?;
        let duration_ms = started.elapsed().as_millis() as u64;
        let combined = format!("{}\n{}", result.stdout, result.stderr);
        let (passed, failed) = parse_cargo_test_output(&combined);
        Ok(TestRunResult { passed, failed, duration_ms })
    }
}

/// Parse `cargo test`'s summary line(s), e.g.
/// `test result: FAILED. 3 passed; 2 failed; 0 ignored; ...`. Multiple
/// summary lines (one per test binary) are accumulated.
fn parse_cargo_test_output(output: &str) -> (u32, u32) {
    let summary = Regex::new(r"test result: \w+\.\s+(\d+)\s+passed;\s+(\d+)\s+failed")
        .expect("constant pattern is always valid");
    let mut passed = 0;
    let mut failed = 0;
    for capture in summary.captures_iter(output) {
        passed += capture[1].parse::<u32>().unwrap_or(0);
        failed += capture[2].parse::<u32>().unwrap_or(0);
    }
    (passed, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_summary_line() {
        let output = "running 3 tests\n...\ntest result: ok. 3 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out\n";
        assert_eq!(parse_cargo_test_output(output), (3, 0));
    }

    #[test]
    fn accumulates_multiple_binaries() {
        let output = "\
test result: ok. 2 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out
test result: FAILED. 1 passed; 1 failed; 0 ignored; 0 measured; 0 filtered out
";
        assert_eq!(parse_cargo_test_output(output), (3, 1));
    }

    #[test]
    fn all_passed_requires_at_least_one_test() {
        assert!(!TestRunResult { passed: 0, failed: 0, duration_ms: 0 }.all_passed());
        assert!(TestRunResult { passed: 1, failed: 0, duration_ms: 0 }.all_passed());
    }
}
