//! Suite runner: load cases, preflight, run scenarios, write results

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::case::TestCase;
use crate::config::RunnerConfig;
use crate::error::{E2eError, E2eResult};
use crate::loader;
use crate::playwright::{self, PageSession};
use crate::scenario::{run_scenario, ScenarioOptions, ScenarioReport};
use crate::target::{self, ProbeConfig};

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn from_results(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<ScenarioReport>) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            started_at,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new(config: RunnerConfig) -> E2eResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Load cases from the workbook. Zero cases is fatal.
    pub fn load_cases(&self) -> E2eResult<Vec<TestCase>> {
        let cases = loader::load_test_cases(&self.config.cases_path)?;
        if cases.is_empty() {
            return Err(E2eError::NoTestCases(self.config.cases_path.clone()));
        }
        Ok(cases)
    }

    /// Apply the title filter, if any
    pub fn select(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        match self.config.grep.as_deref() {
            Some(pattern) => cases
                .into_iter()
                .filter(|c| c.title().contains(pattern))
                .collect(),
            None => cases,
        }
    }

    /// Make sure a browser can be driven and the site answers
    pub async fn preflight(&self) -> E2eResult<()> {
        if !self.config.preflight {
            debug!("Preflight disabled");
            return Ok(());
        }
        playwright::check_playwright_installed()?;
        target::probe_target(&self.config.root_url(), &ProbeConfig::default()).await
    }

    fn scenario_options(&self) -> ScenarioOptions {
        ScenarioOptions {
            screenshot_dir: self.config.screenshot_dir.clone(),
            output_timeout: self.config.output_timeout(),
            poll_interval: self.config.poll_interval(),
        }
    }

    /// Load, preflight and run the whole suite
    pub async fn run_all(&self) -> E2eResult<SuiteReport> {
        let cases = self.load_cases()?;
        let cases = self.select(cases);
        if cases.is_empty() {
            warn!("No test case matches the filter");
            return Ok(SuiteReport::from_results(Utc::now(), 0, Vec::new()));
        }

        self.preflight().await?;
        Ok(self.run_cases(&cases).await)
    }

    /// Run each case in its own browser session
    pub async fn run_cases(&self, cases: &[TestCase]) -> SuiteReport {
        let options = self.scenario_options();
        let root_url = self.config.root_url();

        self.run_with(cases, |case| {
            let options = options.clone();
            let root_url = root_url.clone();
            async move { self.run_in_session(&case, &root_url, &options).await }
        })
        .await
    }

    /// Acquire a session, run the scenario, release the session
    async fn run_in_session(&self, case: &TestCase, root_url: &str, options: &ScenarioOptions) -> ScenarioReport {
        let mut session = match PageSession::open(&self.config.playwright, root_url).await {
            Ok(session) => session,
            Err(e) => return ScenarioReport::aborted(case, &e),
        };

        let report = run_scenario(&mut session, case, options).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser for {}: {}", case.id, e);
        }
        report
    }

    /// Drive `run` over the cases with at most `workers` in flight.
    ///
    /// Reports come back in case order whatever order the scenarios finish in.
    pub async fn run_with<F, Fut>(&self, cases: &[TestCase], run: F) -> SuiteReport
    where
        F: Fn(TestCase) -> Fut,
        Fut: Future<Output = ScenarioReport>,
    {
        let started_at = Utc::now();
        let start = Instant::now();

        info!("Running {} test(s) with {} worker(s)...", cases.len(), self.config.workers);

        let mut indexed: Vec<(usize, ScenarioReport)> = stream::iter(cases.iter().cloned().enumerate())
            .map(|(index, case)| {
                let fut = run(case);
                async move {
                    let report = fut.await;
                    match report.error_message() {
                        None => info!("✓ {} ({} ms)", report.title, report.duration_ms),
                        Some(message) => error!("✗ {} - {}", report.title, message),
                    }
                    (index, report)
                }
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let results = indexed.into_iter().map(|(_, report)| report).collect();

        let duration_ms = start.elapsed().as_millis() as u64;
        let report = SuiteReport::from_results(started_at, duration_ms, results);

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            report.passed, report.failed, report.duration_ms
        );
        report
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &SuiteReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
