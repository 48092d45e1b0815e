//! One test case against the translator page

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::artifacts::{self, Attachment, ScreenshotArtifact};
use crate::case::{normalize_text, output_matches, TestCase};
use crate::error::{E2eError, E2eResult};

/// What a scenario needs from the page under test
#[async_trait]
pub trait TranslatorPage: Send {
    /// Navigate to the root page and wait for its DOM
    async fn open_root(&mut self) -> E2eResult<()>;

    /// Replace the contents of the Singlish input; empty clears it
    async fn fill_input(&mut self, text: &str) -> E2eResult<()>;

    /// Current text of the Sinhala output element.
    ///
    /// `timeout` bounds how long the element may take to appear.
    async fn output_text(&mut self, timeout: Duration) -> E2eResult<String>;

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;
}

#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub screenshot_dir: PathBuf,
    pub output_timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The output never settled
    Timeout,
    /// The output settled on the wrong text
    Assertion,
    /// Driver, navigation or locator trouble
    Browser,
    /// Screenshot could not be written or read back
    Artifact,
}

impl From<&E2eError> for FailureKind {
    fn from(err: &E2eError) -> Self {
        match err {
            E2eError::Timeout(_) => FailureKind::Timeout,
            E2eError::AssertionFailed(_) => FailureKind::Assertion,
            E2eError::Io(_) | E2eError::Image(_) => FailureKind::Artifact,
            _ => FailureKind::Browser,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn failed(err: &E2eError) -> Self {
        Outcome::Failed {
            kind: FailureKind::from(err),
            message: err.to_string(),
        }
    }
}

/// Result of a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub id: String,
    pub category: String,
    pub title: String,
    pub negative: bool,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub actual: Option<String>,
    pub screenshot: Option<ScreenshotArtifact>,
    pub attachments: Vec<Attachment>,
}

impl ScenarioReport {
    pub fn new(case: &TestCase) -> Self {
        Self {
            id: case.id.clone(),
            category: case.category.clone(),
            title: case.title(),
            negative: case.is_negative(),
            outcome: Outcome::Passed,
            duration_ms: 0,
            actual: None,
            screenshot: None,
            attachments: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Passed => None,
            Outcome::Failed { message, .. } => Some(message),
        }
    }

    /// Report for a scenario that never got a page
    pub fn aborted(case: &TestCase, err: &E2eError) -> Self {
        Self {
            outcome: Outcome::failed(err),
            ..Self::new(case)
        }
    }
}

/// Poll the output until it is empty (`expect_empty`) or non-empty.
///
/// Fails with [`E2eError::Timeout`] once `timeout` has elapsed. Each read is
/// bounded by the time left, and a value read after the deadline does not
/// count. `last_seen` is updated on every read so callers can report what
/// the page showed.
pub async fn wait_for_output<P: TranslatorPage + ?Sized>(
    page: &mut P,
    expect_empty: bool,
    timeout: Duration,
    poll_interval: Duration,
    last_seen: &mut Option<String>,
) -> E2eResult<String> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let text = page.output_text(remaining).await?;
        let settled = text.trim().is_empty() == expect_empty;
        *last_seen = Some(text.clone());

        let now = Instant::now();
        if settled && now <= deadline {
            return Ok(text);
        }

        if now >= deadline {
            let wanted = if expect_empty { "empty" } else { "non-empty" };
            return Err(E2eError::Timeout(format!(
                "output to become {} within {} ms (last seen {:?})",
                wanted,
                timeout.as_millis(),
                normalize_text(&text)
            )));
        }

        sleep(poll_interval).await;
    }
}

/// Run one case on an already acquired page.
///
/// Never returns an error: every failure is folded into the report.
pub async fn run_scenario<P: TranslatorPage + ?Sized>(
    page: &mut P,
    case: &TestCase,
    options: &ScenarioOptions,
) -> ScenarioReport {
    let start = Instant::now();
    let mut report = ScenarioReport::new(case);

    let input = case.effective_input();
    let expected = case.effective_expected();
    report.attachments.push(Attachment::text("input", input));
    report.attachments.push(Attachment::text("expected", expected));

    if let Err(e) = execute(page, case, options, &mut report).await {
        report.outcome = Outcome::failed(&e);
    }

    if let Some(actual) = &report.actual {
        report.attachments.push(Attachment::text("actual", actual.clone()));
    }
    report.duration_ms = start.elapsed().as_millis() as u64;
    report
}

async fn execute<P: TranslatorPage + ?Sized>(
    page: &mut P,
    case: &TestCase,
    options: &ScenarioOptions,
    report: &mut ScenarioReport,
) -> E2eResult<()> {
    let input = case.effective_input();
    let expected = case.effective_expected();

    debug!(id = %case.id, "Opening root page");
    page.open_root().await?;
    page.fill_input(input).await?;

    wait_for_output(
        page,
        input.is_empty(),
        options.output_timeout,
        options.poll_interval,
        &mut report.actual,
    )
    .await?;

    let path = artifacts::screenshot_path(&options.screenshot_dir, &case.category, &case.id);
    artifacts::ensure_parent(&path)?;
    page.screenshot(&path).await?;
    let shot = artifacts::inspect_screenshot(&path)?;
    report.attachments.push(Attachment::png(case.id.clone(), &shot.path));
    report.screenshot = Some(shot);

    let actual = page.output_text(options.output_timeout).await?;
    report.actual = Some(actual.clone());

    if output_matches(input, expected, &actual) {
        Ok(())
    } else if input.is_empty() && expected.is_empty() {
        Err(E2eError::AssertionFailed(format!(
            "expected empty output, got {:?}",
            normalize_text(&actual)
        )))
    } else {
        Err(E2eError::AssertionFailed(format!(
            "expected output to contain {:?}, got {:?}",
            normalize_text(expected),
            normalize_text(&actual)
        )))
    }
}
