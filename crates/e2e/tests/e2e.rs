//! E2E test harness entry point
//!
//! Loads the test-case workbook and runs every case against the translator
//! in a real browser. Opt in with `SINGLISH_E2E=1`:
//!
//! ```text
//! SINGLISH_E2E=1 cargo test --package singlish-e2e --test e2e -- --workers 4
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use singlish_e2e::config::Browser;
use singlish_e2e::{E2eResult, RunnerConfig, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "singlish-e2e")]
#[command(about = "Spreadsheet-driven E2E tests for the Singlish translator")]
struct Args {
    /// TOML configuration file (defaults apply when missing)
    #[arg(short, long, env = "SINGLISH_E2E_CONFIG", default_value = "e2e.toml")]
    config: PathBuf,

    /// Workbook with the test cases
    #[arg(long, env = "SINGLISH_E2E_CASES")]
    cases: Option<PathBuf>,

    /// Root URL of the translator
    #[arg(long, env = "SINGLISH_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Run only cases whose "<id>: <category>" title contains this
    #[arg(short, long)]
    grep: Option<String>,

    /// Scenarios to run in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Browser to use
    #[arg(long, value_enum)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// How long the output may take to settle (ms)
    #[arg(long)]
    output_timeout_ms: Option<u64>,

    /// Screenshot root directory
    #[arg(long)]
    screenshots: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the Playwright and target checks
    #[arg(long)]
    skip_preflight: bool,
}

impl Args {
    fn into_config(self) -> E2eResult<RunnerConfig> {
        let mut config = RunnerConfig::load(&self.config)?;

        if let Some(cases) = self.cases {
            config.cases_path = cases;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if self.grep.is_some() {
            config.grep = self.grep;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(browser) = self.browser {
            config.playwright.browser = browser;
        }
        if self.headed {
            config.playwright.headless = false;
        }
        if let Some(timeout) = self.output_timeout_ms {
            config.output_timeout_ms = timeout;
        }
        if let Some(dir) = self.screenshots {
            config.screenshot_dir = dir;
        }
        if let Some(dir) = self.output {
            config.output_dir = dir;
        }
        if self.skip_preflight {
            config.preflight = false;
        }

        Ok(config)
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if std::env::var("SINGLISH_E2E").map_or(true, |v| v != "1") {
        info!("SINGLISH_E2E is not set to 1, skipping browser scenarios");
        return;
    }

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let runner = TestRunner::new(args.into_config()?)?;

    // Fails before any scenario when the workbook yields nothing
    let results = runner.run_all().await?;
    runner.write_results(&results)?;

    Ok(results.success())
}
