//! Runner configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Top-level configuration for a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Workbook holding the test-case table
    pub cases_path: PathBuf,

    /// Root of the translator site
    pub base_url: String,

    /// Screenshots land in `<screenshot_dir>/<category>/<id>.png`
    pub screenshot_dir: PathBuf,

    /// Directory for `test-results.json`
    pub output_dir: PathBuf,

    /// How long the output may take to settle
    pub output_timeout_ms: u64,

    pub poll_interval_ms: u64,

    /// Scenarios running at once, each in its own browser
    pub workers: usize,

    /// Only run cases whose title contains this
    pub grep: Option<String>,

    /// Check Playwright and the target before running anything
    pub preflight: bool,

    pub playwright: PlaywrightConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cases_path: PathBuf::from("csv/IT23824188.ITPMnew.xlsx"),
            base_url: "https://www.swifttranslator.com".to_string(),
            screenshot_dir: PathBuf::from("screenshots"),
            output_dir: PathBuf::from("test-results"),
            output_timeout_ms: 15_000,
            poll_interval_ms: 100,
            workers: 1,
            grep: None,
            preflight: true,
            playwright: PlaywrightConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(E2eError::Config("poll_interval_ms must be positive".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(E2eError::Config(format!("base_url is not an http(s) URL: {}", self.base_url)));
        }
        Ok(())
    }

    pub fn output_timeout(&self) -> Duration {
        Duration::from_millis(self.output_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// URL of the application's root page
    pub fn root_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Node executable used to run the driver
    pub node_binary: PathBuf,

    /// `node_modules` directory containing `playwright` (exported as NODE_PATH)
    pub node_modules: PathBuf,

    /// Upper bound for a single navigation / fill / read
    pub action_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            node_modules: PathBuf::from("node_modules"),
            action_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.output_timeout(), Duration::from_secs(15));
        assert_eq!(config.workers, 1);
        assert_eq!(config.playwright.browser, Browser::Chromium);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_root_url() {
        let mut config = RunnerConfig::default();
        config.base_url = "http://127.0.0.1:5173/".to_string();
        assert_eq!(config.root_url(), "http://127.0.0.1:5173/");
        config.base_url = "http://127.0.0.1:5173".to_string();
        assert_eq!(config.root_url(), "http://127.0.0.1:5173/");
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e2e.toml");
        std::fs::write(
            &path,
            r#"
base_url = "http://localhost:3000"
workers = 4

[playwright]
browser = "firefox"
headless = false
"#,
        )
        .unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.workers, 4);
        assert_eq!(config.playwright.browser, Browser::Firefox);
        assert!(!config.playwright.headless);
        // untouched fields keep their defaults
        assert_eq!(config.output_timeout_ms, 15_000);
        assert_eq!(config.playwright.viewport_width, 1280);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = RunnerConfig::load(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.screenshot_dir, PathBuf::from("screenshots"));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = RunnerConfig { workers: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));
    }
}
