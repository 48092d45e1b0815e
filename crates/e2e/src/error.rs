//! Error types for E2E testing

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a workbook into test cases
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Excel file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("No sheets found in Excel file: {}", .0.display())]
    NoSheets(PathBuf),

    #[error("Failed to open workbook {path:?}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Failed to read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },
}

#[derive(Error, Debug)]
pub enum E2eError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("No test cases loaded from {}", .0.display())]
    NoTestCases(PathBuf),

    #[error("Playwright not found. Install with: npm i -D playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Browser driver exited unexpectedly")]
    DriverExited,

    #[error("Target {url} unreachable after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl E2eError {
    /// Setup errors abort the whole run; everything else is scoped to one scenario.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            E2eError::Load(_)
                | E2eError::NoTestCases(_)
                | E2eError::PlaywrightNotFound
                | E2eError::TargetUnreachable { .. }
                | E2eError::Config(_)
                | E2eError::Toml(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
pub type LoadResult<T> = Result<T, LoadError>;
