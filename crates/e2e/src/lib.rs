//! Singlish translator E2E suite
//!
//! This crate runs spreadsheet-driven browser tests against a
//! Singlish-to-Sinhala transliteration page:
//! - Loads test cases from an Excel workbook, locating the table among notes
//! - Drives Playwright through a per-scenario Node driver process
//! - Waits for the live output to settle and compares it with the expected text
//! - Writes screenshots and a JSON report with per-scenario attachments
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  loader::load_test_cases(xlsx) -> Vec<TestCase>             │
//! │    ├── sheets_to_try()    skip export / how-to sheets       │
//! │    ├── detect_header()    best of first 50 rows, score >= 2 │
//! │    └── parse_sheet()      rows with input and expected      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── preflight()        playwright + target reachable     │
//! │    └── run_cases()        one PageSession per case          │
//! │          └── run_scenario()                                 │
//! │                ├── open_root / fill_input                   │
//! │                ├── wait_for_output (poll, 15 s)             │
//! │                ├── screenshot -> screenshots/<cat>/<id>.png │
//! │                └── containment check                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod case;
pub mod config;
pub mod error;
pub mod loader;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod target;

pub use case::TestCase;
pub use config::RunnerConfig;
pub use error::{E2eError, E2eResult, LoadError};
pub use loader::load_test_cases;
pub use runner::{SuiteReport, TestRunner};
pub use scenario::{ScenarioReport, TranslatorPage};
