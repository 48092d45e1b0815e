//! Workbook loader
//!
//! Exported spreadsheets often carry notes, instructions or export metadata
//! above the real table, so nothing here assumes the header is row 0. Each
//! sheet is scanned for the row that looks most like a test-case header,
//! columns are matched by fuzzy name, and the sheet producing the most
//! records wins.

use std::io::{Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::artifacts::absolute;
use crate::case::{TestCase, FALLBACK_CATEGORY};
use crate::error::{LoadError, LoadResult};

/// Rows of stringified cells, starting at the sheet's first used row and column
pub type Grid = Vec<Vec<String>>;

/// Only this many leading rows are considered when looking for the header
pub const HEADER_SCAN_LIMIT: usize = 50;

/// A header row needs at least this many of {id, input, expected}
pub const MIN_HEADER_SCORE: usize = 2;

pub const ID_CANDIDATES: &[&str] = &["id", "testcaseid", "testcase id", "tcid", "test id", "testcase"];
pub const CATEGORY_CANDIDATES: &[&str] = &["category", "module", "section", "scenario", "type", "test category"];
pub const INPUT_CANDIDATES: &[&str] = &["input", "input text", "singlish", "singlish input", "source", "from"];
pub const EXPECTED_CANDIDATES: &[&str] = &[
    "expected",
    "expected output",
    "expectedoutput",
    "output",
    "sinhala",
    "translation",
    "to",
];

/// Normalised sheet-name fragments of export / instruction sheets
const ADMIN_SHEET_MARKERS: &[&str] = &["exportsummary", "howto", "columnd"];

static HEADER_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").expect("static regex"));

/// Anything that can list sheets and hand out their cell grids.
pub trait SheetSource {
    fn sheet_names(&self) -> Vec<String>;
    fn grid(&mut self, sheet: &str) -> LoadResult<Grid>;
}

impl<RS> SheetSource for Sheets<RS>
where
    RS: Read + Seek,
{
    fn sheet_names(&self) -> Vec<String> {
        <Self as Reader<RS>>::sheet_names(self)
    }

    fn grid(&mut self, sheet: &str) -> LoadResult<Grid> {
        let range = self.worksheet_range(sheet).map_err(|e| LoadError::Sheet {
            sheet: sheet.to_string(),
            message: e.to_string(),
        })?;
        Ok(range_to_grid(&range))
    }
}

/// Lowercase, trim and drop whitespace / underscores / hyphens.
pub fn normalize_header(value: &str) -> String {
    HEADER_NOISE
        .replace_all(&value.trim().to_lowercase(), "")
        .into_owned()
}

/// Index of the first header cell matching a candidate. Candidates are tried in order.
pub fn find_column<S: AsRef<str>>(header: &[S], candidates: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = header.iter().map(|h| normalize_header(h.as_ref())).collect();

    candidates.iter().find_map(|candidate| {
        let wanted = normalize_header(candidate);
        normalized.iter().position(|h| *h == wanted)
    })
}

/// Number of key columns (id, input, expected) present in a row
pub fn header_score<S: AsRef<str>>(row: &[S]) -> usize {
    [ID_CANDIDATES, INPUT_CANDIDATES, EXPECTED_CANDIDATES]
        .iter()
        .filter(|candidates| find_column(row, candidates).is_some())
        .count()
}

/// Pick the header row among the first [`HEADER_SCAN_LIMIT`] rows.
///
/// Ties keep the earliest row; `None` when the best score is below [`MIN_HEADER_SCORE`].
pub fn detect_header(grid: &Grid) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for (index, row) in grid.iter().take(HEADER_SCAN_LIMIT).enumerate() {
        let score = header_score(row);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.filter(|(_, score)| *score >= MIN_HEADER_SCORE)
        .map(|(index, _)| index)
}

/// Column indices for the semantic fields of a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: Option<usize>,
    pub category: Option<usize>,
    pub input: usize,
    pub expected: usize,
}

impl ColumnMap {
    /// Resolve each field independently; `None` if input or expected is missing.
    pub fn resolve<S: AsRef<str>>(header: &[S]) -> Option<Self> {
        Some(Self {
            id: find_column(header, ID_CANDIDATES),
            category: find_column(header, CATEGORY_CANDIDATES),
            input: find_column(header, INPUT_CANDIDATES)?,
            expected: find_column(header, EXPECTED_CANDIDATES)?,
        })
    }
}

/// Extract the test-case table from one sheet's grid.
pub fn parse_sheet(grid: &Grid) -> Vec<TestCase> {
    let Some(header_index) = detect_header(grid) else {
        return Vec::new();
    };
    let Some(columns) = ColumnMap::resolve(&grid[header_index]) else {
        return Vec::new();
    };
    debug!(header_row = header_index + 1, ?columns, "Detected test case table");

    let cell = |row: &[String], index: Option<usize>| -> String {
        index
            .and_then(|i| row.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    grid.iter()
        .enumerate()
        .skip(header_index + 1)
        .filter_map(|(index, row)| {
            let input = cell(row, Some(columns.input));
            let expected = cell(row, Some(columns.expected));
            if input.is_empty() || expected.is_empty() {
                return None;
            }

            let row_number = index + 1;
            let id = Some(cell(row, columns.id))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| TestCase::default_id(row_number));
            let category = Some(cell(row, columns.category))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());

            Some(TestCase { id, category, input, expected })
        })
        .collect()
}

pub fn is_admin_sheet(name: &str) -> bool {
    let normalized = normalize_header(name);
    ADMIN_SHEET_MARKERS.iter().any(|marker| normalized.contains(marker))
}

/// Sheets worth parsing: administrative sheets are dropped unless nothing else is left.
pub fn sheets_to_try(names: &[String]) -> Vec<&str> {
    let candidates: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| !is_admin_sheet(name))
        .collect();

    if candidates.is_empty() {
        names.iter().map(String::as_str).collect()
    } else {
        candidates
    }
}

/// Run table detection over every eligible sheet and keep the largest table.
///
/// `origin` is only used for error messages.
pub fn load_from_source<S: SheetSource>(source: &mut S, origin: &Path) -> LoadResult<Vec<TestCase>> {
    let names = source.sheet_names();
    if names.is_empty() {
        return Err(LoadError::NoSheets(origin.to_path_buf()));
    }

    let mut best: Option<(String, Vec<TestCase>)> = None;
    for name in sheets_to_try(&names) {
        let grid = match source.grid(name) {
            Ok(grid) => grid,
            Err(e) => {
                warn!("Skipping sheet: {}", e);
                continue;
            }
        };

        let cases = parse_sheet(&grid);
        debug!(sheet = name, cases = cases.len(), "Parsed sheet");

        if best.as_ref().map_or(true, |(_, b)| cases.len() > b.len()) {
            best = Some((name.to_string(), cases));
        }
    }

    match best {
        Some((sheet, cases)) if !cases.is_empty() => {
            info!("Loaded {} test case(s) from sheet '{}'", cases.len(), sheet);
            Ok(cases)
        }
        _ => {
            warn!("No sheet in {} contains a test case table", origin.display());
            Ok(Vec::new())
        }
    }
}

/// Load test cases from a workbook on disk (xlsx, xls, xlsb, ods).
pub fn load_test_cases(path: impl AsRef<Path>) -> LoadResult<Vec<TestCase>> {
    let path = absolute(path.as_ref());
    if !path.is_file() {
        return Err(LoadError::FileNotFound(path));
    }

    let mut workbook = open_workbook_auto(&path).map_err(|source| LoadError::Workbook {
        path: path.clone(),
        source,
    })?;

    load_from_source(&mut workbook, &path)
}

/// The used range only: blank leading rows and columns are not part of the grid,
/// so header scanning and `Row_<n>` numbering count from the first used row.
fn range_to_grid(range: &Range<Data>) -> Grid {
    range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        other => other.to_string(),
    }
}
