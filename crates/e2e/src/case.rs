//! Test case records loaded from the workbook

use serde::{Deserialize, Serialize};

/// Literal cell value that stands for "type nothing" / "expect nothing"
pub const NO_INPUT_SENTINEL: &str = "(no input)";

/// Id prefix of cases authored to probe edge or failure behaviour
pub const NEGATIVE_PREFIX: &str = "Neg_";

/// Category used when the sheet has no category column or the cell is blank
pub const FALLBACK_CATEGORY: &str = "From_Excel";

/// One row of the test-case table.
///
/// `input` and `expected` hold the raw cell text. Sentinel resolution
/// happens when a scenario consumes the case, see [`TestCase::effective_input`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub category: String,
    pub input: String,
    pub expected: String,
}

impl TestCase {
    /// Default id for a row without one. `row_number` is 1-based, as shown in the spreadsheet.
    pub fn default_id(row_number: usize) -> String {
        format!("Row_{}", row_number)
    }

    /// Title used for logs, filtering and reports
    pub fn title(&self) -> String {
        format!("{}: {}", self.id, self.category)
    }

    pub fn is_negative(&self) -> bool {
        self.id.starts_with(NEGATIVE_PREFIX)
    }

    /// Text to type into the page
    pub fn effective_input(&self) -> &str {
        resolve_sentinel(&self.input)
    }

    /// Text the output is compared against
    pub fn effective_expected(&self) -> &str {
        resolve_sentinel(&self.expected)
    }
}

/// Map the sentinel marker to the empty string, anything else to itself.
pub fn resolve_sentinel(raw: &str) -> &str {
    if raw.trim().eq_ignore_ascii_case(NO_INPUT_SENTINEL) {
        ""
    } else {
        raw
    }
}

/// Collapse whitespace runs to a single space and trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison rule applied to every case, negative or not.
///
/// With both effective input and expected empty the output must be empty;
/// otherwise the normalised output must contain the normalised expected text.
pub fn output_matches(effective_input: &str, effective_expected: &str, actual: &str) -> bool {
    let actual = normalize_text(actual);
    let expected = normalize_text(effective_expected);

    if effective_input.trim().is_empty() && expected.is_empty() {
        actual.is_empty()
    } else {
        actual.contains(&expected)
    }
}
