use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scorer::Party;

pub const POLL_COLUMN: &str = "Poll";
pub const DATE_COLUMN: &str = "Date";
pub const SAMPLE_COLUMN: &str = "Sample";
pub const MARGIN_OF_ERROR_COLUMN: &str = "MoE";

/// A polling table as scraped: header row plus raw cell text, in file order.
///
/// Candidate columns sit between the metadata columns (`Poll`, `Date`, `Sample`, optional `MoE`)
/// and the trailing spread column, and are named like `"Jane Doe (D)"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollTable {
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateColumn {
    pub index: usize,
    pub name: String,
    pub party: Party,
}

impl CandidateColumn {
    fn from_header(index: usize, header: &str) -> Self {
        let chars: Vec<char> = header.chars().collect();
        let party = chars
            .len()
            .checked_sub(2)
            .map(|i| Party::from_label(chars[i]))
            .unwrap_or(Party::Independent);
        let name: String = chars[..chars.len().saturating_sub(4)].iter().collect();
        Self {
            index,
            name: name.trim().to_string(),
            party,
        }
    }
}

impl PollTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn has_margin_of_error(&self) -> bool {
        self.column(MARGIN_OF_ERROR_COLUMN).is_some()
    }

    pub fn candidate_columns(&self) -> Vec<CandidateColumn> {
        let skip = if self.has_margin_of_error() { 4 } else { 3 };
        let end = self.headers.len().saturating_sub(1);
        if skip >= end {
            return Vec::new();
        }
        self.headers[skip..end]
            .iter()
            .enumerate()
            .map(|(offset, header)| CandidateColumn::from_header(skip + offset, header))
            .collect()
    }

    pub fn cell<'a>(&self, row: &'a [String], column: Option<usize>) -> &'a str {
        column
            .and_then(|idx| row.get(idx))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

/// Aggregate rows ("RCP Average", "Final Results") are not individual polls.
pub fn is_meta_row(poll_label: &str) -> bool {
    poll_label.contains("Average") || poll_label.contains("Results")
}

/// Only October/November field dates count toward a projection.
pub fn in_counting_window(date: &str) -> bool {
    date.contains("10/") || date.contains("11/")
}

/// "500 RV" -> 500. Unparseable text counts as a single respondent.
pub fn parse_sample_size(raw: &str) -> u64 {
    raw.trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim()
        .replace(',', "")
        .parse::<u64>()
        .unwrap_or(1)
}

/// Candidate cells hold a percentage, or something like "--" when the pollster skipped them.
pub fn parse_share_cell(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if !s.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    s.trim_end_matches('%').parse::<f64>().ok()
}

pub trait PollSource {
    /// The poll table for race `code`, if one exists. Keys are `"{code}_..."`; the
    /// underscore keeps "AZ1" from matching "AZ10".
    fn find_poll(&self, code: &str) -> Option<&PollTable>;
}

/// Poll tables keyed by their source name (e.g. `"PA_president.csv"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollLibrary {
    pub tables: BTreeMap<String, PollTable>,
}

impl PollLibrary {
    pub fn insert(&mut self, key: impl Into<String>, table: PollTable) {
        self.tables.insert(key.into(), table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl PollSource for PollLibrary {
    fn find_poll(&self, code: &str) -> Option<&PollTable> {
        let prefix = format!("{code}_");
        self.tables
            .iter()
            .find(|(key, _)| key.starts_with(&prefix))
            .map(|(_, table)| table)
    }
}

/// A source with no polls at all; every race built against it is uncontested.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPolls;

impl PollSource for NoPolls {
    fn find_poll(&self, _code: &str) -> Option<&PollTable> {
        None
    }
}
