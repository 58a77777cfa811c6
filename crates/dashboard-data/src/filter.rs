//! Date-range and group filtering of the merged table.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::MergedRecord;
use serde::Serialize;

/// Characters that separate several groups inside one group label.
pub const GROUP_SEPARATORS: &[char] = &[',', '|', '/', ';', '，', '；'];

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Inclusive date range; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(DashboardError::InvalidDateRange { start: s, end: e });
            }
        }
        Ok(Self { start, end })
    }

    /// The unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

// ── GroupSelection ────────────────────────────────────────────────────────────

/// Selected group keywords; empty means every group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSelection {
    keywords: Vec<String>,
}

impl GroupSelection {
    /// Keep the non-blank keywords, trimmed, in the given order.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// The first keyword contained in `label` (case-insensitive).
    pub fn matching_keyword(&self, label: &str) -> Option<&str> {
        let label = label.to_lowercase();
        self.keywords
            .iter()
            .find(|k| label.contains(&k.to_lowercase()))
            .map(String::as_str)
    }

    /// Whether `label` passes: always for an empty selection.
    pub fn matches(&self, label: &str) -> bool {
        self.is_empty() || self.matching_keyword(label).is_some()
    }
}

// ── Filter ────────────────────────────────────────────────────────────────────

/// A date range plus a group selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub range: DateRange,
    pub groups: GroupSelection,
}

impl Filter {
    pub fn new(range: DateRange, groups: GroupSelection) -> Self {
        Self { range, groups }
    }

    pub fn matches(&self, record: &MergedRecord) -> bool {
        self.range.contains(record.date()) && self.groups.matches(&record.group)
    }

    /// Rows passing both predicates, as a new table in input order.
    pub fn apply(&self, records: &[MergedRecord]) -> Vec<MergedRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

// ── Group options ─────────────────────────────────────────────────────────────

/// Distinct individual groups found in the labels, sorted.
///
/// A label such as `"groupA, groupB"` contributes both parts.
pub fn available_groups(records: &[MergedRecord]) -> Vec<String> {
    let set: BTreeSet<String> = records
        .iter()
        .flat_map(|r| r.group.split(GROUP_SEPARATORS))
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    set.into_iter().collect()
}

/// Report each row under the first selected keyword its label contains.
///
/// Rows matching no keyword keep their label. An empty selection returns the
/// table unchanged.
pub fn relabel_by_selection(records: &[MergedRecord], selection: &GroupSelection) -> Vec<MergedRecord> {
    records
        .iter()
        .map(|r| {
            let mut out = r.clone();
            if let Some(keyword) = selection.matching_keyword(&r.group) {
                out.group = keyword.to_string();
            }
            out
        })
        .collect()
}

/// Earliest and latest dates of the table.
pub fn date_bounds(records: &[MergedRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let min = records.iter().map(|r| r.date()).min()?;
    let max = records.iter().map(|r| r.date()).max()?;
    Some((min, max))
}

/// Latest date of the table.
pub fn latest_date(records: &[MergedRecord]) -> Option<NaiveDate> {
    records.iter().map(|r| r.date()).max()
}
