//! Top-N accounts and per-account history.

use chrono::NaiveDate;
use dashboard_core::models::{MergedRecord, Metric};
use serde::Serialize;

use crate::aggregator::MetricTotals;
use crate::filter::{latest_date, DateRange};
use crate::merge::AccountDirectory;

/// Default size of the top accounts table.
pub const DEFAULT_TOP_N: usize = 5;

/// One row of the top accounts table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAccount {
    /// 1-based position.
    pub rank: usize,
    pub account_id: String,
    pub group: String,
    /// Value of the ranking metric.
    pub value: i64,
    /// All diff metrics of the row.
    pub diffs: MetricTotals,
    pub username: Option<String>,
    pub profile_url: Option<String>,
    pub followers: Option<i64>,
}

/// Rank the rows of `date` (default: latest date) by `metric` descending.
///
/// Ties are broken by account id ascending. Returns at most `n` rows and
/// never pads: a date with fewer accounts yields fewer rows.
pub fn top_accounts(
    records: &[MergedRecord],
    date: Option<NaiveDate>,
    metric: Metric,
    n: usize,
    directory: Option<&AccountDirectory>,
) -> Vec<RankedAccount> {
    let Some(date) = date.or_else(|| latest_date(records)) else {
        return Vec::new();
    };

    let mut day_rows: Vec<&MergedRecord> = records.iter().filter(|r| r.date() == date).collect();
    day_rows.sort_by(|a, b| {
        b.value(metric)
            .cmp(&a.value(metric))
            .then_with(|| a.account_id().cmp(b.account_id()))
    });

    day_rows
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(idx, r)| {
            let mut diffs = MetricTotals::for_metrics(&Metric::DIFFS);
            diffs.add_record(r);
            let meta = directory.and_then(|d| d.get(r.account_id()));
            RankedAccount {
                rank: idx + 1,
                account_id: r.account_id().to_string(),
                group: r.group.clone(),
                value: r.value(metric),
                diffs,
                username: meta.and_then(|m| m.username.clone()),
                profile_url: meta.and_then(|m| m.profile_url()),
                followers: meta.and_then(|m| m.followers),
            }
        })
        .collect()
}

/// Rows of one account inside `range`, ordered by date.
pub fn account_history(records: &[MergedRecord], account_id: &str, range: &DateRange) -> Vec<MergedRecord> {
    let mut rows: Vec<MergedRecord> = records
        .iter()
        .filter(|r| r.account_id() == account_id && range.contains(r.date()))
        .cloned()
        .collect();
    rows.sort_by_key(|r| r.date());
    rows
}
