//! Tabular sections of the dashboard page.
//!
//! Each builder turns one analysis result into a [`Table`] of pre-formatted
//! cells; the page template only lays them out.

use dashboard_core::formatting::{
    format_count, format_optional, format_percent, format_signed_count, format_signed_percent,
};
use dashboard_core::models::{EfficiencyMetric, Metric};
use dashboard_data::aggregator::{EfficiencyDistribution, GroupPerformance, GrowthRow, INTERACTION_METRICS};
use dashboard_data::clicks::{DailyClickMetrics, GroupMapping, LinkConversion, PageStats};
use dashboard_data::ranking::RankedAccount;
use serde::Serialize;

/// One table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    /// Render the text as a link to this URL.
    pub href: Option<String>,
    /// Right-align.
    pub numeric: bool,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: None,
            numeric: false,
        }
    }

    pub fn number(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: None,
            numeric: true,
        }
    }

    pub fn link(text: impl Into<String>, href: Option<String>) -> Self {
        Self {
            text: text.into(),
            href,
            numeric: false,
        }
    }
}

/// A titled table of formatted cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Metric tables ─────────────────────────────────────────────────────────────

/// Top accounts with profile links and their diff metrics.
pub fn top_accounts_table(accounts: &[RankedAccount], metric: Metric) -> Table {
    let mut table = Table::new(
        format!("Top {} by {}", accounts.len(), metric.label()),
        &["#", "Account", "Group", metric.label(), "Followers", "New likes", "New comments", "New shares", "New posts"],
    );
    for a in accounts {
        let name = a.username.clone().unwrap_or_else(|| a.account_id.clone());
        table.push(vec![
            Cell::number(a.rank.to_string()),
            Cell::link(name, a.profile_url.clone()),
            Cell::text(a.group.clone()),
            Cell::number(format_count(a.value)),
            Cell::number(a.followers.map(format_count).unwrap_or_else(|| "-".to_string())),
            Cell::number(format_signed_count(a.diffs.get(Metric::LikeDiff))),
            Cell::number(format_signed_count(a.diffs.get(Metric::CommentDiff))),
            Cell::number(format_signed_count(a.diffs.get(Metric::ShareDiff))),
            Cell::number(format_signed_count(a.diffs.get(Metric::PostDiff))),
        ]);
    }
    table
}

pub fn group_performance_table(rows: &[GroupPerformance]) -> Table {
    let mut headers: Vec<&str> = vec!["Group", "Accounts"];
    headers.extend(Metric::COUNTS.iter().map(|m| m.label()));
    headers.extend(EfficiencyMetric::ALL.iter().map(|m| m.label()));

    let mut table = Table::new("Group performance", &headers);
    for row in rows {
        let mut cells = vec![
            Cell::text(row.group.clone()),
            Cell::number(format_count(row.accounts as i64)),
        ];
        cells.extend(
            Metric::COUNTS
                .iter()
                .map(|m| Cell::number(format_count(row.totals.get(*m)))),
        );
        cells.extend(
            row.efficiency
                .iter()
                .map(|(_, value)| Cell::number(format_optional(*value, 2))),
        );
        table.push(cells);
    }
    table
}

pub fn efficiency_distribution_table(rows: &[EfficiencyDistribution], metric: EfficiencyMetric) -> Table {
    let mut table = Table::new(
        format!("{} by group", metric.label()),
        &["Group", "Mean", "Median", "Std dev", "Posting accounts", "Accounts"],
    );
    for row in rows {
        table.push(vec![
            Cell::text(row.group.clone()),
            Cell::number(format_optional(row.mean, 2)),
            Cell::number(format_optional(row.median, 2)),
            Cell::number(format_optional(row.std_dev, 2)),
            Cell::number(format_count(row.count as i64)),
            Cell::number(format_count(row.accounts as i64)),
        ]);
    }
    table
}

/// Daily interaction sums with day-over-day change, newest first.
pub fn growth_table(rows: &[GrowthRow]) -> Table {
    let mut headers: Vec<&str> = vec!["Date"];
    for m in INTERACTION_METRICS.iter() {
        headers.push(m.label());
        headers.push("Change");
    }
    let mut table = Table::new("Interaction growth", &headers);
    for row in rows.iter().rev() {
        let mut cells = vec![Cell::text(row.date.to_string())];
        for (metric, pct) in &row.growth {
            cells.push(Cell::number(format_count(row.totals.get(*metric))));
            cells.push(Cell::number(format_signed_percent(*pct)));
        }
        table.push(cells);
    }
    table
}

// ── Click tables ──────────────────────────────────────────────────────────────

pub fn daily_clicks_table(rows: &[DailyClickMetrics]) -> Table {
    let mut table = Table::new(
        "Daily clicks",
        &["Date", "Clicks", "Change", "Visitors", "Change", "Sessions", "Change", "Clicks / visitor"],
    );
    for row in rows.iter().rev() {
        table.push(vec![
            Cell::text(row.date.to_string()),
            Cell::number(format_count(row.total_clicks as i64)),
            Cell::number(format_signed_percent(row.total_clicks_pct)),
            Cell::number(format_count(row.unique_visitors as i64)),
            Cell::number(format_signed_percent(row.unique_visitors_pct)),
            Cell::number(format_count(row.unique_sessions as i64)),
            Cell::number(format_signed_percent(row.unique_sessions_pct)),
            Cell::number(format_optional(row.clicks_per_visitor, 2)),
        ]);
    }
    table
}

pub fn top_pages_table(rows: &[PageStats]) -> Table {
    let mut table = Table::new(
        "Top pages",
        &["Page type", "Clicks", "Sessions", "Visitors", "Clicks / session", "Clicks / visitor"],
    );
    for row in rows {
        table.push(vec![
            Cell::text(row.page_type.as_str()),
            Cell::number(format_count(row.total_clicks as i64)),
            Cell::number(format_count(row.unique_sessions as i64)),
            Cell::number(format_count(row.unique_visitors as i64)),
            Cell::number(format_optional(row.clicks_per_session, 2)),
            Cell::number(format_optional(row.clicks_per_visitor, 2)),
        ]);
    }
    table
}

/// Daily PV / UV / views of one link, newest first.
pub fn link_conversion_table(link: &LinkConversion) -> Table {
    let mut table = Table::new(
        format!("{} → {}", link.url, link.target_group),
        &["Date", "PV", "UV", "Views", "PV rate", "UV rate"],
    );
    for day in link.daily.iter().rev() {
        table.push(vec![
            Cell::text(day.date.to_string()),
            Cell::number(format_count(day.pv as i64)),
            Cell::number(format_count(day.uv as i64)),
            Cell::number(format_count(day.views)),
            Cell::number(format_percent(day.pv_rate)),
            Cell::number(format_percent(day.uv_rate)),
        ]);
    }
    table
}

pub fn group_mapping_table(rows: &[GroupMapping]) -> Table {
    let mut table = Table::new("Group to page type", &["Group", "Accounts", "New views", "Page type"]);
    for row in rows {
        table.push(vec![
            Cell::text(row.group.clone()),
            Cell::number(format_count(row.accounts as i64)),
            Cell::number(format_count(row.view_diff)),
            Cell::text(row.page_type.as_str()),
        ]);
    }
    table
}

// ── Tests ─────────────────────────────────────────────────────────────────────
