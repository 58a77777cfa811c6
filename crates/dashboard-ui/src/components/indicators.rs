use dashboard_core::calculations::Correlation;
use dashboard_core::formatting::{
    format_count, format_number, format_optional, format_percent, format_signed_count,
    format_signed_percent,
};
use dashboard_core::models::Metric;
use dashboard_data::analysis::{
    DataSummary, DayComparison, IssueKind, LatestDayIncrements, SourceIssue,
};
use dashboard_data::clicks::{ClickKeyMetrics, LinkConversion};
use serde::Serialize;

use crate::themes::Theme;

// ── MetricCard ───────────────────────────────────────────────────────────────

/// One headline figure: a label, a formatted value and an optional change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: String,
    pub value: String,
    /// e.g. `"+12.5% (+30)"`.
    pub delta: Option<String>,
    pub delta_color: &'static str,
    pub hint: Option<String>,
}

impl MetricCard {
    pub fn new(label: impl Into<String>, value: impl Into<String>, theme: &Theme) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            delta: None,
            delta_color: theme.muted,
            hint: None,
        }
    }

    /// Attach a change: percent (may be undefined) and absolute difference.
    pub fn with_change(mut self, pct: Option<f64>, difference: i64, theme: &Theme) -> Self {
        self.delta = Some(format!(
            "{} ({})",
            format_signed_percent(pct),
            format_signed_count(difference)
        ));
        self.delta_color = match pct {
            Some(_) => theme.change_color(pct),
            None => theme.change_color(Some(difference as f64)),
        };
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Cards of the data summary.
pub fn summary_cards(summary: &DataSummary, theme: &Theme) -> Vec<MetricCard> {
    let range = summary
        .date_range
        .map(|(start, end)| format!("{start} → {end}"))
        .unwrap_or_else(|| "no dates".to_string());
    vec![
        MetricCard::new("Records", format_count(summary.total_records as i64), theme),
        MetricCard::new("Accounts", format_count(summary.accounts as i64), theme),
        MetricCard::new("Total Views", format_count(summary.total_views), theme),
        MetricCard::new("Date Range", range, theme),
        MetricCard::new(
            "Match Rate",
            format!("{}%", format_number(summary.stats.match_rate(), 1)),
            theme,
        )
        .with_hint(format!(
            "{} matched / {} unmatched",
            format_count(summary.stats.matched as i64),
            format_count(summary.stats.unmatched as i64)
        )),
    ]
}

/// Cards comparing the latest date with the day before.
pub fn comparison_cards(comparison: &DayComparison, theme: &Theme) -> Vec<MetricCard> {
    comparison
        .rows
        .iter()
        .map(|row| {
            MetricCard::new(row.item.label(), format_count(row.current), theme)
                .with_change(row.pct, row.difference, theme)
                .with_hint(format!("{}: {}", comparison.previous, format_count(row.previous)))
        })
        .collect()
}

/// Cards of the diff sums and clicks on one day.
pub fn increment_cards(increments: &LatestDayIncrements, theme: &Theme) -> Vec<MetricCard> {
    let mut cards: Vec<MetricCard> = Metric::DIFFS
        .iter()
        .map(|m| {
            MetricCard::new(
                m.label(),
                format_signed_count(increments.diffs.get(*m)),
                theme,
            )
        })
        .collect();
    cards.push(MetricCard::new("Clicks", format_count(increments.clicks as i64), theme));
    cards
}

/// Cards of the click key metrics.
pub fn click_cards(key: &ClickKeyMetrics, theme: &Theme) -> Vec<MetricCard> {
    vec![
        MetricCard::new("Total Clicks", format_count(key.total_clicks as i64), theme),
        MetricCard::new("Unique Visitors", format_count(key.unique_visitors as i64), theme),
        MetricCard::new("Unique Sessions", format_count(key.unique_sessions as i64), theme),
        MetricCard::new("Page Types", format_count(key.page_types as i64), theme),
        MetricCard::new("Clicks / Visitor", format_optional(key.clicks_per_visitor, 2), theme),
        MetricCard::new("Clicks / Session", format_optional(key.clicks_per_session, 2), theme),
    ]
}

/// Cards of one link's latest day.
pub fn link_cards(conversion: &LinkConversion, theme: &Theme) -> Vec<MetricCard> {
    let Some(latest) = conversion.latest() else {
        return Vec::new();
    };
    vec![
        MetricCard::new("PV", format_count(latest.pv as i64), theme)
            .with_hint(format!("total {}", format_count(conversion.total_pv as i64))),
        MetricCard::new("UV", format_count(latest.uv as i64), theme)
            .with_hint(format!("total {}", format_count(conversion.total_uv as i64))),
        MetricCard::new("Views", format_count(latest.views), theme)
            .with_hint(format!("total {}", format_count(conversion.total_views))),
        MetricCard::new("PV Rate", format_percent(latest.pv_rate), theme)
            .with_hint(format!("avg {}", format_percent(conversion.avg_pv_rate))),
        MetricCard::new("UV Rate", format_percent(latest.uv_rate), theme)
            .with_hint(format!("avg {}", format_percent(conversion.avg_uv_rate))),
    ]
}

// ── CorrelationBadge ─────────────────────────────────────────────────────────

/// Correlation value plus a plain-language reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationBadge {
    /// `0.873` or `N/A`.
    pub value: String,
    pub description: String,
}

impl CorrelationBadge {
    pub fn new(correlation: &Correlation) -> Self {
        let description = match correlation {
            Correlation::Defined(r) => {
                let strength = match r.abs() {
                    a if a >= 0.7 => "strong",
                    a if a >= 0.4 => "moderate",
                    a if a >= 0.2 => "weak",
                    _ => "no clear",
                };
                let direction = if *r < 0.0 { "negative" } else { "positive" };
                if strength == "no clear" {
                    "no clear linear relationship".to_string()
                } else {
                    format!("{strength} {direction} correlation")
                }
            }
            Correlation::Undefined(reason) => format!("undefined: {reason}"),
        };
        Self {
            value: correlation.to_string(),
            description,
        }
    }
}

// ── Banner ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerLevel {
    Info,
    Warning,
    Error,
}

/// A message shown above the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub message: String,
}

impl Banner {
    pub fn new(level: BannerLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// One banner per failed source. Missing files are warnings; schema and
/// read failures are errors.
pub fn issue_banners(issues: &[SourceIssue]) -> Vec<Banner> {
    issues
        .iter()
        .map(|issue| {
            let level = match issue.kind {
                IssueKind::MissingFile => BannerLevel::Warning,
                IssueKind::Schema | IssueKind::Unreadable => BannerLevel::Error,
            };
            Banner::new(level, issue.message.clone())
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
