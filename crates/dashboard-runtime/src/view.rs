//! View requests and the assembled dashboard view model.
//!
//! A [`ViewRequest`] holds the widget state of one page load (date range,
//! group selection, metric pickers). [`build_view`] runs every analysis over
//! an immutable [`Snapshot`] and returns a [`DashboardView`] that the UI
//! renders as HTML or serves as JSON.

use chrono::{NaiveDate, Utc};
use dashboard_core::dates::parse_iso_date;
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::{EfficiencyMetric, MergedRecord, Metric, PageType};
use dashboard_core::page_types::MappingConfig;
use dashboard_data::aggregator::{
    DailyEfficiency, DailyValues, EfficiencyDistribution, GroupDailyValue, GroupDailyValues,
    GroupPerformance, GrowthRow, MetricTotals, MetricsAggregator,
};
use dashboard_data::analysis::{
    data_summary, day_comparison, latest_day_increments, DataSummary, DayComparison,
    LatestDayIncrements, Snapshot, SourceFiles, SourceIssue,
};
use dashboard_data::clicks::{
    filter_events, ClickKeyMetrics, ClicksAnalyzer, ClicksVsMetric, ClicksVsViews,
    DailyClickMetrics, GroupMapping, LinkConversion, PageStats,
};
use dashboard_data::filter::{
    available_groups, date_bounds, latest_date, relabel_by_selection, DateRange, Filter,
    GroupSelection,
};
use dashboard_data::merge::AccountDirectory;
use dashboard_data::ranking::{top_accounts, RankedAccount, DEFAULT_TOP_N};
use serde::Serialize;

/// Number of rows in the top pages table.
pub const TOP_PAGES: usize = 10;

// ── ViewRequest ───────────────────────────────────────────────────────────────

/// Widget state of one dashboard render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRequest {
    pub range: DateRange,
    pub groups: GroupSelection,
    /// Metric of the trend chart.
    pub metric: Metric,
    pub efficiency: EfficiencyMetric,
    /// Metric the top accounts are ranked by.
    pub rank_metric: Metric,
    /// Ranking date; the latest filtered date when `None`.
    pub rank_date: Option<NaiveDate>,
    pub top_n: usize,
    /// Page type of the clicks-vs-views chart; every type when `None`.
    pub page_type: Option<PageType>,
    /// Metric compared with daily clicks.
    pub click_metric: Metric,
}

impl Default for ViewRequest {
    fn default() -> Self {
        Self {
            range: DateRange::all(),
            groups: GroupSelection::default(),
            metric: Metric::ViewDiff,
            efficiency: EfficiencyMetric::ViewPerPost,
            rank_metric: Metric::ViewDiff,
            rank_date: None,
            top_n: DEFAULT_TOP_N,
            page_type: None,
            click_metric: Metric::ViewDiff,
        }
    }
}

impl ViewRequest {
    /// Build a request from decoded query pairs.
    ///
    /// `groups` may repeat. Blank values keep the default. Unknown keys are
    /// ignored; malformed values are errors.
    pub fn from_pairs<K, V>(pairs: &[(K, V)]) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::default();
        let mut start = None;
        let mut end = None;
        let mut groups: Vec<&str> = Vec::new();

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "start" => start = Some(parse_iso_date(value)?),
                "end" => end = Some(parse_iso_date(value)?),
                "groups" => groups.push(value),
                "metric" => request.metric = value.parse()?,
                "efficiency" => request.efficiency = value.parse()?,
                "rank_metric" => request.rank_metric = value.parse()?,
                "rank_date" => request.rank_date = Some(parse_iso_date(value)?),
                "top_n" => {
                    request.top_n = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| DashboardError::Config(format!("invalid top_n: {value}")))?;
                }
                "page_type" if value.eq_ignore_ascii_case("all") => request.page_type = None,
                "page_type" => request.page_type = Some(value.parse()?),
                "click_metric" => request.click_metric = value.parse()?,
                _ => {}
            }
        }

        request.range = DateRange::new(start, end)?;
        request.groups = GroupSelection::new(groups);
        Ok(request)
    }

    pub fn filter(&self) -> Filter {
        Filter::new(self.range, self.groups.clone())
    }
}

// ── DashboardView ─────────────────────────────────────────────────────────────

/// Metric sections, computed from the filtered merged table.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsView {
    pub trend: Vec<(NaiveDate, i64)>,
    /// Trend per group, rows relabelled by the selected keywords.
    pub group_trend: Vec<GroupDailyValue>,
    pub efficiency: Vec<DailyEfficiency>,
    /// Date of the group tables: the latest filtered date.
    pub latest: Option<NaiveDate>,
    pub group_performance: Vec<GroupPerformance>,
    pub efficiency_distribution: Vec<EfficiencyDistribution>,
    /// Increments inside the date range, measured against the full history
    /// of the selected groups.
    pub daily_increments: Vec<DailyValues>,
    /// Same increments per relabelled group, zero-filled over date × group.
    pub group_increments: Vec<GroupDailyValues>,
    pub growth: Vec<GrowthRow>,
    pub totals: MetricTotals,
    pub group_counts: Vec<(String, usize)>,
    pub top_accounts: Vec<RankedAccount>,
}

/// Click sections, computed from the clicks inside the date range.
#[derive(Debug, Clone, Serialize)]
pub struct ClicksView {
    pub key_metrics: Option<ClickKeyMetrics>,
    pub daily: Vec<DailyClickMetrics>,
    pub clicks_vs_views: ClicksVsViews,
    /// `(date, clicks, views)` of [`Self::clicks_vs_views`] summed per date.
    pub daily_comparison: Vec<(NaiveDate, i64, i64)>,
    pub clicks_vs_metric: ClicksVsMetric,
    pub top_pages: Vec<PageStats>,
    pub link_conversion: Vec<LinkConversion>,
    pub group_mapping: Vec<GroupMapping>,
}

/// Everything one page render shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub request: ViewRequest,
    pub generated_at: String,
    pub snapshot_loaded_at: String,
    pub files: SourceFiles,
    /// Failed sources, shown as banners.
    pub issues: Vec<SourceIssue>,
    pub available_groups: Vec<String>,
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
    /// Summary of the whole merged table; `None` when the merge failed.
    pub summary: Option<DataSummary>,
    pub comparison: Option<DayComparison>,
    pub increments: Option<LatestDayIncrements>,
    pub filtered_rows: usize,
    /// `None` when the merge failed.
    pub metrics: Option<MetricsView>,
    /// `None` when the click log failed.
    pub clicks: Option<ClicksView>,
}

impl DashboardView {
    /// `true` when the merged table loaded but the filter left no rows.
    pub fn is_empty_result(&self) -> bool {
        self.metrics.is_some() && self.filtered_rows == 0
    }
}

// ── Assembly ──────────────────────────────────────────────────────────────────

/// Rows of the merged table passing the request's filter.
pub fn filtered_records(
    snapshot: &Snapshot,
    request: &ViewRequest,
) -> std::result::Result<Vec<MergedRecord>, SourceIssue> {
    let table = snapshot.merged.as_ref().map_err(Clone::clone)?;
    Ok(request.filter().apply(&table.records))
}

/// Run every analysis for `request` over `snapshot`.
pub fn build_view(snapshot: &Snapshot, request: &ViewRequest, mappings: &MappingConfig) -> DashboardView {
    let all_records = snapshot.records();
    let filtered = filtered_records(snapshot, request).ok();
    let events = snapshot
        .clicks
        .as_ref()
        .ok()
        .map(|events| filter_events(events, &request.range));

    let history = Filter::new(DateRange::all(), request.groups.clone()).apply(all_records);
    let metrics = filtered
        .as_ref()
        .map(|records| build_metrics(records, &history, request, &snapshot.directory));
    let clicks = events.as_ref().map(|events| {
        build_clicks(
            events,
            filtered.as_deref().unwrap_or(&[]),
            request,
            mappings,
        )
    });

    let merged_ok = snapshot.merged.is_ok();
    DashboardView {
        request: request.clone(),
        generated_at: Utc::now().to_rfc3339(),
        snapshot_loaded_at: snapshot.metadata.generated_at.clone(),
        files: snapshot.files.clone(),
        issues: snapshot.issues.clone(),
        available_groups: available_groups(all_records),
        date_bounds: date_bounds(all_records),
        summary: merged_ok.then(|| data_summary(all_records)),
        comparison: day_comparison(all_records, snapshot.click_events()),
        increments: filtered.as_ref().and_then(|records| {
            latest_day_increments(records, events.as_deref().unwrap_or(&[]), None)
        }),
        filtered_rows: filtered.as_ref().map_or(0, Vec::len),
        metrics,
        clicks,
    }
}

/// `records` is the date- and group-filtered table; `history` only has the
/// group filter applied.
fn build_metrics(
    records: &[MergedRecord],
    history: &[MergedRecord],
    request: &ViewRequest,
    directory: &AccountDirectory,
) -> MetricsView {
    let latest = latest_date(records);
    let relabelled = relabel_by_selection(records, &request.groups);
    MetricsView {
        trend: MetricsAggregator::daily_series(records, request.metric),
        group_trend: MetricsAggregator::aggregate_daily_by_group(&relabelled, request.metric),
        efficiency: MetricsAggregator::daily_efficiency(records, request.efficiency),
        latest,
        group_performance: latest
            .map(|d| MetricsAggregator::group_performance(&relabelled, d))
            .unwrap_or_default(),
        efficiency_distribution: latest
            .map(|d| MetricsAggregator::efficiency_distribution(&relabelled, d, request.efficiency))
            .unwrap_or_default(),
        daily_increments: MetricsAggregator::daily_increments(history, &request.range),
        group_increments: MetricsAggregator::group_daily_increments(
            &relabel_by_selection(history, &request.groups),
            &request.range,
        ),
        growth: MetricsAggregator::interaction_growth(records),
        totals: MetricsAggregator::calculate_totals(records),
        group_counts: MetricsAggregator::group_statistics(&relabelled),
        top_accounts: top_accounts(
            records,
            request.rank_date,
            request.rank_metric,
            request.top_n,
            Some(directory),
        ),
    }
}

fn build_clicks(
    events: &[dashboard_core::models::ClickEvent],
    records: &[MergedRecord],
    request: &ViewRequest,
    mappings: &MappingConfig,
) -> ClicksView {
    let clicks_vs_views = ClicksAnalyzer::clicks_vs_views(
        events,
        records,
        &mappings.page_type_rules,
        request.page_type,
    );
    ClicksView {
        key_metrics: ClicksAnalyzer::key_metrics(events, None),
        daily: ClicksAnalyzer::daily_click_metrics(events),
        daily_comparison: ClicksAnalyzer::daily_comparison(&clicks_vs_views),
        clicks_vs_views,
        clicks_vs_metric: ClicksAnalyzer::clicks_vs_metric(events, records, request.click_metric),
        top_pages: ClicksAnalyzer::top_pages(events, None, TOP_PAGES),
        link_conversion: ClicksAnalyzer::link_conversion(
            events,
            records,
            &mappings.link_rules,
            &request.range,
        ),
        group_mapping: ClicksAnalyzer::group_mapping_summary(records, &mappings.page_type_rules),
    }
}
