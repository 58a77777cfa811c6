//! Full-page rendering: turns a [`DashboardView`] into the tera context of
//! `templates/dashboard.html`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use dashboard_core::models::{EfficiencyMetric, Metric, PageType};
use dashboard_runtime::view::{ClicksView, DashboardView, MetricsView, ViewRequest};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::debug;

use crate::components::chart::{align_by_date, BarChart, LineChart, Series};
use crate::components::header::{Header, HeaderContext, TITLE};
use crate::components::indicators::{
    click_cards, comparison_cards, increment_cards, issue_banners, link_cards, summary_cards, Banner,
    BannerLevel, CorrelationBadge, MetricCard,
};
use crate::table_view::{
    daily_clicks_table, efficiency_distribution_table, group_mapping_table, group_performance_table,
    growth_table, link_conversion_table, top_accounts_table, top_pages_table, Table,
};
use crate::themes::Theme;

const TEMPLATE_NAME: &str = "dashboard.html";
const TEMPLATE: &str = include_str!("../templates/dashboard.html");
const MACROS: &str = include_str!("../templates/macros.html");

// ── Context types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    fn new(value: impl Into<String>, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            selected,
        }
    }
}

/// Current widget values and their choices.
#[derive(Debug, Clone, Serialize)]
pub struct FilterForm {
    pub start: String,
    pub end: String,
    pub min_date: String,
    pub max_date: String,
    pub groups: Vec<SelectOption>,
    pub metrics: Vec<SelectOption>,
    pub efficiency: Vec<SelectOption>,
    pub rank_metrics: Vec<SelectOption>,
    pub rank_date: String,
    pub top_n: usize,
    pub page_types: Vec<SelectOption>,
    pub click_metrics: Vec<SelectOption>,
}

/// A chart with its heading and an optional caption.
#[derive(Debug, Clone, Serialize)]
pub struct ChartBlock {
    pub title: String,
    pub svg: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationBlock {
    pub label: String,
    pub badge: CorrelationBadge,
}

/// Conversion section of one tracked link.
#[derive(Debug, Clone, Serialize)]
pub struct LinkBlock {
    pub url: String,
    pub target_group: String,
    pub cards: Vec<MetricCard>,
    pub chart: ChartBlock,
    pub table: Table,
}

/// Everything the page template reads.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub title: &'static str,
    pub theme: &'static str,
    pub css_variables: String,
    pub header: HeaderContext,
    pub banners: Vec<Banner>,
    pub form: FilterForm,
    pub empty_result: bool,
    pub filtered_rows: usize,
    pub summary_cards: Vec<MetricCard>,
    pub comparison_title: Option<String>,
    pub comparison_cards: Vec<MetricCard>,
    pub increments_title: Option<String>,
    pub increment_cards: Vec<MetricCard>,
    pub metrics_available: bool,
    pub metric_charts: Vec<ChartBlock>,
    pub metric_tables: Vec<Table>,
    pub clicks_available: bool,
    pub click_cards: Vec<MetricCard>,
    pub click_charts: Vec<ChartBlock>,
    pub correlations: Vec<CorrelationBlock>,
    pub click_tables: Vec<Table>,
    pub links: Vec<LinkBlock>,
}

impl PageContext {
    /// Assemble the context of one render. `request_error` is a rejected
    /// query string; the view then shows the default request.
    pub fn build(view: &DashboardView, theme: &Theme, timezone: &str, request_error: Option<&str>) -> Self {
        let mut banners = Vec::new();
        if let Some(err) = request_error {
            banners.push(Banner::new(
                BannerLevel::Error,
                format!("Invalid filter: {err}. Showing the default view."),
            ));
        }
        banners.extend(issue_banners(&view.issues));
        if view.is_empty_result() {
            banners.push(Banner::new(
                BannerLevel::Info,
                "No rows match the current filters.",
            ));
        }

        let header = Header::new(timezone, &view.snapshot_loaded_at, &view.files).to_context();

        let (metrics_charts, metrics_tables) = match &view.metrics {
            Some(metrics) => (
                metric_charts(metrics, &view.request, theme),
                metric_tables(metrics, &view.request),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let (clicks_cards, clicks_charts, clicks_correlations, clicks_tables, links) = match &view.clicks {
            Some(clicks) => (
                clicks
                    .key_metrics
                    .as_ref()
                    .map(|k| click_cards(k, theme))
                    .unwrap_or_default(),
                click_charts(clicks, &view.request, theme),
                correlations(clicks, &view.request),
                click_tables(clicks),
                link_blocks(clicks, theme),
            ),
            None => Default::default(),
        };

        Self {
            title: TITLE,
            theme: theme.name,
            css_variables: theme.css_variables(),
            header,
            banners,
            form: filter_form(view),
            empty_result: view.is_empty_result(),
            filtered_rows: view.filtered_rows,
            summary_cards: view
                .summary
                .as_ref()
                .map(|s| summary_cards(s, theme))
                .unwrap_or_default(),
            comparison_title: view
                .comparison
                .as_ref()
                .map(|c| format!("{} vs {}", c.latest, c.previous)),
            comparison_cards: view
                .comparison
                .as_ref()
                .map(|c| comparison_cards(c, theme))
                .unwrap_or_default(),
            increments_title: view.increments.as_ref().map(|i| format!("Increments on {}", i.date)),
            increment_cards: view
                .increments
                .as_ref()
                .map(|i| increment_cards(i, theme))
                .unwrap_or_default(),
            metrics_available: view.metrics.is_some(),
            metric_charts: metrics_charts,
            metric_tables: metrics_tables,
            clicks_available: view.clicks.is_some(),
            click_cards: clicks_cards,
            click_charts: clicks_charts,
            correlations: clicks_correlations,
            click_tables: clicks_tables,
            links,
        }
    }
}

// ── Renderer ──────────────────────────────────────────────────────────────────

/// Compiled page template.
pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    pub fn new() -> tera::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![("macros.html", MACROS), (TEMPLATE_NAME, TEMPLATE)])?;
        debug!(template = TEMPLATE_NAME, "page template compiled");
        Ok(Self { tera })
    }

    pub fn render(&self, page: &PageContext) -> tera::Result<String> {
        let context = Context::from_serialize(page)?;
        self.tera.render(TEMPLATE_NAME, &context)
    }

    /// Build the context for `view` and render it.
    pub fn render_view(
        &self,
        view: &DashboardView,
        theme: &Theme,
        timezone: &str,
        request_error: Option<&str>,
    ) -> tera::Result<String> {
        self.render(&PageContext::build(view, theme, timezone, request_error))
    }
}

// ── Form ──────────────────────────────────────────────────────────────────────

fn date_str(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

fn metric_options(metrics: &[Metric], selected: Metric) -> Vec<SelectOption> {
    metrics
        .iter()
        .map(|m| SelectOption::new(m.as_str(), m.label(), *m == selected))
        .collect()
}

fn filter_form(view: &DashboardView) -> FilterForm {
    let request = &view.request;
    let all_metrics: Vec<Metric> = Metric::DIFFS.iter().chain(Metric::COUNTS.iter()).copied().collect();
    let mut page_types = vec![SelectOption::new("all", "All", request.page_type.is_none())];
    page_types.extend(
        PageType::ALL
            .iter()
            .map(|p| SelectOption::new(p.as_str(), p.as_str(), request.page_type == Some(*p))),
    );

    FilterForm {
        start: date_str(request.range.start()),
        end: date_str(request.range.end()),
        min_date: date_str(view.date_bounds.map(|b| b.0)),
        max_date: date_str(view.date_bounds.map(|b| b.1)),
        groups: view
            .available_groups
            .iter()
            .map(|g| {
                let selected = request.groups.keywords().iter().any(|k| k == g);
                SelectOption::new(g.clone(), g.clone(), selected)
            })
            .collect(),
        metrics: metric_options(&all_metrics, request.metric),
        efficiency: EfficiencyMetric::ALL
            .iter()
            .map(|m| SelectOption::new(m.as_str(), m.label(), *m == request.efficiency))
            .collect(),
        rank_metrics: metric_options(&all_metrics, request.rank_metric),
        rank_date: date_str(request.rank_date),
        top_n: request.top_n,
        page_types,
        click_metrics: metric_options(&all_metrics, request.click_metric),
    }
}

// ── Metric sections ───────────────────────────────────────────────────────────

fn date_map<I>(points: I) -> BTreeMap<NaiveDate, f64>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    points.into_iter().collect()
}

fn metric_charts(metrics: &MetricsView, request: &ViewRequest, theme: &Theme) -> Vec<ChartBlock> {
    let mut charts = Vec::new();

    let (labels, values) = align_by_date(&[date_map(metrics.trend.iter().map(|(d, v)| (*d, *v as f64)))]);
    let trend = values
        .into_iter()
        .fold(LineChart::new(request.metric.label(), labels), |chart, v| {
            chart.with_series(Series::new(request.metric.label(), v))
        });
    charts.push(ChartBlock {
        title: format!("Daily {}", request.metric.label()),
        svg: trend.render(theme),
        caption: None,
    });

    let mut by_group: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for row in &metrics.group_trend {
        by_group
            .entry(row.group.as_str())
            .or_default()
            .insert(row.date, row.value as f64);
    }
    let names: Vec<&str> = by_group.keys().copied().collect();
    let (labels, values) = align_by_date(&by_group.into_values().collect::<Vec<_>>());
    let group_chart = names
        .into_iter()
        .zip(values)
        .fold(LineChart::new("by group", labels), |chart, (name, v)| {
            chart.with_series(Series::new(name, v))
        });
    charts.push(ChartBlock {
        title: format!("{} by group", request.metric.label()),
        svg: group_chart.render(theme),
        caption: None,
    });

    let (labels, values) = align_by_date(&[date_map(
        metrics
            .efficiency
            .iter()
            .filter_map(|e| e.value.map(|v| (e.date, v))),
    )]);
    let efficiency = values
        .into_iter()
        .fold(LineChart::new(request.efficiency.label(), labels), |chart, v| {
            chart.with_series(Series::new(request.efficiency.label(), v))
        });
    charts.push(ChartBlock {
        title: request.efficiency.label().to_string(),
        svg: efficiency.render(theme),
        caption: Some("Mean per-account ratio over accounts that posted".to_string()),
    });

    let increments: Vec<BTreeMap<NaiveDate, f64>> = Metric::COUNTS
        .iter()
        .map(|m| {
            date_map(
                metrics
                    .daily_increments
                    .iter()
                    .map(|row| (row.date, row.totals.get(*m) as f64)),
            )
        })
        .collect();
    let (labels, values) = align_by_date(&increments);
    let increments_chart = Metric::COUNTS
        .iter()
        .zip(values)
        .fold(LineChart::new("Daily increments", labels), |chart, (m, v)| {
            chart.with_series(Series::new(m.label(), v))
        });
    charts.push(ChartBlock {
        title: "Daily increments".to_string(),
        svg: increments_chart.render(theme),
        caption: None,
    });

    if Metric::COUNTS.contains(&request.metric) {
        let mut by_group: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for row in &metrics.group_increments {
            by_group
                .entry(row.group.as_str())
                .or_default()
                .insert(row.date, row.totals.get(request.metric) as f64);
        }
        let names: Vec<&str> = by_group.keys().copied().collect();
        let (labels, values) = align_by_date(&by_group.into_values().collect::<Vec<_>>());
        let chart = names
            .into_iter()
            .zip(values)
            .fold(LineChart::new("increments by group", labels), |chart, (name, v)| {
                chart.with_series(Series::new(name, v))
            });
        charts.push(ChartBlock {
            title: format!("{} increments by group", request.metric.label()),
            svg: chart.render(theme),
            caption: None,
        });
    }

    let bars = metrics
        .group_counts
        .iter()
        .map(|(g, n)| (g.clone(), *n as f64))
        .collect();
    charts.push(ChartBlock {
        title: "Rows per group".to_string(),
        svg: BarChart::new("Rows per group", bars).render(theme),
        caption: None,
    });

    charts
}

fn metric_tables(metrics: &MetricsView, request: &ViewRequest) -> Vec<Table> {
    let mut tables = vec![top_accounts_table(&metrics.top_accounts, request.rank_metric)];
    if let Some(date) = metrics.latest {
        let mut performance = group_performance_table(&metrics.group_performance);
        performance.title = format!("{} on {}", performance.title, date);
        tables.push(performance);
        let mut distribution =
            efficiency_distribution_table(&metrics.efficiency_distribution, request.efficiency);
        distribution.title = format!("{} on {}", distribution.title, date);
        tables.push(distribution);
    }
    tables.push(growth_table(&metrics.growth));
    tables
}

// ── Click sections ────────────────────────────────────────────────────────────

fn click_charts(clicks: &ClicksView, request: &ViewRequest, theme: &Theme) -> Vec<ChartBlock> {
    let mut charts = Vec::new();

    let daily: Vec<BTreeMap<NaiveDate, f64>> = vec![
        date_map(clicks.daily.iter().map(|d| (d.date, d.total_clicks as f64))),
        date_map(clicks.daily.iter().map(|d| (d.date, d.unique_visitors as f64))),
        date_map(clicks.daily.iter().map(|d| (d.date, d.unique_sessions as f64))),
    ];
    let (labels, values) = align_by_date(&daily);
    let chart = ["Clicks", "Visitors", "Sessions"]
        .into_iter()
        .zip(values)
        .fold(LineChart::new("Daily clicks", labels), |chart, (name, v)| {
            chart.with_series(Series::new(name, v))
        });
    charts.push(ChartBlock {
        title: "Daily clicks".to_string(),
        svg: chart.render(theme),
        caption: None,
    });

    let page_label = request.page_type.map_or("all page types", PageType::as_str);
    charts.push(ChartBlock {
        title: format!("Clicks vs new views ({page_label})"),
        svg: dual_axis_chart(
            "Clicks vs new views",
            clicks.daily_comparison.iter().map(|(d, c, v)| (*d, *c, *v)),
            "New views",
            theme,
        ),
        caption: None,
    });

    charts.push(ChartBlock {
        title: format!("Clicks vs {}", request.click_metric.label()),
        svg: dual_axis_chart(
            "Clicks vs metric",
            clicks.clicks_vs_metric.rows.iter().copied(),
            request.click_metric.label(),
            theme,
        ),
        caption: Some("Dates present in both sources only".to_string()),
    });

    charts
}

/// Clicks on the left axis, `other` on the right.
fn dual_axis_chart<I>(title: &str, rows: I, other: &str, theme: &Theme) -> String
where
    I: Iterator<Item = (NaiveDate, i64, i64)>,
{
    let mut clicks = BTreeMap::new();
    let mut values = BTreeMap::new();
    for (date, c, v) in rows {
        clicks.insert(date, c as f64);
        values.insert(date, v as f64);
    }
    let (labels, mut series) = align_by_date(&[clicks, values]);
    let right = series.pop().unwrap_or_default();
    let left = series.pop().unwrap_or_default();
    LineChart::new(title, labels)
        .with_series(Series::new("Clicks", left))
        .with_series(Series::new(other, right).on_secondary_axis())
        .with_axis_labels("Clicks", Some(other.to_string()))
        .render(theme)
}

fn correlations(clicks: &ClicksView, request: &ViewRequest) -> Vec<CorrelationBlock> {
    vec![
        CorrelationBlock {
            label: "Clicks vs new views".to_string(),
            badge: CorrelationBadge::new(&clicks.clicks_vs_views.correlation),
        },
        CorrelationBlock {
            label: format!("Clicks vs {}", request.click_metric.label()),
            badge: CorrelationBadge::new(&clicks.clicks_vs_metric.correlation),
        },
    ]
}

fn click_tables(clicks: &ClicksView) -> Vec<Table> {
    let mut pages = top_pages_table(&clicks.top_pages);
    if let Some(key) = &clicks.key_metrics {
        pages.title = format!("{} on {}", pages.title, key.date);
    }
    vec![
        daily_clicks_table(&clicks.daily),
        pages,
        group_mapping_table(&clicks.group_mapping),
    ]
}

fn link_blocks(clicks: &ClicksView, theme: &Theme) -> Vec<LinkBlock> {
    clicks
        .link_conversion
        .iter()
        .map(|link| {
            let rates = [
                date_map(link.daily.iter().filter_map(|d| d.pv_rate.map(|r| (d.date, r)))),
                date_map(link.daily.iter().filter_map(|d| d.uv_rate.map(|r| (d.date, r)))),
            ];
            let (labels, values) = align_by_date(&rates);
            let chart = ["PV rate %", "UV rate %"]
                .into_iter()
                .zip(values)
                .fold(LineChart::new(&link.url, labels), |chart, (name, v)| {
                    chart.with_series(Series::new(name, v))
                });
            LinkBlock {
                url: link.url.clone(),
                target_group: link.target_group.clone(),
                cards: link_cards(link, theme),
                chart: ChartBlock {
                    title: "Conversion rate".to_string(),
                    svg: chart.render(theme),
                    caption: None,
                },
                table: link_conversion_table(link),
            }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_core::page_types::MappingConfig;
    use dashboard_data::analysis::{
        MergedTable, Snapshot, SnapshotMetadata, SourceFiles, SourceIssue, IssueKind,
    };
    use dashboard_data::merge::{AccountDirectory, MergeStats};
    use dashboard_core::models::{DataSource, MergedRecord, MetricRecord};
    use dashboard_runtime::view::build_view;

    fn record(account: &str, d: u32, group: &str, view_diff: i64) -> MergedRecord {
        let mut metrics = MetricRecord::empty(account, NaiveDate::from_ymd_opt(2025, 7, d).unwrap());
        metrics.view_diff = view_diff;
        metrics.view_count = view_diff * 10;
        metrics.post_count = 1;
        MergedRecord {
            metrics,
            group: group.to_string(),
            matched: group != "Unknown",
        }
    }

    fn snapshot(records: Vec<MergedRecord>, clicks_missing: bool) -> Snapshot {
        let stats = MergeStats::from_records(&records);
        let metric_rows = records.len();
        let issue = SourceIssue {
            source: DataSource::Clicks,
            kind: IssueKind::MissingFile,
            message: "Missing clicks file: data/clicks".to_string(),
        };
        Snapshot {
            merged: Ok(MergedTable { records, stats }),
            clicks: if clicks_missing { Err(issue.clone()) } else { Ok(Vec::new()) },
            directory: AccountDirectory::default(),
            files: SourceFiles::default(),
            issues: if clicks_missing { vec![issue] } else { Vec::new() },
            metadata: SnapshotMetadata {
                generated_at: "2025-07-08T09:00:00+00:00".to_string(),
                metric_rows,
                accounts: 0,
                click_events: 0,
                load_time_seconds: 0.0,
            },
        }
    }

    #[test]
    fn test_renders_full_page() {
        let snap = snapshot(
            vec![
                record("A", 7, "groupX", 80),
                record("A", 8, "groupX", 100),
                record("B", 8, "Unknown", 50),
            ],
            true,
        );
        let view = build_view(&snap, &ViewRequest::default(), &MappingConfig::default());
        let renderer = PageRenderer::new().unwrap();
        let html = renderer.render_view(&view, &Theme::light(), "UTC", None).unwrap();

        assert!(html.contains(TITLE));
        assert!(html.contains("Missing clicks file"));
        assert!(html.contains("<svg"));
        assert!(html.contains("groupX"));
        assert!(html.contains("formaction=\"/export.csv\""));
    }

    #[test]
    fn test_empty_filter_shows_no_data() {
        let snap = snapshot(vec![record("A", 8, "groupX", 100)], false);
        let request = ViewRequest::from_pairs(&[("groups", "nomatch")]).unwrap();
        let view = build_view(&snap, &request, &MappingConfig::default());
        let page = PageContext::build(&view, &Theme::dark(), "UTC", None);
        assert!(page.empty_result);
        assert!(page.banners.iter().any(|b| b.level == BannerLevel::Info));

        let html = PageRenderer::new().unwrap().render(&page).unwrap();
        assert!(html.contains("No data for the current filters"));
    }

    #[test]
    fn test_request_error_banner_and_form() {
        let snap = snapshot(vec![record("A", 8, "groupX", 100)], false);
        let view = build_view(&snap, &ViewRequest::default(), &MappingConfig::default());
        let page = PageContext::build(&view, &Theme::light(), "UTC", Some("invalid top_n: 0"));
        assert_eq!(page.banners[0].level, BannerLevel::Error);
        assert!(page.banners[0].message.contains("invalid top_n"));
        assert_eq!(page.form.max_date, "2025-07-08");
        assert!(page.form.metrics.iter().any(|o| o.selected && o.value == "view_diff"));
        assert!(page.form.page_types[0].selected);
        assert!(page.clicks_available);
        assert_eq!(page.correlations.len(), 2);
        assert_eq!(page.correlations[0].badge.value, "N/A");
    }
}
