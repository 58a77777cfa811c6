//! Click-tracking analyses: clicks against views, key metrics, top pages and
//! link conversion.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use dashboard_core::calculations::{
    mean, pct_change, pearson, rate_percent, round_to, safe_ratio, Correlation,
};
use dashboard_core::models::{ClickEvent, MergedRecord, Metric, PageType};
use dashboard_core::page_types::{LinkRules, PageTypeRules};
use serde::Serialize;

use crate::aggregator::MetricsAggregator;
use crate::filter::DateRange;

// ── Result rows ───────────────────────────────────────────────────────────────

/// Clicks and mapped views of one page type on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClicksVsViewsRow {
    pub page_type: PageType,
    pub date: NaiveDate,
    pub clicks: i64,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClicksVsViews {
    pub rows: Vec<ClicksVsViewsRow>,
    pub correlation: Correlation,
}

/// Daily clicks paired with the daily sum of another metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClicksVsMetric {
    pub metric: Metric,
    /// `(date, clicks, metric value)` for dates present on both sides.
    pub rows: Vec<(NaiveDate, i64, i64)>,
    pub correlation: Correlation,
}

/// Headline click figures for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickKeyMetrics {
    pub date: NaiveDate,
    pub total_clicks: usize,
    pub unique_visitors: usize,
    pub unique_sessions: usize,
    pub page_types: usize,
    pub clicks_per_visitor: Option<f64>,
    pub clicks_per_session: Option<f64>,
}

/// Click figures for one date with change from the previous calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyClickMetrics {
    pub date: NaiveDate,
    pub total_clicks: usize,
    pub unique_visitors: usize,
    pub unique_sessions: usize,
    pub clicks_per_visitor: Option<f64>,
    pub total_clicks_pct: Option<f64>,
    pub unique_visitors_pct: Option<f64>,
    pub unique_sessions_pct: Option<f64>,
}

/// Click statistics of one page type on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageStats {
    pub page_type: PageType,
    pub total_clicks: usize,
    pub unique_sessions: usize,
    pub unique_visitors: usize,
    pub clicks_per_session: Option<f64>,
    pub clicks_per_visitor: Option<f64>,
}

/// One day of a link's conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkConversionDay {
    pub date: NaiveDate,
    /// Distinct sessions that clicked the link.
    pub pv: usize,
    /// Distinct visitors that clicked the link.
    pub uv: usize,
    /// `view_diff` of the target group's accounts.
    pub views: i64,
    /// `pv / views * 100` to two places; `None` when `views` is 0.
    pub pv_rate: Option<f64>,
    pub uv_rate: Option<f64>,
}

/// Conversion of one tracked link over the selected dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkConversion {
    pub url: String,
    pub target_group: String,
    pub total_pv: usize,
    pub total_uv: usize,
    pub total_views: i64,
    pub avg_pv_rate: Option<f64>,
    pub avg_uv_rate: Option<f64>,
    /// Continuous daily series from the first to the last active date.
    pub daily: Vec<LinkConversionDay>,
}

impl LinkConversion {
    /// The most recent day of the series.
    pub fn latest(&self) -> Option<&LinkConversionDay> {
        self.daily.last()
    }
}

/// How a group is tied to click data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMapping {
    pub group: String,
    pub accounts: usize,
    pub view_diff: i64,
    pub page_type: PageType,
}

// ── ClicksAnalyzer ────────────────────────────────────────────────────────────

/// Stateless collection of click analyses.
pub struct ClicksAnalyzer;

impl ClicksAnalyzer {
    /// Click counts per (page type, date).
    pub fn clicks_by_page_type(events: &[ClickEvent]) -> BTreeMap<(PageType, NaiveDate), i64> {
        let mut map = BTreeMap::new();
        for e in events {
            *map.entry((e.page_type, e.date)).or_insert(0) += 1;
        }
        map
    }

    /// `view_diff` per (page type, date), each group mapped through `rules`.
    pub fn views_by_page_type(
        records: &[MergedRecord],
        rules: &PageTypeRules,
    ) -> BTreeMap<(PageType, NaiveDate), i64> {
        let mut map = BTreeMap::new();
        for r in records {
            *map.entry((rules.classify(&r.group), r.date())).or_insert(0) += r.metrics.view_diff;
        }
        map
    }

    /// Outer join of clicks and mapped views on (page type, date), missing
    /// side `0`, optionally restricted to one page type, with the Pearson
    /// correlation of the two columns.
    pub fn clicks_vs_views(
        events: &[ClickEvent],
        records: &[MergedRecord],
        rules: &PageTypeRules,
        page_type: Option<PageType>,
    ) -> ClicksVsViews {
        let clicks = Self::clicks_by_page_type(events);
        let views = Self::views_by_page_type(records, rules);

        let keys: BTreeSet<(PageType, NaiveDate)> = clicks
            .keys()
            .chain(views.keys())
            .copied()
            .filter(|(pt, _)| page_type.map_or(true, |want| *pt == want))
            .collect();

        let rows: Vec<ClicksVsViewsRow> = keys
            .into_iter()
            .map(|key| ClicksVsViewsRow {
                page_type: key.0,
                date: key.1,
                clicks: clicks.get(&key).copied().unwrap_or(0),
                views: views.get(&key).copied().unwrap_or(0),
            })
            .collect();

        let xs: Vec<f64> = rows.iter().map(|r| r.clicks as f64).collect();
        let ys: Vec<f64> = rows.iter().map(|r| r.views as f64).collect();
        ClicksVsViews {
            correlation: pearson(&xs, &ys),
            rows,
        }
    }

    /// [`Self::clicks_vs_views`] summed per date.
    pub fn daily_comparison(table: &ClicksVsViews) -> Vec<(NaiveDate, i64, i64)> {
        let mut map: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for row in &table.rows {
            let entry = map.entry(row.date).or_insert((0, 0));
            entry.0 += row.clicks;
            entry.1 += row.views;
        }
        map.into_iter().map(|(d, (c, v))| (d, c, v)).collect()
    }

    /// Daily click counts against the daily sum of `metric` on dates present
    /// in both.
    pub fn clicks_vs_metric(events: &[ClickEvent], records: &[MergedRecord], metric: Metric) -> ClicksVsMetric {
        let mut clicks: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for e in events {
            *clicks.entry(e.date).or_insert(0) += 1;
        }
        let rows: Vec<(NaiveDate, i64, i64)> = MetricsAggregator::daily_series(records, metric)
            .into_iter()
            .filter_map(|(date, value)| clicks.get(&date).map(|c| (date, *c, value)))
            .collect();

        let xs: Vec<f64> = rows.iter().map(|r| r.1 as f64).collect();
        let ys: Vec<f64> = rows.iter().map(|r| r.2 as f64).collect();
        ClicksVsMetric {
            metric,
            correlation: pearson(&xs, &ys),
            rows,
        }
    }

    /// Key figures for `date` (default: latest click date); `None` when that
    /// date has no clicks.
    pub fn key_metrics(events: &[ClickEvent], date: Option<NaiveDate>) -> Option<ClickKeyMetrics> {
        let date = date.or_else(|| latest_click_date(events))?;
        let day: Vec<&ClickEvent> = events.iter().filter(|e| e.date == date).collect();
        if day.is_empty() {
            return None;
        }
        let visitors = distinct(&day, |e| e.visitor_id.as_str());
        let sessions = distinct(&day, |e| e.session_id.as_str());
        let page_types: HashSet<PageType> = day.iter().map(|e| e.page_type).collect();
        Some(ClickKeyMetrics {
            date,
            total_clicks: day.len(),
            unique_visitors: visitors,
            unique_sessions: sessions,
            page_types: page_types.len(),
            clicks_per_visitor: safe_ratio(day.len() as f64, visitors as f64),
            clicks_per_session: safe_ratio(day.len() as f64, sessions as f64),
        })
    }

    /// One row per click date with percent change from the previous calendar
    /// day; `None` when that day had no clicks.
    pub fn daily_click_metrics(events: &[ClickEvent]) -> Vec<DailyClickMetrics> {
        let mut by_day: BTreeMap<NaiveDate, Vec<&ClickEvent>> = BTreeMap::new();
        for e in events {
            by_day.entry(e.date).or_default().push(e);
        }

        let mut out: Vec<DailyClickMetrics> = Vec::with_capacity(by_day.len());
        for (date, day) in by_day {
            let total = day.len();
            let visitors = distinct(&day, |e| e.visitor_id.as_str());
            let sessions = distinct(&day, |e| e.session_id.as_str());
            let prev = out.last().filter(|p| Some(p.date) == date.pred_opt());
            let change = |f: fn(&DailyClickMetrics) -> usize, now: usize| {
                prev.and_then(|p| pct_change(f(p) as f64, now as f64))
            };
            let row = DailyClickMetrics {
                date,
                total_clicks: total,
                unique_visitors: visitors,
                unique_sessions: sessions,
                clicks_per_visitor: safe_ratio(total as f64, visitors as f64),
                total_clicks_pct: change(|p| p.total_clicks, total),
                unique_visitors_pct: change(|p| p.unique_visitors, visitors),
                unique_sessions_pct: change(|p| p.unique_sessions, sessions),
            };
            out.push(row);
        }
        out
    }

    /// Page types on `date` (default: latest click date) by total clicks
    /// descending, at most `n`.
    pub fn top_pages(events: &[ClickEvent], date: Option<NaiveDate>, n: usize) -> Vec<PageStats> {
        let Some(date) = date.or_else(|| latest_click_date(events)) else {
            return Vec::new();
        };
        let mut by_type: BTreeMap<PageType, Vec<&ClickEvent>> = BTreeMap::new();
        for e in events.iter().filter(|e| e.date == date) {
            by_type.entry(e.page_type).or_default().push(e);
        }
        let mut rows: Vec<PageStats> = by_type
            .into_iter()
            .map(|(page_type, day)| {
                let sessions = distinct(&day, |e| e.session_id.as_str());
                let visitors = distinct(&day, |e| e.visitor_id.as_str());
                PageStats {
                    page_type,
                    total_clicks: day.len(),
                    unique_sessions: sessions,
                    unique_visitors: visitors,
                    clicks_per_session: safe_ratio(day.len() as f64, sessions as f64),
                    clicks_per_visitor: safe_ratio(day.len() as f64, visitors as f64),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.total_clicks.cmp(&a.total_clicks).then_with(|| a.page_type.cmp(&b.page_type)));
        rows.truncate(n);
        rows
    }

    /// PV / UV / views conversion of every link rule inside `range`.
    pub fn link_conversion(
        events: &[ClickEvent],
        records: &[MergedRecord],
        links: &LinkRules,
        range: &DateRange,
    ) -> Vec<LinkConversion> {
        links
            .rules()
            .iter()
            .map(|rule| {
                let clicks: Vec<&ClickEvent> = events
                    .iter()
                    .filter(|e| range.contains(e.date) && rule.matches_url(&e.page_url))
                    .collect();

                let mut by_day: BTreeMap<NaiveDate, Vec<&ClickEvent>> = BTreeMap::new();
                for e in &clicks {
                    by_day.entry(e.date).or_default().push(e);
                }

                let mut views: BTreeMap<NaiveDate, i64> = BTreeMap::new();
                for r in records
                    .iter()
                    .filter(|r| range.contains(r.date()) && rule.matches_group(&r.group))
                {
                    *views.entry(r.date()).or_insert(0) += r.metrics.view_diff;
                }

                let first = by_day.keys().chain(views.keys()).min().copied();
                let last = by_day.keys().chain(views.keys()).max().copied();
                let daily: Vec<LinkConversionDay> = match (first, last) {
                    (Some(first), Some(last)) => first
                        .iter_days()
                        .take_while(|d| *d <= last)
                        .map(|date| {
                            let day = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
                            let pv = distinct(day, |e| e.session_id.as_str());
                            let uv = distinct(day, |e| e.visitor_id.as_str());
                            let v = views.get(&date).copied().unwrap_or(0);
                            LinkConversionDay {
                                date,
                                pv,
                                uv,
                                views: v,
                                pv_rate: rate_percent(pv as f64, v as f64).map(|r| round_to(r, 2)),
                                uv_rate: rate_percent(uv as f64, v as f64).map(|r| round_to(r, 2)),
                            }
                        })
                        .collect(),
                    _ => Vec::new(),
                };

                let pv_rates: Vec<f64> = daily.iter().filter_map(|d| d.pv_rate).collect();
                let uv_rates: Vec<f64> = daily.iter().filter_map(|d| d.uv_rate).collect();
                LinkConversion {
                    url: rule.url.clone(),
                    target_group: rule.group.clone(),
                    total_pv: distinct(&clicks, |e| e.session_id.as_str()),
                    total_uv: distinct(&clicks, |e| e.visitor_id.as_str()),
                    total_views: views.values().sum(),
                    avg_pv_rate: mean(&pv_rates),
                    avg_uv_rate: mean(&uv_rates),
                    daily,
                }
            })
            .collect()
    }

    /// Per group: distinct accounts, summed `view_diff` and mapped page type.
    pub fn group_mapping_summary(records: &[MergedRecord], rules: &PageTypeRules) -> Vec<GroupMapping> {
        let mut by_group: BTreeMap<&str, (BTreeSet<&str>, i64)> = BTreeMap::new();
        for r in records {
            let entry = by_group.entry(r.group.as_str()).or_default();
            entry.0.insert(r.account_id());
            entry.1 += r.metrics.view_diff;
        }
        by_group
            .into_iter()
            .map(|(group, (accounts, view_diff))| GroupMapping {
                group: group.to_string(),
                accounts: accounts.len(),
                view_diff,
                page_type: rules.classify(group),
            })
            .collect()
    }
}

/// Events whose date falls inside `range`.
pub fn filter_events(events: &[ClickEvent], range: &DateRange) -> Vec<ClickEvent> {
    events.iter().filter(|e| range.contains(e.date)).cloned().collect()
}

pub fn latest_click_date(events: &[ClickEvent]) -> Option<NaiveDate> {
    events.iter().map(|e| e.date).max()
}

/// Click count on `date`.
pub fn clicks_on(events: &[ClickEvent], date: NaiveDate) -> usize {
    events.iter().filter(|e| e.date == date).count()
}

fn distinct<'a>(events: &[&'a ClickEvent], key: impl Fn(&'a ClickEvent) -> &'a str) -> usize {
    events.iter().map(|e| key(*e)).collect::<HashSet<&str>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dashboard_core::models::MetricRecord;
    use dashboard_core::page_types::LinkRule;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    fn click(d: u32, url: &str, page_type: PageType, session: &str, visitor: &str) -> ClickEvent {
        ClickEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 7, d, 12, 0, 0).unwrap(),
            date: day(d),
            page_url: url.to_string(),
            page_type,
            session_id: session.to_string(),
            visitor_id: visitor.to_string(),
        }
    }

    fn rec(id: &str, d: u32, group: &str, view_diff: i64) -> MergedRecord {
        let mut m = MetricRecord::empty(id, day(d));
        m.view_diff = view_diff;
        m.like_diff = view_diff / 10;
        MergedRecord {
            metrics: m,
            group: group.to_string(),
            matched: true,
        }
    }

    const VIDEOS: &str = "https://insnap.ai/videos";
    const DOWNLOAD: &str = "https://insnap.ai/zh/download";

    fn events() -> Vec<ClickEvent> {
        vec![
            click(7, VIDEOS, PageType::Videos, "s1", "v1"),
            click(7, VIDEOS, PageType::Videos, "s1", "v1"),
            click(7, DOWNLOAD, PageType::Download, "s2", "v2"),
            click(8, "http://insnap.ai/videos", PageType::Videos, "s3", "v1"),
            click(8, VIDEOS, PageType::Videos, "s4", "v3"),
            click(8, VIDEOS, PageType::Videos, "s5", "v3"),
        ]
    }

    fn records() -> Vec<MergedRecord> {
        vec![
            rec("A", 6, "yujie_main_avatar", 500),
            rec("A", 7, "yujie_main_avatar", 1000),
            rec("B", 7, "wan_produce101", 400),
            rec("A", 8, "yujie_main_avatar", 2000),
            rec("C", 8, "Unknown", 90),
        ]
    }

    #[test]
    fn test_clicks_vs_views_outer_join() {
        let table = ClicksAnalyzer::clicks_vs_views(&events(), &records(), &PageTypeRules::default(), Some(PageType::Videos));
        assert_eq!(
            table.rows,
            vec![
                ClicksVsViewsRow { page_type: PageType::Videos, date: day(6), clicks: 0, views: 500 },
                ClicksVsViewsRow { page_type: PageType::Videos, date: day(7), clicks: 2, views: 1000 },
                ClicksVsViewsRow { page_type: PageType::Videos, date: day(8), clicks: 3, views: 2000 },
            ]
        );
        assert!(table.correlation.is_defined());
    }

    #[test]
    fn test_clicks_vs_views_all_page_types() {
        let table = ClicksAnalyzer::clicks_vs_views(&events(), &records(), &PageTypeRules::default(), None);
        assert!(table.rows.iter().any(|r| r.page_type == PageType::Other && r.views == 90));
        let daily = ClicksAnalyzer::daily_comparison(&table);
        assert_eq!(daily[1], (day(7), 3, 1400));
    }

    #[test]
    fn test_correlation_undefined_with_single_point() {
        let table = ClicksAnalyzer::clicks_vs_views(
            &events(),
            &records(),
            &PageTypeRules::default(),
            Some(PageType::Download),
        );
        assert_eq!(table.rows.len(), 1);
        assert!(!table.correlation.is_defined());
    }

    #[test]
    fn test_clicks_vs_metric_inner_join() {
        let result = ClicksAnalyzer::clicks_vs_metric(&events(), &records(), Metric::LikeDiff);
        assert_eq!(result.rows, vec![(day(7), 3, 140), (day(8), 3, 209)]);
        // constant click series
        assert!(!result.correlation.is_defined());
    }

    #[test]
    fn test_key_metrics_latest_day() {
        let m = ClicksAnalyzer::key_metrics(&events(), None).unwrap();
        assert_eq!(m.date, day(8));
        assert_eq!(m.total_clicks, 3);
        assert_eq!(m.unique_visitors, 2);
        assert_eq!(m.unique_sessions, 3);
        assert_eq!(m.page_types, 1);
        assert_eq!(m.clicks_per_visitor, Some(1.5));
        assert!(ClicksAnalyzer::key_metrics(&events(), Some(day(1))).is_none());
        assert!(ClicksAnalyzer::key_metrics(&[], None).is_none());
    }

    #[test]
    fn test_daily_click_metrics_previous_day_change() {
        let rows = ClicksAnalyzer::daily_click_metrics(&events());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total_clicks_pct, None);
        assert_eq!(rows[1].total_clicks_pct, Some(0.0));
        // sessions 2 → 3
        assert_eq!(rows[1].unique_sessions_pct, Some(50.0));
    }

    #[test]
    fn test_daily_click_metrics_gap_has_no_change() {
        let mut events = events();
        events.push(click(10, VIDEOS, PageType::Videos, "s6", "v4"));
        let rows = ClicksAnalyzer::daily_click_metrics(&events);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].date, day(10));
        assert_eq!(rows[2].total_clicks_pct, None);
        assert_eq!(rows[2].unique_visitors_pct, None);
    }

    #[test]
    fn test_top_pages() {
        let rows = ClicksAnalyzer::top_pages(&events(), Some(day(7)), 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].page_type, PageType::Videos);
        assert_eq!(rows[0].total_clicks, 2);
        assert_eq!(rows[0].unique_sessions, 1);
        assert_eq!(rows[0].clicks_per_session, Some(2.0));
        assert_eq!(ClicksAnalyzer::top_pages(&events(), Some(day(7)), 1).len(), 1);
    }

    #[test]
    fn test_link_conversion() {
        let links = LinkRules::new(vec![LinkRule::new(VIDEOS, "yujie_main_avatar")]);
        let result = ClicksAnalyzer::link_conversion(&events(), &records(), &links, &DateRange::all());
        let video = &result[0];
        assert_eq!(video.daily.len(), 3);
        // day 6: views only
        assert_eq!(video.daily[0].pv, 0);
        assert_eq!(video.daily[0].pv_rate, Some(0.0));
        // day 7: one session, one visitor over 1000 views
        assert_eq!(video.daily[1].pv, 1);
        assert_eq!(video.daily[1].pv_rate, Some(0.1));
        // day 8: http and https both count
        assert_eq!(video.daily[2].pv, 3);
        assert_eq!(video.daily[2].uv, 2);
        assert_eq!(video.total_pv, 4);
        assert_eq!(video.total_uv, 2);
        assert_eq!(video.total_views, 3500);
        assert_eq!(video.latest().unwrap().date, day(8));
    }

    #[test]
    fn test_link_conversion_zero_views_rate_is_null() {
        let links = LinkRules::new(vec![LinkRule::new(DOWNLOAD, "nobody")]);
        let result = ClicksAnalyzer::link_conversion(&events(), &records(), &links, &DateRange::all());
        assert_eq!(result[0].daily.len(), 1);
        assert_eq!(result[0].daily[0].pv, 1);
        assert_eq!(result[0].daily[0].pv_rate, None);
        assert_eq!(result[0].avg_pv_rate, None);
    }

    #[test]
    fn test_link_conversion_fills_gap_days() {
        let links = LinkRules::new(vec![LinkRule::new(VIDEOS, "absent")]);
        let evs = vec![
            click(5, VIDEOS, PageType::Videos, "a", "a"),
            click(8, VIDEOS, PageType::Videos, "b", "b"),
        ];
        let result = ClicksAnalyzer::link_conversion(&evs, &[], &links, &DateRange::all());
        let days: Vec<usize> = result[0].daily.iter().map(|d| d.pv).collect();
        assert_eq!(days, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_group_mapping_summary() {
        let rows = ClicksAnalyzer::group_mapping_summary(&records(), &PageTypeRules::default());
        assert_eq!(rows.len(), 3);
        let main = rows.iter().find(|r| r.group == "yujie_main_avatar").unwrap();
        assert_eq!(main.accounts, 1);
        assert_eq!(main.view_diff, 3500);
        assert_eq!(main.page_type, PageType::Videos);
    }

    #[test]
    fn test_filter_events_and_counts() {
        let range = DateRange::new(Some(day(8)), None).unwrap();
        assert_eq!(filter_events(&events(), &range).len(), 3);
        assert_eq!(clicks_on(&events(), day(7)), 3);
        assert_eq!(latest_click_date(&events()), Some(day(8)));
    }
}
