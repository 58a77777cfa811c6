//! Behaviour of the merge → filter → aggregate → rank pipeline over small
//! hand-built tables.

use chrono::NaiveDate;
use dashboard_data::aggregator::MetricsAggregator;
use dashboard_data::core::calculations::{pearson, Correlation, UndefinedReason};
use dashboard_data::core::models::{AccountMeta, MergedRecord, Metric, MetricRecord};
use dashboard_data::filter::{DateRange, Filter, GroupSelection};
use dashboard_data::merge::{merge, AccountDirectory};
use dashboard_data::ranking::{top_accounts, DEFAULT_TOP_N};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
}

fn metric(id: &str, d: u32, view_diff: i64) -> MetricRecord {
    let mut m = MetricRecord::empty(id, day(d));
    m.view_diff = view_diff;
    m.view_count = view_diff * 10;
    m.like_diff = view_diff / 5;
    m.post_count = 1;
    m
}

fn merged_table() -> Vec<MergedRecord> {
    let metrics: Vec<MetricRecord> = (1..=9)
        .flat_map(|d| {
            ["A", "B", "C", "D"]
                .into_iter()
                .enumerate()
                .map(move |(i, id)| metric(id, d, (d as i64) * 10 + i as i64))
        })
        .collect();
    let directory = AccountDirectory::new(vec![
        AccountMeta::new("A", "yujie_main_avatar"),
        AccountMeta::new("B", "wan_produce101"),
        AccountMeta::new("C", "yujie_main_avatar"),
    ]);
    merge(&metrics, &directory)
}

#[test]
fn merge_keeps_every_row_and_assigns_a_group() {
    let table = merged_table();
    assert_eq!(table.len(), 36);
    assert!(table.iter().all(|r| !r.group.is_empty()));
    assert!(table
        .iter()
        .filter(|r| r.account_id() == "D")
        .all(|r| r.group == "Unknown" && !r.matched));
}

#[test]
fn filtering_twice_is_idempotent() {
    let filter = Filter::new(
        DateRange::new(Some(day(3)), Some(day(6))).unwrap(),
        GroupSelection::new(["avatar"]),
    );
    let once = filter.apply(&merged_table());
    let twice = filter.apply(&once);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 8);
}

#[test]
fn grouped_sums_add_up_to_daily_sums() {
    let table = merged_table();
    let daily = MetricsAggregator::daily_series(&table, Metric::ViewDiff);
    let by_group = MetricsAggregator::aggregate_daily_by_group(&table, Metric::ViewDiff);
    for (date, total) in daily {
        let regrouped: i64 = by_group.iter().filter(|r| r.date == date).map(|r| r.value).sum();
        assert_eq!(regrouped, total, "mismatch on {date}");
    }
}

#[test]
fn correlation_of_series_with_itself_and_a_constant() {
    let series: Vec<f64> = MetricsAggregator::daily_series(&merged_table(), Metric::ViewDiff)
        .into_iter()
        .map(|(_, v)| v as f64)
        .collect();
    let r = pearson(&series, &series).value().unwrap();
    assert!((r - 1.0).abs() < 1e-9);

    let constant = vec![7.0; series.len()];
    assert_eq!(
        pearson(&series, &constant),
        Correlation::Undefined(UndefinedReason::ZeroVariance)
    );
    assert_eq!(pearson(&series, &constant).to_string(), "N/A");
}

#[test]
fn top_five_with_fewer_accounts_returns_all() {
    let table = merged_table();
    let top = top_accounts(&table, Some(day(4)), Metric::ViewDiff, DEFAULT_TOP_N, None);
    assert_eq!(top.len(), 4);
    let ids: Vec<&str> = top.iter().map(|r| r.account_id.as_str()).collect();
    assert_eq!(ids, vec!["D", "C", "B", "A"]);
}

#[test]
fn worked_example_ranking_and_groups() {
    let metrics = vec![metric("A", 8, 100), metric("B", 8, 50), metric("C", 8, 10)];
    let directory = AccountDirectory::new(vec![AccountMeta::new("A", "groupX")]);
    let merged = merge(&metrics, &directory);

    let top = top_accounts(&merged, Some(day(8)), Metric::ViewDiff, DEFAULT_TOP_N, None);
    let ids: Vec<&str> = top.iter().take(2).map(|r| r.account_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);

    let group_of = |id: &str| merged.iter().find(|r| r.account_id() == id).map(|r| r.group.clone());
    assert_eq!(group_of("A").as_deref(), Some("groupX"));
    assert_eq!(group_of("C").as_deref(), Some("Unknown"));
}

#[test]
fn efficiency_ignores_zero_post_accounts() {
    let mut table = merged_table();
    table.retain(|r| r.date() == day(2));
    table[0].metrics.post_count = 0;
    let eff = MetricsAggregator::daily_efficiency(
        &table,
        dashboard_data::core::models::EfficiencyMetric::ViewPerPost,
    );
    assert_eq!(eff.len(), 1);
    assert_eq!(eff[0].contributing_accounts, 3);
}
