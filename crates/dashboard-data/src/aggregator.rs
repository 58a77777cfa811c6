//! Daily and per-group aggregation of the merged table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use dashboard_core::calculations::{mean, median, pct_change, std_dev};
use dashboard_core::models::{EfficiencyMetric, MergedRecord, Metric};
use serde::Serialize;

use crate::filter::DateRange;

/// Diff metrics compared by the interaction growth table.
pub const INTERACTION_METRICS: [Metric; 4] = [
    Metric::ViewDiff,
    Metric::LikeDiff,
    Metric::CommentDiff,
    Metric::ShareDiff,
];

// ── MetricTotals ──────────────────────────────────────────────────────────────

/// Sums of a set of metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetricTotals {
    values: BTreeMap<Metric, i64>,
}

impl MetricTotals {
    /// Zeroed totals for `metrics`.
    pub fn for_metrics(metrics: &[Metric]) -> Self {
        Self {
            values: metrics.iter().map(|m| (*m, 0)).collect(),
        }
    }

    /// Add `record`'s value of every tracked metric.
    pub fn add_record(&mut self, record: &MergedRecord) {
        for (metric, total) in self.values.iter_mut() {
            *total += record.value(*metric);
        }
    }

    pub fn add(&mut self, metric: Metric, value: i64) {
        *self.values.entry(metric).or_insert(0) += value;
    }

    /// Total of `metric`; `0` when untracked.
    pub fn get(&self, metric: Metric) -> i64 {
        self.values.get(&metric).copied().unwrap_or(0)
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.values.keys().copied()
    }
}

// ── Result rows ───────────────────────────────────────────────────────────────

/// Metric sums for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyValues {
    pub date: NaiveDate,
    pub totals: MetricTotals,
}

/// Count-metric increments summed for one (date, group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDailyValues {
    pub date: NaiveDate,
    pub group: String,
    pub totals: MetricTotals,
}

/// One metric summed for one (date, group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDailyValue {
    pub date: NaiveDate,
    pub group: String,
    pub value: i64,
}

/// Mean per-post ratio for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEfficiency {
    pub date: NaiveDate,
    /// `None` when no account posted that day.
    pub value: Option<f64>,
    /// Accounts with a non-zero post count.
    pub contributing_accounts: usize,
}

/// Per-group roll-up on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPerformance {
    pub group: String,
    pub accounts: usize,
    pub totals: MetricTotals,
    /// Mean of each per-post ratio, in [`EfficiencyMetric::ALL`] order.
    pub efficiency: Vec<(EfficiencyMetric, Option<f64>)>,
}

/// Spread of one per-post ratio within a group on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyDistribution {
    pub group: String,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two ratios.
    pub std_dev: Option<f64>,
    /// Number of defined ratios.
    pub count: usize,
    pub accounts: usize,
}

/// Diff sums for one date with day-over-day percent change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthRow {
    pub date: NaiveDate,
    pub totals: MetricTotals,
    /// Percent change of each [`INTERACTION_METRICS`] value from the previous
    /// calendar day.
    pub growth: Vec<(Metric, Option<f64>)>,
}

// ── MetricsAggregator ─────────────────────────────────────────────────────────

/// Stateless helper that rolls merged rows up by date and group.
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// One row per distinct date with the sum of each of `metrics`.
    ///
    /// Returns rows sorted by date (ascending).
    pub fn aggregate_daily(records: &[MergedRecord], metrics: &[Metric]) -> Vec<DailyValues> {
        let mut map: BTreeMap<NaiveDate, MetricTotals> = BTreeMap::new();
        for record in records {
            map.entry(record.date())
                .or_insert_with(|| MetricTotals::for_metrics(metrics))
                .add_record(record);
        }
        map.into_iter()
            .map(|(date, totals)| DailyValues { date, totals })
            .collect()
    }

    /// `(date, value)` points of one metric's daily sum.
    pub fn daily_series(records: &[MergedRecord], metric: Metric) -> Vec<(NaiveDate, i64)> {
        Self::aggregate_daily(records, &[metric])
            .into_iter()
            .map(|row| (row.date, row.totals.get(metric)))
            .collect()
    }

    /// One row per (date, group) with the sum of `metric`, sorted by date
    /// then group.
    pub fn aggregate_daily_by_group(records: &[MergedRecord], metric: Metric) -> Vec<GroupDailyValue> {
        let mut map: BTreeMap<(NaiveDate, &str), i64> = BTreeMap::new();
        for record in records {
            *map.entry((record.date(), record.group.as_str())).or_insert(0) += record.value(metric);
        }
        map.into_iter()
            .map(|((date, group), value)| GroupDailyValue {
                date,
                group: group.to_string(),
                value,
            })
            .collect()
    }

    /// Per-day mean of `metric`'s per-account ratio over accounts that have
    /// posts. Zero-post accounts are left out rather than counted as zero.
    pub fn daily_efficiency(records: &[MergedRecord], metric: EfficiencyMetric) -> Vec<DailyEfficiency> {
        let mut map: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for record in records {
            let ratios = map.entry(record.date()).or_default();
            if let Some(r) = record.metrics.efficiency(metric) {
                ratios.push(r);
            }
        }
        map.into_iter()
            .map(|(date, ratios)| DailyEfficiency {
                date,
                value: mean(&ratios),
                contributing_accounts: ratios.len(),
            })
            .collect()
    }

    /// Per-group count sums and mean ratios on `date`, ordered by
    /// `view_count` descending (group name breaks ties).
    pub fn group_performance(records: &[MergedRecord], date: NaiveDate) -> Vec<GroupPerformance> {
        let mut by_group: BTreeMap<&str, Vec<&MergedRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.date() == date) {
            by_group.entry(record.group.as_str()).or_default().push(record);
        }

        let mut rows: Vec<GroupPerformance> = by_group
            .into_iter()
            .map(|(group, rows)| {
                let mut totals = MetricTotals::for_metrics(&Metric::COUNTS);
                for r in &rows {
                    totals.add_record(r);
                }
                let efficiency = EfficiencyMetric::ALL
                    .iter()
                    .map(|m| {
                        let ratios: Vec<f64> =
                            rows.iter().filter_map(|r| r.metrics.efficiency(*m)).collect();
                        (*m, mean(&ratios))
                    })
                    .collect();
                GroupPerformance {
                    group: group.to_string(),
                    accounts: distinct_accounts(&rows),
                    totals,
                    efficiency,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.totals
                .get(Metric::ViewCount)
                .cmp(&a.totals.get(Metric::ViewCount))
                .then_with(|| a.group.cmp(&b.group))
        });
        rows
    }

    /// Distribution of `metric` per group on `date`, ordered by mean
    /// descending with undefined means last.
    pub fn efficiency_distribution(
        records: &[MergedRecord],
        date: NaiveDate,
        metric: EfficiencyMetric,
    ) -> Vec<EfficiencyDistribution> {
        let mut by_group: BTreeMap<&str, Vec<&MergedRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.date() == date) {
            by_group.entry(record.group.as_str()).or_default().push(record);
        }

        let mut rows: Vec<EfficiencyDistribution> = by_group
            .into_iter()
            .map(|(group, rows)| {
                let ratios: Vec<f64> = rows.iter().filter_map(|r| r.metrics.efficiency(metric)).collect();
                EfficiencyDistribution {
                    group: group.to_string(),
                    mean: mean(&ratios),
                    median: median(&ratios),
                    std_dev: std_dev(&ratios),
                    count: ratios.len(),
                    accounts: distinct_accounts(&rows),
                }
            })
            .collect();

        rows.sort_by(|a, b| match (a.mean, b.mean) {
            (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.group.cmp(&b.group)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.group.cmp(&b.group),
        });
        rows
    }

    /// Day-over-day increase of each count metric, per account, summed per
    /// date and kept inside `range`.
    ///
    /// Increments are taken over every row of an account, so the first day
    /// of `range` still compares against the day before it. An account's
    /// first observation contributes `0`. Calendar days inside the kept span
    /// that have no rows are filled with zeros.
    pub fn daily_increments(records: &[MergedRecord], range: &DateRange) -> Vec<DailyValues> {
        let mut map: BTreeMap<NaiveDate, MetricTotals> = BTreeMap::new();
        for (row, delta) in Self::account_increments(records) {
            if range.contains(row.date()) {
                let totals = map.entry(row.date()).or_insert_with(zero_counts);
                for metric in Metric::COUNTS {
                    totals.add(metric, delta.get(metric));
                }
            }
        }

        calendar_span(map.keys().copied())
            .into_iter()
            .map(|date| DailyValues {
                date,
                totals: map.remove(&date).unwrap_or_else(zero_counts),
            })
            .collect()
    }

    /// [`Self::daily_increments`] per (date, group), over the full
    /// date × group grid of the kept span.
    pub fn group_daily_increments(records: &[MergedRecord], range: &DateRange) -> Vec<GroupDailyValues> {
        let mut map: BTreeMap<(NaiveDate, &str), MetricTotals> = BTreeMap::new();
        let mut groups: BTreeSet<&str> = BTreeSet::new();
        for (row, delta) in Self::account_increments(records) {
            if !range.contains(row.date()) {
                continue;
            }
            groups.insert(row.group.as_str());
            let totals = map
                .entry((row.date(), row.group.as_str()))
                .or_insert_with(zero_counts);
            for metric in Metric::COUNTS {
                totals.add(metric, delta.get(metric));
            }
        }

        let days = calendar_span(map.keys().map(|(date, _)| *date));
        let mut out = Vec::with_capacity(days.len() * groups.len());
        for date in days {
            for group in &groups {
                out.push(GroupDailyValues {
                    date,
                    group: group.to_string(),
                    totals: map.remove(&(date, *group)).unwrap_or_else(zero_counts),
                });
            }
        }
        out
    }

    /// Each row paired with its count-metric change since the same
    /// account's previous row (zeros for the first row).
    fn account_increments(records: &[MergedRecord]) -> Vec<(&MergedRecord, MetricTotals)> {
        let mut by_account: HashMap<&str, Vec<&MergedRecord>> = HashMap::new();
        for record in records {
            by_account.entry(record.account_id()).or_default().push(record);
        }

        let mut out = Vec::with_capacity(records.len());
        for rows in by_account.values_mut() {
            rows.sort_by_key(|r| r.date());
            let mut previous: Option<&MergedRecord> = None;
            for row in rows.iter().copied() {
                let mut delta = zero_counts();
                if let Some(prev) = previous {
                    for metric in Metric::COUNTS {
                        delta.add(metric, row.value(metric) - prev.value(metric));
                    }
                }
                out.push((row, delta));
                previous = Some(row);
            }
        }
        out
    }

    /// Daily sums of [`INTERACTION_METRICS`] with percent change from the
    /// previous calendar day (`None` when that day has no rows or a zero
    /// value).
    pub fn interaction_growth(records: &[MergedRecord]) -> Vec<GrowthRow> {
        let daily = Self::aggregate_daily(records, &INTERACTION_METRICS);
        let by_date: BTreeMap<NaiveDate, &MetricTotals> =
            daily.iter().map(|row| (row.date, &row.totals)).collect();

        daily
            .iter()
            .map(|row| {
                let previous = row.date.pred_opt().and_then(|d| by_date.get(&d));
                let growth = INTERACTION_METRICS
                    .iter()
                    .map(|m| {
                        let change = previous.and_then(|p| {
                            pct_change(p.get(*m) as f64, row.totals.get(*m) as f64)
                        });
                        (*m, change)
                    })
                    .collect();
                GrowthRow {
                    date: row.date,
                    totals: row.totals.clone(),
                    growth,
                }
            })
            .collect()
    }

    /// Sum of every metric over the whole table.
    pub fn calculate_totals(records: &[MergedRecord]) -> MetricTotals {
        let all: Vec<Metric> = Metric::COUNTS.iter().chain(Metric::DIFFS.iter()).copied().collect();
        let mut totals = MetricTotals::for_metrics(&all);
        for record in records {
            totals.add_record(record);
        }
        totals
    }

    /// Distinct accounts per group, largest first.
    pub fn group_statistics(records: &[MergedRecord]) -> Vec<(String, usize)> {
        let mut by_group: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for record in records {
            by_group
                .entry(record.group.as_str())
                .or_default()
                .insert(record.account_id());
        }
        let mut rows: Vec<(String, usize)> = by_group
            .into_iter()
            .map(|(g, accounts)| (g.to_string(), accounts.len()))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows
    }
}

fn distinct_accounts(rows: &[&MergedRecord]) -> usize {
    rows.iter().map(|r| r.account_id()).collect::<BTreeSet<_>>().len()
}

fn zero_counts() -> MetricTotals {
    MetricTotals::for_metrics(&Metric::COUNTS)
}

/// Every calendar day from the earliest to the latest of `dates`.
fn calendar_span(dates: impl Iterator<Item = NaiveDate>) -> Vec<NaiveDate> {
    let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
    for date in dates {
        bounds = Some(match bounds {
            Some((first, last)) => (first.min(date), last.max(date)),
            None => (date, date),
        });
    }
    match bounds {
        Some((first, last)) => first.iter_days().take_while(|d| *d <= last).collect(),
        None => Vec::new(),
    }
}
