//! Snapshot loading pipeline and headline summaries.
//!
//! [`load_snapshot`] resolves the newest input of each source, loads and
//! merges them, and records a [`SourceIssue`] for every source that failed
//! instead of returning silently empty tables.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use dashboard_core::calculations::pct_change;
use dashboard_core::dates::{DateFormat, TimezoneHandler};
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::{ClickEvent, DataSource, MergedRecord, Metric};
use dashboard_core::settings::DataPaths;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::MetricTotals;
use crate::clicks::{clicks_on, latest_click_date};
use crate::filter::{date_bounds, latest_date};
use crate::merge::{merge, AccountDirectory, MergeStats};
use crate::reader::{
    latest_data_file, load_accounts, load_clicks, load_metrics, CSV_EXTENSIONS,
    SPREADSHEET_EXTENSIONS,
};

// ── Source issues ─────────────────────────────────────────────────────────────

/// Coarse category of a failed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The input file (or every candidate file) is absent.
    MissingFile,
    /// A required column is absent or holds unparsable values.
    Schema,
    /// The file exists but could not be read or decoded.
    Unreadable,
}

/// Clonable record of one source's load failure, shown as a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceIssue {
    pub source: DataSource,
    pub kind: IssueKind,
    pub message: String,
}

impl SourceIssue {
    pub fn from_error(source: DataSource, err: &DashboardError) -> Self {
        let kind = if err.is_missing_input() {
            IssueKind::MissingFile
        } else if matches!(err, DashboardError::Schema { .. }) {
            IssueKind::Schema
        } else {
            IssueKind::Unreadable
        };
        Self {
            source,
            kind,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for SourceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// The merged metrics table plus its join report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedTable {
    pub records: Vec<MergedRecord>,
    pub stats: MergeStats,
}

/// The input file chosen for each source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceFiles {
    pub metrics: Option<PathBuf>,
    pub accounts: Option<PathBuf>,
    pub clicks: Option<PathBuf>,
}

impl SourceFiles {
    /// Every resolved path, in source order.
    pub fn paths(&self) -> Vec<&Path> {
        [&self.metrics, &self.accounts, &self.clicks]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Metadata produced alongside a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotMetadata {
    /// ISO-8601 timestamp when the snapshot was loaded.
    pub generated_at: String,
    pub metric_rows: usize,
    pub accounts: usize,
    pub click_events: usize,
    /// Wall-clock seconds spent reading and merging.
    pub load_time_seconds: f64,
}

/// One immutable load of all three sources.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// `Err` when the metrics or the account metadata could not be loaded.
    pub merged: std::result::Result<MergedTable, SourceIssue>,
    pub clicks: std::result::Result<Vec<ClickEvent>, SourceIssue>,
    pub directory: AccountDirectory,
    pub files: SourceFiles,
    /// Every failed source, in source order.
    pub issues: Vec<SourceIssue>,
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// Merged rows, or an empty slice when the merge failed.
    pub fn records(&self) -> &[MergedRecord] {
        self.merged.as_ref().map(|t| t.records.as_slice()).unwrap_or(&[])
    }

    /// Click events, or an empty slice when the click log failed.
    pub fn click_events(&self) -> &[ClickEvent] {
        self.clicks.as_deref().unwrap_or(&[])
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// The newest metrics export.
pub fn resolve_metrics_file(paths: &DataPaths) -> Result<PathBuf> {
    latest_data_file(&paths.metrics_dir, DataSource::Metrics, CSV_EXTENSIONS)
}

/// The newest click log.
pub fn resolve_clicks_file(paths: &DataPaths) -> Result<PathBuf> {
    latest_data_file(&paths.clicks_dir, DataSource::Clicks, CSV_EXTENSIONS)
}

/// The account metadata file: the configured path, or a sibling with the same
/// stem and another supported extension.
pub fn resolve_accounts_file(paths: &DataPaths) -> Result<PathBuf> {
    let configured = &paths.accounts_file;
    if configured.is_file() {
        return Ok(configured.clone());
    }
    SPREADSHEET_EXTENSIONS
        .iter()
        .chain(CSV_EXTENSIONS)
        .map(|ext| configured.with_extension(ext))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| DashboardError::MissingFile {
            source_name: DataSource::Accounts,
            path: configured.clone(),
        })
}

/// Resolve all three sources without reading them.
pub fn resolve_sources(paths: &DataPaths) -> SourceFiles {
    SourceFiles {
        metrics: resolve_metrics_file(paths).ok(),
        accounts: resolve_accounts_file(paths).ok(),
        clicks: resolve_clicks_file(paths).ok(),
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Load, merge and report on every source under `paths`.
///
/// 1. Resolve and load the metrics export.
/// 2. Resolve and load the account metadata.
/// 3. Merge when both succeeded; otherwise carry the first failure.
/// 4. Resolve and load the click log independently.
pub fn load_snapshot(paths: &DataPaths, date_format: &DateFormat, tz: &TimezoneHandler) -> Snapshot {
    let start = Instant::now();
    let mut files = SourceFiles::default();
    let mut issues: Vec<SourceIssue> = Vec::new();

    // ── Step 1: Metrics ───────────────────────────────────────────────────────
    let metrics = load_source(DataSource::Metrics, &mut issues, || {
        let path = resolve_metrics_file(paths)?;
        files.metrics = Some(path.clone());
        load_metrics(&path, date_format)
    });

    // ── Step 2: Accounts ──────────────────────────────────────────────────────
    let accounts = load_source(DataSource::Accounts, &mut issues, || {
        let path = resolve_accounts_file(paths)?;
        files.accounts = Some(path.clone());
        load_accounts(&path)
    });
    let directory = match &accounts {
        Ok(rows) => AccountDirectory::new(rows.clone()),
        Err(_) => AccountDirectory::default(),
    };

    // ── Step 3: Merge ─────────────────────────────────────────────────────────
    let merged = match (metrics, &accounts) {
        (Ok(rows), Ok(_)) => {
            let records = merge(&rows, &directory);
            let stats = MergeStats::from_records(&records);
            Ok(MergedTable { records, stats })
        }
        (Err(issue), _) => Err(issue),
        (Ok(_), Err(issue)) => Err(issue.clone()),
    };

    // ── Step 4: Clicks ────────────────────────────────────────────────────────
    let clicks = load_source(DataSource::Clicks, &mut issues, || {
        let path = resolve_clicks_file(paths)?;
        files.clicks = Some(path.clone());
        load_clicks(&path, tz)
    });

    let metadata = SnapshotMetadata {
        generated_at: Utc::now().to_rfc3339(),
        metric_rows: merged.as_ref().map(|t| t.records.len()).unwrap_or(0),
        accounts: directory.len(),
        click_events: clicks.as_ref().map(Vec::len).unwrap_or(0),
        load_time_seconds: start.elapsed().as_secs_f64(),
    };
    info!(
        "Snapshot loaded in {:.2}s: {} metric rows, {} accounts, {} click events, {} issue(s)",
        metadata.load_time_seconds,
        metadata.metric_rows,
        metadata.accounts,
        metadata.click_events,
        issues.len()
    );

    Snapshot {
        merged,
        clicks,
        directory,
        files,
        issues,
        metadata,
    }
}

fn load_source<T>(
    source: DataSource,
    issues: &mut Vec<SourceIssue>,
    load: impl FnOnce() -> Result<T>,
) -> std::result::Result<T, SourceIssue> {
    load().map_err(|err| {
        warn!("Could not load {} data: {}", source, err);
        let issue = SourceIssue::from_error(source, &err);
        issues.push(issue.clone());
        issue
    })
}

// ── Summaries ─────────────────────────────────────────────────────────────────

/// Headline figures of a merged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub total_records: usize,
    pub accounts: usize,
    /// Sum of `view_count` over every row.
    pub total_views: i64,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub stats: MergeStats,
}

pub fn data_summary(records: &[MergedRecord]) -> DataSummary {
    DataSummary {
        total_records: records.len(),
        accounts: distinct_accounts(records.iter()),
        total_views: records.iter().map(|r| r.metrics.view_count).sum(),
        date_range: date_bounds(records),
        stats: MergeStats::from_records(records),
    }
}

/// The figures compared between two days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonItem {
    Records,
    Accounts,
    TotalViews,
    Clicks,
}

impl ComparisonItem {
    pub fn label(self) -> &'static str {
        match self {
            Self::Records => "Records",
            Self::Accounts => "Accounts",
            Self::TotalViews => "Total Views",
            Self::Clicks => "Clicks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub item: ComparisonItem,
    pub current: i64,
    pub previous: i64,
    pub difference: i64,
    /// `None` when `previous` is 0.
    pub pct: Option<f64>,
}

impl ComparisonRow {
    fn new(item: ComparisonItem, current: i64, previous: i64) -> Self {
        Self {
            item,
            current,
            previous,
            difference: current - previous,
            pct: pct_change(previous as f64, current as f64),
        }
    }
}

/// The latest date of the table against the calendar day before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayComparison {
    pub latest: NaiveDate,
    pub previous: NaiveDate,
    pub rows: Vec<ComparisonRow>,
}

impl DayComparison {
    pub fn get(&self, item: ComparisonItem) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.item == item)
    }
}

/// Compare the latest date with the previous calendar day. `None` for an
/// empty table.
pub fn day_comparison(records: &[MergedRecord], clicks: &[ClickEvent]) -> Option<DayComparison> {
    let latest = latest_date(records)?;
    let previous = latest.pred_opt()?;

    let day = |d: NaiveDate| records.iter().filter(move |r| r.date() == d);
    let views = |d: NaiveDate| day(d).map(|r| r.metrics.view_count).sum::<i64>();

    let rows = vec![
        ComparisonRow::new(
            ComparisonItem::Records,
            day(latest).count() as i64,
            day(previous).count() as i64,
        ),
        ComparisonRow::new(
            ComparisonItem::Accounts,
            distinct_accounts(day(latest)) as i64,
            distinct_accounts(day(previous)) as i64,
        ),
        ComparisonRow::new(ComparisonItem::TotalViews, views(latest), views(previous)),
        ComparisonRow::new(
            ComparisonItem::Clicks,
            clicks_on(clicks, latest) as i64,
            clicks_on(clicks, previous) as i64,
        ),
    ];

    Some(DayComparison {
        latest,
        previous,
        rows,
    })
}

/// Diff sums and click count of one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestDayIncrements {
    pub date: NaiveDate,
    pub diffs: MetricTotals,
    pub clicks: usize,
}

/// Increments on `date`; by default the latest metrics date, falling back to
/// the latest click date.
pub fn latest_day_increments(
    records: &[MergedRecord],
    clicks: &[ClickEvent],
    date: Option<NaiveDate>,
) -> Option<LatestDayIncrements> {
    let date = date
        .or_else(|| latest_date(records))
        .or_else(|| latest_click_date(clicks))?;
    let mut diffs = MetricTotals::for_metrics(&Metric::DIFFS);
    for r in records.iter().filter(|r| r.date() == date) {
        diffs.add_record(r);
    }
    Some(LatestDayIncrements {
        date,
        diffs,
        clicks: clicks_on(clicks, date),
    })
}

fn distinct_accounts<'a>(records: impl Iterator<Item = &'a MergedRecord>) -> usize {
    records.map(|r| r.account_id()).collect::<HashSet<&str>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dashboard_core::models::{MetricRecord, PageType};
    use std::fs;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    fn rec(id: &str, d: u32, view_count: i64, view_diff: i64) -> MergedRecord {
        let mut m = MetricRecord::empty(id, day(d));
        m.view_count = view_count;
        m.view_diff = view_diff;
        MergedRecord {
            metrics: m,
            group: if id == "C" { "Unknown" } else { "g" }.to_string(),
            matched: id != "C",
        }
    }

    fn click(d: u32) -> ClickEvent {
        ClickEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 7, d, 9, 0, 0).unwrap(),
            date: day(d),
            page_url: "https://insnap.ai/videos".to_string(),
            page_type: PageType::Videos,
            session_id: "s".to_string(),
            visitor_id: "v".to_string(),
        }
    }

    const METRICS_HEADER: &str = "user_id,date,view_count,like_count,comment_count,share_count,post_count,view_diff,like_diff,comment_diff,share_diff,post_diff";

    fn write_fixture(dir: &Path) -> DataPaths {
        let paths = DataPaths::under(dir);
        fs::create_dir_all(&paths.metrics_dir).unwrap();
        fs::create_dir_all(paths.accounts_file.parent().unwrap()).unwrap();
        fs::create_dir_all(&paths.clicks_dir).unwrap();
        fs::write(
            paths.metrics_dir.join("redash_data_2025-07-07.csv"),
            format!("{METRICS_HEADER}\nA,2025-07-07,1,0,0,0,0,1,0,0,0,0\n"),
        )
        .unwrap();
        fs::write(
            paths.metrics_dir.join("redash_data_2025-07-08.csv"),
            format!(
                "{METRICS_HEADER}\nA,2025-07-08,1000,10,1,1,2,100,5,1,0,1\nB,2025-07-08,500,5,0,0,1,50,2,0,0,0\n"
            ),
        )
        .unwrap();
        fs::write(
            paths.clicks_dir.join("20250708ClicksInsnap.csv"),
            "timestamp,page_url,page_type,session_id,visitor_id\n2025-07-08T10:00:00Z,https://insnap.ai/videos,videos,s1,v1\n",
        )
        .unwrap();
        paths
    }

    #[test]
    fn test_data_summary() {
        let records = vec![rec("A", 7, 100, 1), rec("A", 8, 150, 50), rec("C", 8, 20, 2)];
        let summary = data_summary(&records);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.accounts, 2);
        assert_eq!(summary.total_views, 270);
        assert_eq!(summary.date_range, Some((day(7), day(8))));
        assert_eq!(summary.stats.matched, 2);
        assert_eq!(data_summary(&[]).date_range, None);
    }

    #[test]
    fn test_day_comparison() {
        let records = vec![rec("A", 7, 100, 1), rec("A", 8, 150, 50), rec("C", 8, 20, 2)];
        let clicks = vec![click(8), click(8)];
        let cmp = day_comparison(&records, &clicks).unwrap();
        assert_eq!(cmp.latest, day(8));
        assert_eq!(cmp.previous, day(7));

        let records_row = cmp.get(ComparisonItem::Records).unwrap();
        assert_eq!((records_row.current, records_row.previous), (2, 1));
        assert_eq!(records_row.pct, Some(100.0));

        let views = cmp.get(ComparisonItem::TotalViews).unwrap();
        assert_eq!(views.difference, 70);
        assert_eq!(views.pct, Some(70.0));

        // no clicks the day before
        assert_eq!(cmp.get(ComparisonItem::Clicks).unwrap().pct, None);
        assert!(day_comparison(&[], &clicks).is_none());
    }

    #[test]
    fn test_day_comparison_gap_uses_calendar_day() {
        let records = vec![rec("A", 5, 100, 1), rec("A", 8, 150, 50)];
        let cmp = day_comparison(&records, &[]).unwrap();
        assert_eq!(cmp.previous, day(7));
        assert_eq!(cmp.get(ComparisonItem::Records).unwrap().previous, 0);
    }

    #[test]
    fn test_latest_day_increments() {
        let records = vec![rec("A", 7, 100, 1), rec("A", 8, 150, 50), rec("C", 8, 20, 2)];
        let inc = latest_day_increments(&records, &[click(8)], None).unwrap();
        assert_eq!(inc.date, day(8));
        assert_eq!(inc.diffs.get(Metric::ViewDiff), 52);
        assert_eq!(inc.clicks, 1);
        let only_clicks = latest_day_increments(&[], &[click(3)], None).unwrap();
        assert_eq!(only_clicks.date, day(3));
        assert!(latest_day_increments(&[], &[], None).is_none());
    }

    #[test]
    fn test_load_snapshot_with_missing_accounts() {
        let tmp = TempDir::new().unwrap();
        let paths = write_fixture(tmp.path());
        let snapshot = load_snapshot(&paths, &DateFormat::Auto, &TimezoneHandler::default());

        let issue = snapshot.merged.as_ref().unwrap_err();
        assert_eq!(issue.source, DataSource::Accounts);
        assert_eq!(issue.kind, IssueKind::MissingFile);
        assert!(snapshot.records().is_empty());
        assert_eq!(snapshot.issues.len(), 1);
        // clicks load independently
        assert_eq!(snapshot.click_events().len(), 1);
    }

    #[test]
    fn test_load_snapshot_full() {
        let tmp = TempDir::new().unwrap();
        let paths = write_fixture(tmp.path());
        let accounts_csv = paths.accounts_file.with_extension("csv");
        fs::write(&accounts_csv, "Tiktok ID,Groups\nA,groupX\n").unwrap();

        let snapshot = load_snapshot(&paths, &DateFormat::Auto, &TimezoneHandler::default());
        let table = snapshot.merged.as_ref().unwrap();
        assert!(snapshot.issues.is_empty());
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].group, "groupX");
        assert_eq!(table.records[1].group, "Unknown");
        assert_eq!(table.stats.matched, 1);
        assert_eq!(
            snapshot.files.metrics.as_ref().unwrap().file_name().unwrap(),
            "redash_data_2025-07-08.csv"
        );
        assert_eq!(snapshot.files.accounts.as_ref(), Some(&accounts_csv));
        assert_eq!(snapshot.files.paths().len(), 3);
    }

    #[test]
    fn test_load_snapshot_empty_data_dir() {
        let tmp = TempDir::new().unwrap();
        let paths = DataPaths::under(tmp.path());
        let snapshot = load_snapshot(&paths, &DateFormat::Auto, &TimezoneHandler::default());
        assert_eq!(snapshot.issues.len(), 3);
        assert!(snapshot.issues.iter().all(|i| i.kind == IssueKind::MissingFile));
        assert_eq!(snapshot.merged.unwrap_err().source, DataSource::Metrics);
    }

    #[test]
    fn test_schema_issue_kind() {
        let err = DashboardError::schema(DataSource::Metrics, "view_count", "missing");
        let issue = SourceIssue::from_error(DataSource::Metrics, &err);
        assert_eq!(issue.kind, IssueKind::Schema);
        assert!(issue.to_string().contains("view_count"));
    }
}
