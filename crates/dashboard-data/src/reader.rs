//! Input discovery and loading.
//!
//! Finds the newest export in each conventional directory, reads delimited
//! text with `csv` and spreadsheets with `calamine`, and converts rows into
//! [`MetricRecord`], [`AccountMeta`] and [`ClickEvent`] values. Also writes
//! the merged table back out as CSV.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, WriterBuilder};
use dashboard_core::dates::{filename_date, DateFormat, TimezoneHandler};
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::{
    normalize_account_id, AccountMeta, ClickEvent, DataSource, MergedRecord, Metric,
    MetricRecord, PageType,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Extensions read as delimited text.
pub const CSV_EXTENSIONS: &[&str] = &["csv"];

/// Extensions read through the spreadsheet reader.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

// ── Column aliases ────────────────────────────────────────────────────────────

const ACCOUNT_ID_COLUMNS: &[&str] = &["user_id", "account_id"];
const DATE_COLUMNS: &[&str] = &["YMDdate", "date"];
const META_ID_COLUMNS: &[&str] = &["Tiktok ID", "account_id", "user_id"];
const META_GROUP_COLUMNS: &[&str] = &["Groups", "group"];
const META_USERNAME_COLUMNS: &[&str] = &["Tiktok Username", "username"];
const META_FOLLOWERS_COLUMNS: &[&str] = &["Total Followers", "followers"];
const META_LIKES_COLUMNS: &[&str] = &["Total Like", "total_likes"];
const CLICK_TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time"];
const CLICK_URL_COLUMNS: &[&str] = &["page_url"];
const CLICK_PAGE_TYPE_COLUMNS: &[&str] = &["page_type"];
const CLICK_SESSION_COLUMNS: &[&str] = &["session_id"];
const CLICK_VISITOR_COLUMNS: &[&str] = &["visitor_id"];

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Files directly inside `dir` with one of `extensions`, ordered oldest to
/// newest: by the date stamp in the file name, then by name.
pub fn find_data_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Data path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && has_extension(entry.path(), extensions))
        .map(|entry| entry.into_path())
        .collect();

    files.sort_by_cached_key(|path| {
        let name = file_name(path);
        (filename_date(&name), name)
    });
    files
}

/// The newest data file of `source` in `dir`.
pub fn latest_data_file(dir: &Path, source: DataSource, extensions: &[&str]) -> Result<PathBuf> {
    let latest = find_data_files(dir, extensions).pop();
    match latest {
        Some(path) => {
            debug!("Latest {} file: {}", source, path.display());
            Ok(path)
        }
        None => Err(DashboardError::NoDataFiles {
            source_name: source,
            dir: dir.to_path_buf(),
        }),
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ── Raw tables ────────────────────────────────────────────────────────────────

/// A header row plus string cells, whatever the file format.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Index of the first alias present in the header (case-insensitive).
    fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            self.headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias))
        })
    }

    fn require(&self, source: DataSource, aliases: &[&str]) -> Result<usize> {
        self.find(aliases).ok_or_else(|| {
            DashboardError::schema(
                source,
                aliases.join("|"),
                format!(
                    "required column is missing (found: {})",
                    self.headers.join(", ")
                ),
            )
        })
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// Read `path` as a table, choosing the reader by extension.
pub fn read_table(path: &Path, source: DataSource) -> Result<RawTable> {
    if !path.exists() {
        return Err(DashboardError::MissingFile {
            source_name: source,
            path: path.to_path_buf(),
        });
    }
    if has_extension(path, SPREADSHEET_EXTENSIONS) {
        read_spreadsheet_table(path)
    } else {
        read_csv_table(path)
    }
}

fn read_csv_table(path: &Path) -> Result<RawTable> {
    let file = File::open(path).map_err(|e| DashboardError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(RawTable { headers, rows })
}

fn read_spreadsheet_table(path: &Path) -> Result<RawTable> {
    let spreadsheet_err = |detail: String| DashboardError::Spreadsheet {
        path: path.to_path_buf(),
        detail,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| spreadsheet_err("workbook has no sheets".to_string()))?
        .map_err(|e| spreadsheet_err(e.to_string()))?;

    let mut rows_iter = range.rows();
    let headers = rows_iter
        .next()
        .map(|row| row.iter().map(data_to_string).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<String>> = rows_iter
        .map(|row| row.iter().map(data_to_string).collect())
        .collect();

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(RawTable { headers, rows })
}

fn data_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

// ── Cell parsing ──────────────────────────────────────────────────────────────

/// Parse a count cell: blank is `0`, integral floats are accepted, thousands
/// separators are ignored, anything else is a schema error.
fn parse_count(raw: &str, source: DataSource, column: &str, row_num: usize) -> Result<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(0);
    }
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    if let Ok(v) = cleaned.parse::<i64>() {
        return Ok(v);
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v.round() as i64),
        Ok(_) => Ok(0),
        Err(_) => Err(DashboardError::schema(
            source,
            column,
            format!("row {}: non-numeric value \"{}\"", row_num, s),
        )),
    }
}

/// Lenient parse for optional numeric metadata.
fn parse_optional_count(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i64))
}

// ── Loaders ───────────────────────────────────────────────────────────────────

/// Load a metrics export.
///
/// Rows with a blank account id or an unparsable date are skipped and
/// logged; a file in which no row has a parsable date is a schema error on
/// the date column.
pub fn load_metrics(path: &Path, date_format: &DateFormat) -> Result<Vec<MetricRecord>> {
    let source = DataSource::Metrics;
    let table = read_table(path, source)?;

    let id_col = table.require(source, ACCOUNT_ID_COLUMNS)?;
    let date_col = table.require(source, DATE_COLUMNS)?;
    let mut metric_cols: Vec<(Metric, usize)> = Vec::new();
    for metric in Metric::COUNTS {
        metric_cols.push((metric, table.require(source, &[metric.as_str()])?));
    }
    for metric in Metric::DIFFS {
        if let Some(idx) = table.find(&[metric.as_str()]) {
            metric_cols.push((metric, idx));
        }
    }
    let date_header = table.headers[date_col].clone();

    let mut records = Vec::with_capacity(table.rows.len());
    let mut bad_dates = 0usize;
    let mut blank_ids = 0usize;

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = row_idx + 2;
        let account_id = normalize_account_id(cell(row, id_col));
        if account_id.is_empty() {
            blank_ids += 1;
            continue;
        }
        let Some(date) = date_format.parse(cell(row, date_col)) else {
            bad_dates += 1;
            continue;
        };

        let mut record = MetricRecord::empty(account_id, date);
        for (metric, idx) in &metric_cols {
            record.set(*metric, parse_count(cell(row, *idx), source, metric.as_str(), row_num)?);
        }
        records.push(record);
    }

    if records.is_empty() && bad_dates > 0 {
        return Err(DashboardError::schema(
            source,
            date_header,
            format!(
                "no row has a date matching the {} format ({} rows rejected)",
                date_format, bad_dates
            ),
        ));
    }
    if bad_dates > 0 {
        warn!(
            "Skipped {} metrics rows with unparsable dates in {}",
            bad_dates,
            path.display()
        );
    }
    if blank_ids > 0 {
        warn!(
            "Skipped {} metrics rows without an account id in {}",
            blank_ids,
            path.display()
        );
    }

    debug!("Loaded {} metric records from {}", records.len(), path.display());
    Ok(records)
}

/// Load the account metadata table (spreadsheet or CSV).
///
/// Blank group cells become `"Unknown"`; rows without an id are skipped.
pub fn load_accounts(path: &Path) -> Result<Vec<AccountMeta>> {
    let source = DataSource::Accounts;
    let table = read_table(path, source)?;

    let id_col = table.require(source, META_ID_COLUMNS)?;
    let group_col = table.require(source, META_GROUP_COLUMNS)?;
    let username_col = table.find(META_USERNAME_COLUMNS);
    let followers_col = table.find(META_FOLLOWERS_COLUMNS);
    let likes_col = table.find(META_LIKES_COLUMNS);

    let accounts: Vec<AccountMeta> = table
        .rows
        .iter()
        .filter_map(|row| {
            let account_id = normalize_account_id(cell(row, id_col));
            if account_id.is_empty() {
                return None;
            }
            let group = match cell(row, group_col) {
                "" => dashboard_core::models::UNKNOWN_GROUP.to_string(),
                g => g.to_string(),
            };
            Some(AccountMeta {
                account_id,
                group,
                username: username_col
                    .map(|i| cell(row, i).to_string())
                    .filter(|u| !u.is_empty()),
                followers: followers_col.and_then(|i| parse_optional_count(cell(row, i))),
                total_likes: likes_col.and_then(|i| parse_optional_count(cell(row, i))),
            })
        })
        .collect();

    debug!("Loaded {} account rows from {}", accounts.len(), path.display());
    Ok(accounts)
}

/// Load a click log. Each event's `date` is its day in `tz`.
///
/// Rows whose timestamp cannot be parsed are skipped; a file where no
/// timestamp parses is a schema error on the timestamp column.
pub fn load_clicks(path: &Path, tz: &TimezoneHandler) -> Result<Vec<ClickEvent>> {
    let source = DataSource::Clicks;
    let table = read_table(path, source)?;

    let ts_col = table.require(source, CLICK_TIMESTAMP_COLUMNS)?;
    let url_col = table.require(source, CLICK_URL_COLUMNS)?;
    let type_col = table.require(source, CLICK_PAGE_TYPE_COLUMNS)?;
    let session_col = table.require(source, CLICK_SESSION_COLUMNS)?;
    let visitor_col = table.require(source, CLICK_VISITOR_COLUMNS)?;

    let mut events = Vec::with_capacity(table.rows.len());
    let mut bad_timestamps = 0usize;

    for row in &table.rows {
        let raw_ts = cell(row, ts_col);
        let timestamp = tz.parse_timestamp(raw_ts).or_else(|| {
            DateFormat::Auto
                .parse(raw_ts)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .and_then(|naive| tz.parse_timestamp(&naive.format("%Y-%m-%d %H:%M:%S").to_string()))
        });
        let Some(timestamp) = timestamp else {
            bad_timestamps += 1;
            continue;
        };

        events.push(ClickEvent {
            timestamp,
            date: tz.local_date(timestamp),
            page_url: cell(row, url_col).to_string(),
            page_type: PageType::from_label(cell(row, type_col)),
            session_id: cell(row, session_col).to_string(),
            visitor_id: cell(row, visitor_col).to_string(),
        });
    }

    if events.is_empty() && bad_timestamps > 0 {
        return Err(DashboardError::schema(
            source,
            table.headers[ts_col].clone(),
            format!("no row has a parsable timestamp ({} rows rejected)", bad_timestamps),
        ));
    }
    if bad_timestamps > 0 {
        warn!(
            "Skipped {} click rows with unparsable timestamps in {}",
            bad_timestamps,
            path.display()
        );
    }

    events.sort_by_key(|e| e.timestamp);
    debug!("Loaded {} click events from {}", events.len(), path.display());
    Ok(events)
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// One row of the merged snapshot / filtered export.
#[derive(Debug, Clone, Serialize)]
pub struct MergedCsvRow<'a> {
    pub date: String,
    pub account_id: &'a str,
    pub group: &'a str,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub post_count: i64,
    pub view_diff: i64,
    pub like_diff: i64,
    pub comment_diff: i64,
    pub share_diff: i64,
    pub post_diff: i64,
}

impl<'a> From<&'a MergedRecord> for MergedCsvRow<'a> {
    fn from(r: &'a MergedRecord) -> Self {
        let m = &r.metrics;
        Self {
            date: m.date.format("%Y-%m-%d").to_string(),
            account_id: &m.account_id,
            group: &r.group,
            view_count: m.view_count,
            like_count: m.like_count,
            comment_count: m.comment_count,
            share_count: m.share_count,
            post_count: m.post_count,
            view_diff: m.view_diff,
            like_diff: m.like_diff,
            comment_diff: m.comment_diff,
            share_diff: m.share_diff,
            post_diff: m.post_diff,
        }
    }
}

/// Serialize merged rows as CSV into `writer`.
pub fn write_merged_csv<W: Write>(records: &[MergedRecord], writer: W) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    if records.is_empty() {
        // serde only emits the header with the first row
        csv_writer.write_record([
            "date",
            "account_id",
            "group",
            "view_count",
            "like_count",
            "comment_count",
            "share_count",
            "post_count",
            "view_diff",
            "like_diff",
            "comment_diff",
            "share_diff",
            "post_diff",
        ])?;
    }
    for record in records {
        csv_writer.serialize(MergedCsvRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Merged rows as an in-memory CSV document.
pub fn merged_csv_bytes(records: &[MergedRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_merged_csv(records, &mut buf)?;
    Ok(buf)
}

/// Write the merged snapshot to `path`, replacing it atomically.
pub fn save_merged_snapshot(records: &[MergedRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let file = File::create(&tmp).map_err(|e| DashboardError::FileRead {
            path: tmp.clone(),
            source: e,
        })?;
        write_merged_csv(records, BufWriter::new(file))?;
    }
    std::fs::rename(&tmp, path)?;
    debug!("Wrote {} merged rows to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const METRICS_HEADER: &str = "user_id,date,view_count,like_count,comment_count,share_count,post_count,view_diff,like_diff,comment_diff,share_diff,post_diff";

    // ── Discovery ────────────────────────────────────────────────────────────

    #[test]
    fn test_find_data_files_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(find_data_files(&tmp.path().join("nope"), CSV_EXTENSIONS).is_empty());
    }

    #[test]
    fn test_latest_file_by_date_stamp() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "redash_data_2025-07-08.csv", "");
        write(tmp.path(), "redash_data_2025-07-10.csv", "");
        write(tmp.path(), "redash_data_2025-07-09.csv", "");
        write(tmp.path(), "notes.txt", "");
        let latest = latest_data_file(tmp.path(), DataSource::Metrics, CSV_EXTENSIONS).unwrap();
        assert_eq!(file_name(&latest), "redash_data_2025-07-10.csv");
    }

    #[test]
    fn test_dated_files_sort_after_undated() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "zzz_manual.csv", "");
        write(tmp.path(), "20250701ClicksInsnap.csv", "");
        let files = find_data_files(tmp.path(), CSV_EXTENSIONS);
        assert_eq!(file_name(&files[0]), "zzz_manual.csv");
        assert_eq!(file_name(&files[1]), "20250701ClicksInsnap.csv");
    }

    #[test]
    fn test_latest_file_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let err = latest_data_file(tmp.path(), DataSource::Clicks, CSV_EXTENSIONS).unwrap_err();
        assert!(matches!(err, DashboardError::NoDataFiles { .. }));
        assert!(err.is_missing_input());
    }

    // ── Metrics ──────────────────────────────────────────────────────────────

    #[test]
    fn test_load_metrics_basic() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "m.csv",
            &format!(
                "{METRICS_HEADER}\nA,2025-07-08,1000,50,5,2,3,100,10,1,0,1\nB,2025-07-08,500,20,2,1,0,50,-4,0,0,0\n"
            ),
        );
        let records = load_metrics(&path, &DateFormat::Auto).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].account_id, "A");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2025, 7, 8).unwrap());
        assert_eq!(records[0].view_diff, 100);
        assert_eq!(records[1].like_diff, -4);
    }

    #[test]
    fn test_load_metrics_missing_diff_columns_default_to_zero() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "m.csv",
            "user_id,YMDdate,view_count,like_count,comment_count,share_count,post_count\n123.0,08/07/25,10,1,0,0,1\n",
        );
        let records = load_metrics(&path, &DateFormat::Auto).unwrap();
        assert_eq!(records[0].account_id, "123");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2025, 7, 8).unwrap());
        assert_eq!(records[0].view_diff, 0);
    }

    #[test]
    fn test_load_metrics_blank_numbers_are_zero() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "m.csv",
            &format!("{METRICS_HEADER}\nA,2025-07-08,,\"1,200\",0,0,1,5.0,,,,\n"),
        );
        let records = load_metrics(&path, &DateFormat::Auto).unwrap();
        assert_eq!(records[0].view_count, 0);
        assert_eq!(records[0].like_count, 1200);
        assert_eq!(records[0].view_diff, 5);
    }

    #[test]
    fn test_load_metrics_missing_column_names_it() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "m.csv",
            "user_id,date,view_count,like_count,comment_count,share_count\nA,2025-07-08,1,1,1,1\n",
        );
        let err = load_metrics(&path, &DateFormat::Auto).unwrap_err();
        match err {
            DashboardError::Schema { column, .. } => assert_eq!(column, "post_count"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_metrics_non_numeric_names_column_and_row() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "m.csv",
            &format!("{METRICS_HEADER}\nA,2025-07-08,1,1,1,1,1,0,0,0,0,0\nB,2025-07-08,lots,1,1,1,1,0,0,0,0,0\n"),
        );
        let msg = load_metrics(&path, &DateFormat::Auto).unwrap_err().to_string();
        assert!(msg.contains("view_count"));
        assert!(msg.contains("row 3"));
        assert!(msg.contains("lots"));
    }

    #[test]
    fn test_load_metrics_skips_bad_dates() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "m.csv",
            &format!("{METRICS_HEADER}\nA,2025-07-08,1,1,1,1,1,0,0,0,0,0\nB,someday,1,1,1,1,1,0,0,0,0,0\n"),
        );
        let records = load_metrics(&path, &DateFormat::Auto).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_load_metrics_all_dates_bad_is_schema_error() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "m.csv",
            &format!("{METRICS_HEADER}\nA,08/07/25,1,1,1,1,1,0,0,0,0,0\n"),
        );
        let err = load_metrics(&path, &DateFormat::Iso).unwrap_err();
        match err {
            DashboardError::Schema { column, .. } => assert_eq!(column, "date"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_metrics_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_metrics(&tmp.path().join("none.csv"), &DateFormat::Auto).unwrap_err();
        assert!(err.is_missing_input());
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    #[test]
    fn test_load_accounts_csv() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "accounts_detail.csv",
            "Tiktok ID,Groups,Tiktok Username,Total Followers\n123.0,groupX,creator_a,\"1,500\"\n456,,creator_b,n/a\n,groupY,,\n",
        );
        let accounts = load_accounts(&path).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].account_id, "123");
        assert_eq!(accounts[0].group, "groupX");
        assert_eq!(accounts[0].username.as_deref(), Some("creator_a"));
        assert_eq!(accounts[0].followers, Some(1500));
        assert_eq!(accounts[1].group, "Unknown");
        assert_eq!(accounts[1].followers, None);
    }

    #[test]
    fn test_load_accounts_missing_group_column() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "a.csv", "Tiktok ID,Name\n1,x\n");
        let err = load_accounts(&path).unwrap_err();
        assert!(err.to_string().contains("Groups|group"));
    }

    #[test]
    fn test_load_accounts_broken_spreadsheet() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "accounts_detail.xlsx", "not a zip archive");
        let err = load_accounts(&path).unwrap_err();
        assert!(matches!(err, DashboardError::Spreadsheet { .. }));
    }

    // ── Clicks ───────────────────────────────────────────────────────────────

    #[test]
    fn test_load_clicks() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "20250708ClicksInsnap.csv",
            "timestamp,page_url,page_type,session_id,visitor_id\n\
             2025-07-08T20:00:00Z,https://insnap.ai/videos,videos,s1,v1\n\
             2025-07-08T01:00:00Z,https://insnap.ai/zh/download,download,s2,v2\n\
             garbage,https://insnap.ai/,landing,s3,v3\n",
        );
        let tz = TimezoneHandler::new("Asia/Shanghai");
        let events = load_clicks(&path, &tz).unwrap();
        assert_eq!(events.len(), 2);
        // sorted by timestamp
        assert_eq!(events[0].page_type, PageType::Download);
        assert_eq!(events[1].date, NaiveDate::from_ymd_opt(2025, 7, 9).unwrap());
    }

    #[test]
    fn test_load_clicks_date_only_timestamps() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "c.csv",
            "timestamp,page_url,page_type,session_id,visitor_id\n2025-07-08,u,other,s,v\n",
        );
        let events = load_clicks(&path, &TimezoneHandler::default()).unwrap();
        assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2025, 7, 8).unwrap());
    }

    #[test]
    fn test_load_clicks_missing_visitor_column() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "c.csv",
            "timestamp,page_url,page_type,session_id\n2025-07-08T00:00:00Z,u,videos,s\n",
        );
        let err = load_clicks(&path, &TimezoneHandler::default()).unwrap_err();
        assert!(err.to_string().contains("visitor_id"));
    }

    // ── Writers ──────────────────────────────────────────────────────────────

    #[test]
    fn test_merged_csv_header_for_empty_table() {
        let bytes = merged_csv_bytes(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("date,account_id,group,view_count"));
    }

    #[test]
    fn test_save_merged_snapshot() {
        let tmp = TempDir::new().unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();
        let mut metrics = MetricRecord::empty("A", day);
        metrics.view_diff = 100;
        let records = vec![MergedRecord {
            metrics,
            group: "groupX".to_string(),
            matched: true,
        }];
        let out = tmp.path().join("out").join("merged.csv");
        save_merged_snapshot(&records, &out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("date,account_id,group"));
        assert_eq!(lines.next().unwrap(), "2025-07-08,A,groupX,0,0,0,0,0,100,0,0,0,0");
    }
}
