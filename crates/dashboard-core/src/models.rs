use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;

/// Group label given to metric rows whose account has no metadata.
pub const UNKNOWN_GROUP: &str = "Unknown";

/// Base URL of a TikTok profile page; the username is appended after `@`.
pub const PROFILE_URL_BASE: &str = "https://www.tiktok.com/@";

/// The three input sources of a dashboard snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Daily per-account analytics export.
    Metrics,
    /// Account → group metadata spreadsheet.
    Accounts,
    /// Click-tracking log.
    Clicks,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Metrics => "metrics",
            Self::Accounts => "accounts",
            Self::Clicks => "clicks",
        };
        f.write_str(name)
    }
}

// ── Metric ────────────────────────────────────────────────────────────────────

/// A numeric column of the metrics export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ViewCount,
    LikeCount,
    CommentCount,
    ShareCount,
    PostCount,
    ViewDiff,
    LikeDiff,
    CommentDiff,
    ShareDiff,
    PostDiff,
}

impl Metric {
    /// Cumulative count columns, in display order.
    pub const COUNTS: [Metric; 5] = [
        Metric::ViewCount,
        Metric::LikeCount,
        Metric::CommentCount,
        Metric::ShareCount,
        Metric::PostCount,
    ];

    /// Day-over-day delta columns, in display order.
    pub const DIFFS: [Metric; 5] = [
        Metric::ViewDiff,
        Metric::LikeDiff,
        Metric::CommentDiff,
        Metric::ShareDiff,
        Metric::PostDiff,
    ];

    /// Column name as it appears in the export and in URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewCount => "view_count",
            Self::LikeCount => "like_count",
            Self::CommentCount => "comment_count",
            Self::ShareCount => "share_count",
            Self::PostCount => "post_count",
            Self::ViewDiff => "view_diff",
            Self::LikeDiff => "like_diff",
            Self::CommentDiff => "comment_diff",
            Self::ShareDiff => "share_diff",
            Self::PostDiff => "post_diff",
        }
    }

    /// Human-readable label for chart titles and table headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::ViewCount => "Views",
            Self::LikeCount => "Likes",
            Self::CommentCount => "Comments",
            Self::ShareCount => "Shares",
            Self::PostCount => "Posts",
            Self::ViewDiff => "New views",
            Self::LikeDiff => "New likes",
            Self::CommentDiff => "New comments",
            Self::ShareDiff => "New shares",
            Self::PostDiff => "New posts",
        }
    }

    /// `true` for the `_diff` delta columns.
    pub fn is_diff(self) -> bool {
        Self::DIFFS.contains(&self)
    }

    /// The delta column that tracks this count column (identity for deltas).
    pub fn diff_counterpart(self) -> Metric {
        match self {
            Self::ViewCount => Self::ViewDiff,
            Self::LikeCount => Self::LikeDiff,
            Self::CommentCount => Self::CommentDiff,
            Self::ShareCount => Self::ShareDiff,
            Self::PostCount => Self::PostDiff,
            diff => diff,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::COUNTS
            .iter()
            .chain(Self::DIFFS.iter())
            .copied()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| DashboardError::UnknownMetric(s.to_string()))
    }
}

// ── EfficiencyMetric ──────────────────────────────────────────────────────────

/// A per-post ratio derived from a count column and `post_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyMetric {
    ViewPerPost,
    LikePerPost,
    CommentPerPost,
    SharePerPost,
}

impl EfficiencyMetric {
    pub const ALL: [EfficiencyMetric; 4] = [
        EfficiencyMetric::ViewPerPost,
        EfficiencyMetric::LikePerPost,
        EfficiencyMetric::CommentPerPost,
        EfficiencyMetric::SharePerPost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewPerPost => "view_per_post",
            Self::LikePerPost => "like_per_post",
            Self::CommentPerPost => "comment_per_post",
            Self::SharePerPost => "share_per_post",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ViewPerPost => "Views per post",
            Self::LikePerPost => "Likes per post",
            Self::CommentPerPost => "Comments per post",
            Self::SharePerPost => "Shares per post",
        }
    }

    /// Count column divided by `post_count`.
    pub fn numerator(self) -> Metric {
        match self {
            Self::ViewPerPost => Metric::ViewCount,
            Self::LikePerPost => Metric::LikeCount,
            Self::CommentPerPost => Metric::CommentCount,
            Self::SharePerPost => Metric::ShareCount,
        }
    }
}

impl fmt::Display for EfficiencyMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EfficiencyMetric {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| DashboardError::UnknownMetric(s.to_string()))
    }
}

// ── MetricRecord ──────────────────────────────────────────────────────────────

/// One row of the analytics export: one account on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Account identifier, normalised with [`normalize_account_id`].
    pub account_id: String,
    /// Reporting day.
    pub date: NaiveDate,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub post_count: i64,
    /// Day-over-day deltas; `0` when the export lacks the column.
    #[serde(default)]
    pub view_diff: i64,
    #[serde(default)]
    pub like_diff: i64,
    #[serde(default)]
    pub comment_diff: i64,
    #[serde(default)]
    pub share_diff: i64,
    #[serde(default)]
    pub post_diff: i64,
}

impl MetricRecord {
    /// A record with every metric at zero.
    pub fn empty(account_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            account_id: account_id.into(),
            date,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            post_count: 0,
            view_diff: 0,
            like_diff: 0,
            comment_diff: 0,
            share_diff: 0,
            post_diff: 0,
        }
    }

    /// Read the value of `metric`.
    pub fn value(&self, metric: Metric) -> i64 {
        match metric {
            Metric::ViewCount => self.view_count,
            Metric::LikeCount => self.like_count,
            Metric::CommentCount => self.comment_count,
            Metric::ShareCount => self.share_count,
            Metric::PostCount => self.post_count,
            Metric::ViewDiff => self.view_diff,
            Metric::LikeDiff => self.like_diff,
            Metric::CommentDiff => self.comment_diff,
            Metric::ShareDiff => self.share_diff,
            Metric::PostDiff => self.post_diff,
        }
    }

    /// Write the value of `metric`. Only used while building a record.
    pub fn set(&mut self, metric: Metric, value: i64) {
        let slot = match metric {
            Metric::ViewCount => &mut self.view_count,
            Metric::LikeCount => &mut self.like_count,
            Metric::CommentCount => &mut self.comment_count,
            Metric::ShareCount => &mut self.share_count,
            Metric::PostCount => &mut self.post_count,
            Metric::ViewDiff => &mut self.view_diff,
            Metric::LikeDiff => &mut self.like_diff,
            Metric::CommentDiff => &mut self.comment_diff,
            Metric::ShareDiff => &mut self.share_diff,
            Metric::PostDiff => &mut self.post_diff,
        };
        *slot = value;
    }

    /// `numerator / post_count`, or `None` when the account has no posts.
    pub fn efficiency(&self, metric: EfficiencyMetric) -> Option<f64> {
        if self.post_count == 0 {
            return None;
        }
        Some(self.value(metric.numerator()) as f64 / self.post_count as f64)
    }
}

// ── AccountMeta ───────────────────────────────────────────────────────────────

/// Account metadata row from the account detail spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub account_id: String,
    pub group: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub followers: Option<i64>,
    #[serde(default)]
    pub total_likes: Option<i64>,
}

impl AccountMeta {
    pub fn new(account_id: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            group: group.into(),
            username: None,
            followers: None,
            total_likes: None,
        }
    }

    /// Public profile link, when the username is known.
    pub fn profile_url(&self) -> Option<String> {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("{}{}", PROFILE_URL_BASE, u.trim_start_matches('@')))
    }
}

// ── PageType / ClickEvent ─────────────────────────────────────────────────────

/// Coarse landing-page category of a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Videos,
    Download,
    Other,
}

impl PageType {
    pub const ALL: [PageType; 3] = [PageType::Videos, PageType::Download, PageType::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Videos => "videos",
            Self::Download => "download",
            Self::Other => "other",
        }
    }

    /// Map a raw `page_type` cell; anything unrecognised is [`PageType::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "videos" | "video" => Self::Videos,
            "download" | "downloads" => Self::Download,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = DashboardError;

    /// Strict parse used for user input (query strings, config files).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "videos" => Ok(Self::Videos),
            "download" => Ok(Self::Download),
            "other" => Ok(Self::Other),
            other => Err(DashboardError::Config(format!("unknown page type: {other}"))),
        }
    }
}

/// One tracked click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// Instant of the click (UTC).
    pub timestamp: DateTime<Utc>,
    /// Calendar day of the click in the reporting timezone.
    pub date: NaiveDate,
    pub page_url: String,
    pub page_type: PageType,
    pub session_id: String,
    pub visitor_id: String,
}

// ── MergedRecord ──────────────────────────────────────────────────────────────

/// A metric row enriched with its account group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub metrics: MetricRecord,
    /// The account's group, or [`UNKNOWN_GROUP`] when unmatched.
    pub group: String,
    /// Whether the account was found in the metadata.
    pub matched: bool,
}

impl MergedRecord {
    pub fn account_id(&self) -> &str {
        &self.metrics.account_id
    }

    pub fn date(&self) -> NaiveDate {
        self.metrics.date
    }

    pub fn value(&self, metric: Metric) -> i64 {
        self.metrics.value(metric)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Coerce an account identifier to its canonical string form.
///
/// Whitespace is trimmed and integral float renderings (`"123.0"`, which
/// spreadsheets and numeric CSV columns produce) lose their fraction so that
/// both sides of the join compare equal.
pub fn normalize_account_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((int_part, frac)) = trimmed.split_once('.') {
        if !int_part.is_empty()
            && int_part.chars().all(|c| c.is_ascii_digit())
            && !frac.is_empty()
            && frac.chars().all(|c| c == '0')
        {
            return int_part.to_string();
        }
    }
    trimmed.to_string()
}
