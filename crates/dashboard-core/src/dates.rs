use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

use crate::error::{DashboardError, Result};

// ── DateFormat ────────────────────────────────────────────────────────────────

/// How date cells of the metrics export are interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// ISO first, then `DD/MM/YY`, `DD/MM/YYYY` and `YYYY/MM/DD`.
    #[default]
    Auto,
    /// `YYYY-MM-DD` only.
    Iso,
    /// `DD/MM/YY` or `DD/MM/YYYY`.
    DayMonthYear,
    /// Any chrono format string.
    Custom(String),
}

const ISO_FMT: &str = "%Y-%m-%d";
const DMY_FMTS: &[&str] = &["%d/%m/%y", "%d/%m/%Y"];
const AUTO_FMTS: &[&str] = &["%Y-%m-%d", "%d/%m/%y", "%d/%m/%Y", "%Y/%m/%d"];

impl DateFormat {
    /// Parse one date cell, returning `None` when it does not match.
    ///
    /// A trailing time component (`2025-07-08 00:00:00`, which spreadsheets
    /// and some exports emit) is ignored.
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        match self {
            Self::Iso => parse_with(s, &[ISO_FMT]),
            Self::DayMonthYear => parse_with(s, DMY_FMTS),
            Self::Custom(fmt) => NaiveDate::parse_from_str(s, fmt).ok(),
            Self::Auto => parse_with(s, AUTO_FMTS),
        }
    }
}

fn parse_with(s: &str, fmts: &[&str]) -> Option<NaiveDate> {
    let date_part = s.split([' ', 'T']).next().unwrap_or(s);
    fmts.iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

impl FromStr for DateFormat {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "iso" => Ok(Self::Iso),
            "dmy" => Ok(Self::DayMonthYear),
            _ if s.contains('%') => Ok(Self::Custom(s.trim().to_string())),
            other => Err(DashboardError::DateParse(format!(
                "unknown date format \"{other}\" (expected auto, iso, dmy or a chrono format string)"
            ))),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Iso => f.write_str("iso"),
            Self::DayMonthYear => f.write_str("dmy"),
            Self::Custom(fmt) => f.write_str(fmt),
        }
    }
}

/// Parse a `YYYY-MM-DD` date given by the user (query string, CLI).
pub fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), ISO_FMT)
        .map_err(|e| DashboardError::DateParse(format!("{s}: {e}")))
}

// ── Filename date stamps ──────────────────────────────────────────────────────

fn dashed_stamp() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("regex is valid"))
}

fn compact_stamp() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\D)(\d{4})(\d{2})(\d{2})(?:\D|$)").expect("regex is valid"))
}

/// Extract the date stamp of a data file name.
///
/// Recognises `redash_data_2025-07-08.csv` and `20250708ClicksInsnap.csv`.
pub fn filename_date(name: &str) -> Option<NaiveDate> {
    let ymd = |caps: regex::Captures<'_>| -> Option<NaiveDate> {
        let y = caps.get(1)?.as_str().parse().ok()?;
        let m = caps.get(2)?.as_str().parse().ok()?;
        let d = caps.get(3)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(y, m, d)
    };
    dashed_stamp()
        .captures(name)
        .and_then(ymd)
        .or_else(|| compact_stamp().captures(name).and_then(ymd))
}

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system, `"UTC"` on failure.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Parses click timestamps and assigns them to reporting days.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    tz: Tz,
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl TimezoneHandler {
    /// Build a handler from a `--timezone` value.
    ///
    /// `"auto"` resolves to the system timezone. Unknown names fall back to
    /// UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let name = if tz_name.trim().eq_ignore_ascii_case("auto") {
            get_system_timezone()
        } else {
            tz_name.trim().to_string()
        };
        let tz = name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                name
            );
            Tz::UTC
        });
        Self { tz }
    }

    /// Whether `tz_name` is `auto` or a recognised IANA identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.eq_ignore_ascii_case("auto") || tz_name.parse::<Tz>().is_ok()
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Parse an RFC 3339 or naive timestamp into UTC.
    ///
    /// Naive timestamps are interpreted in the handler's timezone. Returns
    /// `None` for empty or unrecognised input.
    pub fn parse_timestamp(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let normalised = match s.strip_suffix('Z') {
            Some(stripped) => format!("{}+00:00", stripped),
            None => s.to_string(),
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        const FMTS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y/%m/%d %H:%M:%S",
            "%d/%m/%Y %H:%M:%S",
            "%d/%m/%Y %H:%M",
        ];
        for fmt in FMTS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return self.tz.from_local_datetime(&naive).earliest().map(|dt| dt.with_timezone(&Utc));
            }
        }
        None
    }

    /// Calendar day of `dt` in the reporting timezone.
    pub fn local_date(&self, dt: DateTime<Utc>) -> NaiveDate {
        dt.with_timezone(&self.tz).date_naive()
    }
}
