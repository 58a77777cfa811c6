use std::path::PathBuf;
use thiserror::Error;

use crate::models::DataSource;

/// All errors produced by the dashboard crates.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required input file does not exist.
    #[error("Missing {source_name} file: {path}")]
    MissingFile {
        source_name: DataSource,
        path: PathBuf,
    },

    /// A data directory holds no file matching the naming convention.
    #[error("No {source_name} files found in {dir}")]
    NoDataFiles {
        source_name: DataSource,
        dir: PathBuf,
    },

    /// A required column is absent or holds values of the wrong type.
    #[error("Schema error in {source_name} data, column `{column}`: {detail}")]
    Schema {
        source_name: DataSource,
        column: String,
        detail: String,
    },

    /// A delimited text file could not be parsed or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A spreadsheet could not be opened or decoded.
    #[error("Spreadsheet error in {path}: {detail}")]
    Spreadsheet { path: PathBuf, detail: String },

    /// A date string did not match the configured format.
    #[error("Invalid date: {0}")]
    DateParse(String),

    /// A date range whose start lies after its end.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// A metric name that is not one of the known columns.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DashboardError {
    /// Build a [`DashboardError::Schema`] for `column` of `source_name`.
    pub fn schema(
        source_name: DataSource,
        column: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Schema {
            source_name,
            column: column.into(),
            detail: detail.into(),
        }
    }

    /// `true` for the "input absent" family of errors.
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            Self::MissingFile { .. } | Self::NoDataFiles { .. }
        )
    }
}

/// Convenience alias used throughout the dashboard crates.
pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = DashboardError::FileRead {
            path: PathBuf::from("/data/redash_data/redash_data_2025-07-08.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("redash_data_2025-07-08.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_missing_file() {
        let err = DashboardError::MissingFile {
            source_name: DataSource::Accounts,
            path: PathBuf::from("/data/accounts_detail.xlsx"),
        };
        assert_eq!(
            err.to_string(),
            "Missing accounts file: /data/accounts_detail.xlsx"
        );
        assert!(err.is_missing_input());
    }

    #[test]
    fn test_error_display_no_data_files() {
        let err = DashboardError::NoDataFiles {
            source_name: DataSource::Clicks,
            dir: PathBuf::from("/data/clicks"),
        };
        assert_eq!(err.to_string(), "No clicks files found in /data/clicks");
        assert!(err.is_missing_input());
    }

    #[test]
    fn test_error_display_schema_names_column() {
        let err = DashboardError::schema(DataSource::Metrics, "view_count", "column is missing");
        assert_eq!(
            err.to_string(),
            "Schema error in metrics data, column `view_count`: column is missing"
        );
        assert!(!err.is_missing_input());
    }

    #[test]
    fn test_error_display_invalid_range() {
        let err = DashboardError::InvalidDateRange {
            start: chrono::NaiveDate::from_ymd_opt(2025, 7, 9).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid date range: 2025-07-09 is after 2025-07-01"
        );
    }

    #[test]
    fn test_error_display_unknown_metric() {
        let err = DashboardError::UnknownMetric("retweet_count".to_string());
        assert_eq!(err.to_string(), "Unknown metric: retweet_count");
    }

    #[test]
    fn test_error_display_config() {
        let err = DashboardError::Config("port must be non-zero".to_string());
        assert_eq!(err.to_string(), "Configuration error: port must be non-zero");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DashboardError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: DashboardError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
