use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dates::{DateFormat, TimezoneHandler};
use crate::error::{DashboardError, Result};
use crate::page_types::MappingConfig;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// TikTok account performance dashboard
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tiktok-dashboard",
    about = "TikTok account performance dashboard",
    version
)]
pub struct Settings {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Bind address of the web server
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Port of the web server
    #[arg(long, default_value = "8501", global = true)]
    pub port: u16,

    /// Root of the conventional data directories
    #[arg(long, default_value = "data", env = "TIKTOK_DASHBOARD_DATA", global = true)]
    pub data_dir: PathBuf,

    /// Directory of the metrics exports (default: <data-dir>/redash_data)
    #[arg(long, global = true)]
    pub metrics_dir: Option<PathBuf>,

    /// Account metadata spreadsheet (default: <data-dir>/postingManager_data/accounts_detail.xlsx)
    #[arg(long, global = true)]
    pub accounts_file: Option<PathBuf>,

    /// Directory of the click logs (default: <data-dir>/clicks)
    #[arg(long, global = true)]
    pub clicks_dir: Option<PathBuf>,

    /// Date format of the metrics export: auto, iso, dmy or a chrono format string
    #[arg(long, default_value = "auto", global = true)]
    pub date_format: String,

    /// Reporting timezone for click timestamps (auto-detected if not specified)
    #[arg(long, default_value = "auto", global = true)]
    pub timezone: String,

    /// Display theme
    #[arg(long, default_value = "light", value_parser = ["light", "dark"], global = true)]
    pub theme: String,

    /// Mapping rule file (default: ~/.tiktok-dashboard/mappings.json)
    #[arg(long, global = true)]
    pub mappings: Option<PathBuf>,

    /// Write the merged snapshot as CSV after every fresh load
    #[arg(long, global = true)]
    pub snapshot_out: Option<PathBuf>,

    /// Minutes before an idle browser session and its snapshot are dropped
    #[arg(long, default_value = "30", global = true)]
    pub session_idle_minutes: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"], global = true)]
    pub log_level: String,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the web dashboard (default)
    Serve,
    /// Copy new exports into the conventional data directories
    Import {
        /// Metrics export (CSV)
        #[arg(long)]
        metrics: Option<PathBuf>,
        /// Click log (CSV)
        #[arg(long)]
        clicks: Option<PathBuf>,
        /// Account metadata (xlsx, xls, ods or csv)
        #[arg(long)]
        accounts: Option<PathBuf>,
    },
    /// Merge the current inputs and write the snapshot CSV, then exit
    Snapshot {
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },
}

// ── DataPaths ─────────────────────────────────────────────────────────────────

/// Locations of the three inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub metrics_dir: PathBuf,
    pub accounts_file: PathBuf,
    pub clicks_dir: PathBuf,
}

impl DataPaths {
    /// The conventional layout below `data_dir`.
    pub fn under(data_dir: &Path) -> Self {
        Self {
            metrics_dir: data_dir.join("redash_data"),
            accounts_file: data_dir
                .join("postingManager_data")
                .join("accounts_detail.xlsx"),
            clicks_dir: data_dir.join("clicks"),
        }
    }

    /// Destination of an imported metrics export dated `day`.
    pub fn metrics_target(&self, day: NaiveDate) -> PathBuf {
        self.metrics_dir
            .join(format!("redash_data_{}.csv", day.format("%Y-%m-%d")))
    }

    /// Destination of an imported click log dated `day`.
    pub fn clicks_target(&self, day: NaiveDate) -> PathBuf {
        self.clicks_dir
            .join(format!("{}ClicksInsnap.csv", day.format("%Y%m%d")))
    }

    /// Destination of an imported account spreadsheet with extension `ext`.
    pub fn accounts_target(&self, ext: &str) -> PathBuf {
        self.accounts_file.with_extension(ext.to_lowercase())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// The subcommand to run; `serve` when none was given.
    pub fn effective_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Input locations, with explicit flags overriding the conventions.
    pub fn data_paths(&self) -> DataPaths {
        let defaults = DataPaths::under(&self.data_dir);
        DataPaths {
            metrics_dir: self.metrics_dir.clone().unwrap_or(defaults.metrics_dir),
            accounts_file: self.accounts_file.clone().unwrap_or(defaults.accounts_file),
            clicks_dir: self.clicks_dir.clone().unwrap_or(defaults.clicks_dir),
        }
    }

    pub fn parsed_date_format(&self) -> Result<DateFormat> {
        self.date_format.parse()
    }

    pub fn timezone_handler(&self) -> TimezoneHandler {
        TimezoneHandler::new(&self.timezone)
    }

    pub fn mappings_path(&self) -> PathBuf {
        self.mappings.clone().unwrap_or_else(MappingConfig::config_path)
    }

    pub fn load_mappings(&self) -> MappingConfig {
        MappingConfig::load_from(&self.mappings_path())
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes.saturating_mul(60))
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    pub fn resolve(mut self) -> Self {
        if self.timezone.eq_ignore_ascii_case("auto") {
            self.timezone = crate::dates::get_system_timezone();
        }
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// Reject values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(DashboardError::Config("port must be non-zero".to_string()));
        }
        if self.session_idle_minutes == 0 {
            return Err(DashboardError::Config(
                "session idle timeout must be non-zero".to_string(),
            ));
        }
        if !TimezoneHandler::validate_timezone(&self.timezone) {
            return Err(DashboardError::Config(format!(
                "unknown timezone \"{}\"",
                self.timezone
            )));
        }
        self.parsed_date_format()?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        let mut full = vec!["tiktok-dashboard"];
        full.extend_from_slice(args);
        Settings::parse_from(full)
    }

    #[test]
    fn test_settings_default_values() {
        let settings = parse(&[]);
        assert!(settings.command.is_none());
        assert_eq!(settings.effective_command(), Command::Serve);
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 8501);
        assert_eq!(settings.date_format, "auto");
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(settings.snapshot_out.is_none());
        assert!(!settings.debug);
        assert_eq!(settings.bind_address(), "127.0.0.1:8501");
        assert_eq!(settings.session_idle_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_default_data_paths() {
        let settings = parse(&["--data-dir", "/srv/data"]);
        let paths = settings.data_paths();
        assert_eq!(paths.metrics_dir, PathBuf::from("/srv/data/redash_data"));
        assert_eq!(
            paths.accounts_file,
            PathBuf::from("/srv/data/postingManager_data/accounts_detail.xlsx")
        );
        assert_eq!(paths.clicks_dir, PathBuf::from("/srv/data/clicks"));
    }

    #[test]
    fn test_explicit_paths_override_conventions() {
        let settings = parse(&[
            "--data-dir",
            "/srv/data",
            "--accounts-file",
            "/tmp/accounts.csv",
            "--clicks-dir",
            "/tmp/clicks",
        ]);
        let paths = settings.data_paths();
        assert_eq!(paths.metrics_dir, PathBuf::from("/srv/data/redash_data"));
        assert_eq!(paths.accounts_file, PathBuf::from("/tmp/accounts.csv"));
        assert_eq!(paths.clicks_dir, PathBuf::from("/tmp/clicks"));
    }

    #[test]
    fn test_import_targets() {
        let paths = DataPaths::under(Path::new("data"));
        let day = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();
        assert_eq!(
            paths.metrics_target(day),
            PathBuf::from("data/redash_data/redash_data_2025-07-08.csv")
        );
        assert_eq!(
            paths.clicks_target(day),
            PathBuf::from("data/clicks/20250708ClicksInsnap.csv")
        );
        assert_eq!(
            paths.accounts_target("CSV"),
            PathBuf::from("data/postingManager_data/accounts_detail.csv")
        );
    }

    #[test]
    fn test_subcommands() {
        let settings = parse(&["import", "--metrics", "export.csv", "--data-dir", "d"]);
        assert_eq!(
            settings.effective_command(),
            Command::Import {
                metrics: Some(PathBuf::from("export.csv")),
                clicks: None,
                accounts: None,
            }
        );
        assert_eq!(settings.data_dir, PathBuf::from("d"));

        let settings = parse(&["snapshot", "--out", "merged.csv"]);
        assert_eq!(
            settings.effective_command(),
            Command::Snapshot {
                out: PathBuf::from("merged.csv")
            }
        );
    }

    #[test]
    fn test_resolve_debug_overrides_log_level() {
        let settings = parse(&["--debug", "--timezone", "UTC"]).resolve();
        assert_eq!(settings.log_level, "DEBUG");
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn test_resolve_auto_timezone() {
        let settings = parse(&[]).resolve();
        assert_ne!(settings.timezone, "auto");
        assert!(!settings.timezone.is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(parse(&["--timezone", "Asia/Shanghai"]).validate().is_ok());
        assert!(parse(&["--timezone", "Mars/Olympus"]).validate().is_err());
        assert!(parse(&["--port", "0"]).validate().is_err());
        assert!(parse(&["--timezone", "UTC", "--session-idle-minutes", "0"]).validate().is_err());
        assert!(parse(&["--date-format", "weekly"]).validate().is_err());
        assert!(parse(&["--date-format", "%d.%m.%Y"]).validate().is_ok());
    }

    #[test]
    fn test_invalid_theme_rejected() {
        let result = Settings::try_parse_from(["tiktok-dashboard", "--theme", "classic"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mappings_path_override() {
        let settings = parse(&["--mappings", "/etc/rules.json"]);
        assert_eq!(settings.mappings_path(), PathBuf::from("/etc/rules.json"));
    }
}
