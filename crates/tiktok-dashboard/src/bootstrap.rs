use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use dashboard_core::page_types::MappingConfig;
use dashboard_core::settings::DataPaths;
use dashboard_data::reader::{CSV_EXTENSIONS, SPREADSHEET_EXTENSIONS};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// `~/.tiktok-dashboard/`, or `./.tiktok-dashboard/` without a home directory.
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tiktok-dashboard")
}

/// Ensure `~/.tiktok-dashboard/` and its `logs/` subdirectory exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    let dir = app_dir();
    std::fs::create_dir_all(&dir)?;
    std::fs::create_dir_all(dir.join("logs"))?;
    Ok(())
}

/// Write the built-in mapping rules to `path` when no file exists there.
///
/// Returns `true` when the file was created.
pub fn ensure_mappings(path: &Path) -> anyhow::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    MappingConfig::default()
        .save_to(path)
        .with_context(|| format!("writing default mappings to {}", path.display()))?;
    Ok(true)
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to an [`EnvFilter`] directive.
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr; with `log_file` a second, uncoloured layer appends
/// to that file.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file_layer)
        .init();

    Ok(())
}

// ── Data import ────────────────────────────────────────────────────────────────

/// Files copied by one `import` run: `(source, destination)`.
pub type Imported = Vec<(PathBuf, PathBuf)>;

/// Copy new exports into the conventional directories, stamped with `today`.
///
/// Metrics land in `redash_data_<today>.csv`, click logs in
/// `<today>ClicksInsnap.csv` and the account sheet replaces
/// `accounts_detail.<ext>`. Account files under the other supported
/// extensions are removed so the new sheet is the one that gets loaded.
pub fn import_inputs(
    paths: &DataPaths,
    today: NaiveDate,
    metrics: Option<&Path>,
    clicks: Option<&Path>,
    accounts: Option<&Path>,
) -> anyhow::Result<Imported> {
    if metrics.is_none() && clicks.is_none() && accounts.is_none() {
        bail!("nothing to import: pass --metrics, --clicks or --accounts");
    }

    let mut copied = Vec::new();
    if let Some(src) = metrics {
        copied.push(copy_into(src, paths.metrics_target(today))?);
    }
    if let Some(src) = clicks {
        copied.push(copy_into(src, paths.clicks_target(today))?);
    }
    if let Some(src) = accounts {
        let ext = src
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) && !CSV_EXTENSIONS.contains(&ext.as_str()) {
            bail!("unsupported account file type: {}", src.display());
        }
        copied.push(copy_into(src, paths.accounts_target(&ext))?);
        remove_stale_accounts(paths, &ext)?;
    }
    Ok(copied)
}

fn remove_stale_accounts(paths: &DataPaths, kept: &str) -> anyhow::Result<()> {
    for ext in SPREADSHEET_EXTENSIONS.iter().chain(CSV_EXTENSIONS) {
        if *ext == kept {
            continue;
        }
        let stale = paths.accounts_target(ext);
        if stale.is_file() {
            std::fs::remove_file(&stale).with_context(|| format!("removing {}", stale.display()))?;
            tracing::info!(path = %stale.display(), "removed replaced account file");
        }
    }
    Ok(())
}

fn copy_into(src: &Path, dest: PathBuf) -> anyhow::Result<(PathBuf, PathBuf)> {
    if !src.is_file() {
        bail!("no such file: {}", src.display());
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, &dest).with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
    tracing::info!(from = %src.display(), to = %dest.display(), "imported");
    Ok((src.to_path_buf(), dest))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_data::analysis::resolve_accounts_file;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        // Point HOME at the temp dir so dirs::home_dir() resolves there.
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let result = ensure_directories();

        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        result.expect("ensure_directories should succeed");
        let dir = tmp.path().join(".tiktok-dashboard");
        assert!(dir.is_dir());
        assert!(dir.join("logs").is_dir());
    }

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive("nonsense"), "info");
    }

    #[test]
    fn test_ensure_mappings_writes_defaults_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cfg").join("mappings.json");
        assert!(ensure_mappings(&path).unwrap());
        assert_eq!(MappingConfig::load_from(&path), MappingConfig::default());

        fs::write(&path, "{\"page_type_rules\": []}").unwrap();
        assert!(!ensure_mappings(&path).unwrap());
        assert!(fs::read_to_string(&path).unwrap().contains("[]"));
    }

    #[test]
    fn test_import_inputs() {
        let tmp = TempDir::new().unwrap();
        let downloads = tmp.path().join("downloads");
        fs::create_dir_all(&downloads).unwrap();
        let metrics = downloads.join("query_result.csv");
        let clicks = downloads.join("clicks export.csv");
        let accounts = downloads.join("Accounts.XLSX");
        fs::write(&metrics, "user_id,date\n").unwrap();
        fs::write(&clicks, "timestamp\n").unwrap();
        fs::write(&accounts, "sheet").unwrap();

        let paths = DataPaths::under(&tmp.path().join("data"));
        let today = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();
        let copied = import_inputs(&paths, today, Some(&metrics), Some(&clicks), Some(&accounts)).unwrap();

        assert_eq!(copied.len(), 3);
        assert!(paths.metrics_dir.join("redash_data_2025-07-08.csv").is_file());
        assert!(paths.clicks_dir.join("20250708ClicksInsnap.csv").is_file());
        assert!(paths.accounts_file.with_extension("xlsx").is_file());
    }

    #[test]
    fn test_import_accounts_replaces_other_format() {
        let tmp = TempDir::new().unwrap();
        let paths = DataPaths::under(&tmp.path().join("data"));
        fs::create_dir_all(paths.accounts_file.parent().unwrap()).unwrap();
        let old = paths.accounts_target("xlsx");
        fs::write(&old, "old sheet").unwrap();

        let accounts = tmp.path().join("accounts.csv");
        fs::write(&accounts, "Tiktok ID,Groups\nA,g\n").unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();
        import_inputs(&paths, today, None, None, Some(&accounts)).unwrap();

        assert!(!old.exists());
        assert_eq!(
            resolve_accounts_file(&paths).unwrap(),
            paths.accounts_target("csv")
        );
    }

    #[test]
    fn test_import_rejects_bad_input() {
        let tmp = TempDir::new().unwrap();
        let paths = DataPaths::under(tmp.path());
        let today = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();

        assert!(import_inputs(&paths, today, None, None, None).is_err());
        assert!(import_inputs(&paths, today, Some(Path::new("/no/such.csv")), None, None).is_err());

        let odd = tmp.path().join("accounts.txt");
        fs::write(&odd, "x").unwrap();
        assert!(import_inputs(&paths, today, None, None, Some(&odd)).is_err());
    }
}
