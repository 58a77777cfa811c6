//! Read-through snapshot cache keyed by input file identity.
//!
//! [`SnapshotCache::get_or_load`] resolves the newest input of each source,
//! fingerprints them by (path, byte length, modification time) and reloads
//! only when the fingerprint changes or the cache was cleared. Snapshots are
//! handed out as `Arc` and never mutated.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashboard_core::dates::{DateFormat, TimezoneHandler};
use dashboard_core::settings::DataPaths;
use dashboard_data::analysis::{load_snapshot, resolve_sources, Snapshot};
use dashboard_data::reader::save_merged_snapshot;
use serde::Serialize;

// ── LoadOptions ───────────────────────────────────────────────────────────────

/// Everything needed to load a snapshot.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub paths: DataPaths,
    pub date_format: DateFormat,
    pub timezone: TimezoneHandler,
    /// Where every fresh merge is also written as CSV.
    pub snapshot_out: Option<PathBuf>,
}

impl LoadOptions {
    pub fn new(paths: DataPaths, date_format: DateFormat, timezone: TimezoneHandler) -> Self {
        Self {
            paths,
            date_format,
            timezone,
            snapshot_out: None,
        }
    }

    pub fn with_snapshot_out(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot_out = path;
        self
    }

    /// Conventional layout under `data_dir` with automatic date and timezone
    /// handling.
    pub fn under(data_dir: &Path) -> Self {
        Self::new(DataPaths::under(data_dir), DateFormat::Auto, TimezoneHandler::default())
    }
}

// ── Fingerprints ──────────────────────────────────────────────────────────────

/// Identity of one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileFingerprint {
    /// `None` when the file cannot be stat'ed.
    pub fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Some(Self {
            path,
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Fingerprints of every resolved input, in source order.
pub fn current_fingerprint(options: &LoadOptions) -> Vec<FileFingerprint> {
    resolve_sources(&options.paths)
        .paths()
        .into_iter()
        .filter_map(FileFingerprint::of)
        .collect()
}

// ── SnapshotCache ─────────────────────────────────────────────────────────────

/// Hit and miss counters of a [`SnapshotCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct CacheEntry {
    key: Vec<FileFingerprint>,
    snapshot: Arc<Snapshot>,
    loaded_at: Instant,
}

/// Per-session cache holding at most one snapshot.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use dashboard_runtime::data_manager::{LoadOptions, SnapshotCache};
///
/// let mut cache = SnapshotCache::new(LoadOptions::under(Path::new("data")));
/// let snapshot = cache.get_or_load();
/// println!("{} merged rows", snapshot.records().len());
/// ```
pub struct SnapshotCache {
    options: LoadOptions,
    entry: Option<CacheEntry>,
    stats: CacheStats,
}

impl SnapshotCache {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            entry: None,
            stats: CacheStats::default(),
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// The cached snapshot when the inputs are unchanged, otherwise a fresh
    /// load that replaces it.
    pub fn get_or_load(&mut self) -> Arc<Snapshot> {
        let key = current_fingerprint(&self.options);
        if let Some(entry) = &self.entry {
            if entry.key == key {
                self.stats.hits += 1;
                tracing::debug!("returning cached snapshot");
                return Arc::clone(&entry.snapshot);
            }
            tracing::info!("input files changed; reloading snapshot");
        }

        self.stats.misses += 1;
        let snapshot = Arc::new(load_snapshot(
            &self.options.paths,
            &self.options.date_format,
            &self.options.timezone,
        ));
        if let (Some(out), Ok(table)) = (&self.options.snapshot_out, &snapshot.merged) {
            match save_merged_snapshot(&table.records, out) {
                Ok(()) => tracing::info!(path = %out.display(), rows = table.records.len(), "merged snapshot written"),
                Err(e) => tracing::warn!(path = %out.display(), error = %e, "could not write merged snapshot"),
            }
        }
        self.entry = Some(CacheEntry {
            key,
            snapshot: Arc::clone(&snapshot),
            loaded_at: Instant::now(),
        });
        snapshot
    }

    /// Drop the cached snapshot; the next [`Self::get_or_load`] reloads.
    pub fn invalidate(&mut self) {
        self.entry = None;
        tracing::debug!("snapshot cache invalidated");
    }

    pub fn is_loaded(&self) -> bool {
        self.entry.is_some()
    }

    /// Age of the cached snapshot, or `None` when nothing is cached.
    pub fn cache_age(&self) -> Option<Duration> {
        self.entry.as_ref().map(|e| e.loaded_at.elapsed())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
