//! Per-browser dashboard sessions.
//!
//! Each session owns its own [`SnapshotCache`] behind a mutex: requests of
//! one session run one at a time while other sessions proceed. The registry
//! itself only maps cookie ids to sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashboard_core::models::MergedRecord;
use dashboard_core::page_types::MappingConfig;
use dashboard_data::analysis::{Snapshot, SourceIssue};
use dashboard_data::reader::merged_csv_bytes;
use uuid::Uuid;

use crate::data_manager::{CacheStats, LoadOptions, SnapshotCache};
use crate::view::{build_view, filtered_records, DashboardView, ViewRequest};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "tiktok_dashboard_session";

// ── DashboardSession ──────────────────────────────────────────────────────────

/// State of one browser session.
pub struct DashboardSession {
    id: String,
    cache: SnapshotCache,
    last_request: Option<ViewRequest>,
    created_at: Instant,
    renders: u64,
}

impl DashboardSession {
    pub fn new(id: impl Into<String>, options: LoadOptions) -> Self {
        Self {
            id: id.into(),
            cache: SnapshotCache::new(options),
            last_request: None,
            created_at: Instant::now(),
            renders: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn snapshot(&mut self) -> Arc<Snapshot> {
        self.cache.get_or_load()
    }

    /// Assemble the view for `request`, loading the snapshot if needed.
    pub fn view(&mut self, request: ViewRequest, mappings: &MappingConfig) -> DashboardView {
        let snapshot = self.snapshot();
        let view = build_view(&snapshot, &request, mappings);
        self.renders += 1;
        self.last_request = Some(request);
        tracing::debug!(session = %self.id, rows = view.filtered_rows, "view assembled");
        view
    }

    /// The filtered merged table for `request`.
    pub fn filtered(&mut self, request: &ViewRequest) -> Result<Vec<MergedRecord>, SourceIssue> {
        let snapshot = self.snapshot();
        filtered_records(&snapshot, request)
    }

    /// The filtered merged table for `request` as CSV bytes.
    pub fn export_csv(&mut self, request: &ViewRequest) -> anyhow::Result<Vec<u8>> {
        let records = self.filtered(request).map_err(|issue| anyhow::anyhow!(issue.message))?;
        Ok(merged_csv_bytes(&records)?)
    }

    /// Drop the cached snapshot so the next render reloads every source.
    pub fn refresh(&mut self) {
        self.cache.invalidate();
        tracing::info!(session = %self.id, "session cache cleared");
    }

    pub fn last_request(&self) -> Option<&ViewRequest> {
        self.last_request.as_ref()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn age_secs(&self) -> u64 {
        self.created_at.elapsed().as_secs()
    }
}

// ── SessionRegistry ───────────────────────────────────────────────────────────

pub type SharedSession = Arc<Mutex<DashboardSession>>;

/// Sessions untouched for this long are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct Entry {
    session: SharedSession,
    last_seen: Instant,
}

/// Cookie id → session, with idle expiry.
pub struct SessionRegistry {
    options: LoadOptions,
    sessions: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// The session for `id`, or a new one when `id` is absent, unknown or
    /// expired. Idle sessions are swept on every call.
    ///
    /// Returns the session id (new or existing), the session, and whether it
    /// was created.
    pub fn get_or_create(&self, id: Option<&str>) -> (String, SharedSession, bool) {
        let mut sessions = lock(&self.sessions);
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_timeout);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!(expired, remaining = sessions.len(), "idle sessions dropped");
        }

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(id) {
                entry.last_seen = now;
                return (id.to_string(), Arc::clone(&entry.session), false);
            }
        }

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(DashboardSession::new(id.clone(), self.options.clone())));
        sessions.insert(
            id.clone(),
            Entry {
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        tracing::info!(session = %id, total = sessions.len(), "session created");
        (id, session, true)
    }

    pub fn get(&self, id: &str) -> Option<SharedSession> {
        lock(&self.sessions).get(id).map(|e| Arc::clone(&e.session))
    }

    pub fn remove(&self, id: &str) -> bool {
        lock(&self.sessions).remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `f` against `session` on tokio's blocking pool.
///
/// Loading a snapshot reads files and parses spreadsheets, so it must not
/// run on the async workers.
pub async fn with_session<T, F>(session: SharedSession, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut DashboardSession) -> T + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let mut guard = lock(&session);
        f(&mut guard)
    })
    .await?;
    Ok(result)
}

/// Lock `mutex`, recovering the data of a poisoned lock.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
