//! Metrics ⨝ account metadata.

use std::collections::HashMap;

use dashboard_core::models::{normalize_account_id, AccountMeta, MergedRecord, MetricRecord, UNKNOWN_GROUP};
use serde::Serialize;
use tracing::{info, warn};

// ── AccountDirectory ──────────────────────────────────────────────────────────

/// Account metadata indexed by normalised account id.
///
/// The first row for an id wins; later rows with a different group are
/// logged and ignored, so a join can never multiply metric rows.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    by_id: HashMap<String, AccountMeta>,
}

impl AccountDirectory {
    pub fn new(accounts: Vec<AccountMeta>) -> Self {
        let mut by_id: HashMap<String, AccountMeta> = HashMap::with_capacity(accounts.len());
        for mut meta in accounts {
            meta.account_id = normalize_account_id(&meta.account_id);
            if meta.group.trim().is_empty() {
                meta.group = UNKNOWN_GROUP.to_string();
            }
            match by_id.get(&meta.account_id) {
                Some(existing) if existing.group != meta.group => {
                    warn!(
                        "Account {} listed with groups \"{}\" and \"{}\"; keeping the first",
                        meta.account_id, existing.group, meta.group
                    );
                }
                Some(_) => {}
                None => {
                    by_id.insert(meta.account_id.clone(), meta);
                }
            }
        }
        Self { by_id }
    }

    pub fn get(&self, account_id: &str) -> Option<&AccountMeta> {
        self.by_id.get(account_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// ── MergeStats ────────────────────────────────────────────────────────────────

/// How well the metrics matched the metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MergeStats {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
}

impl MergeStats {
    pub fn from_records(records: &[MergedRecord]) -> Self {
        let matched = records.iter().filter(|r| r.matched).count();
        Self {
            total: records.len(),
            matched,
            unmatched: records.len() - matched,
        }
    }

    /// Matched share of all rows in percent; `0.0` for an empty table.
    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total as f64 * 100.0
    }
}

// ── merge ─────────────────────────────────────────────────────────────────────

/// Left-join every metric row to its account's group.
///
/// The output has exactly one row per input row, in input order. Rows whose
/// account is absent from `directory` get [`UNKNOWN_GROUP`].
pub fn merge(metrics: &[MetricRecord], directory: &AccountDirectory) -> Vec<MergedRecord> {
    let merged: Vec<MergedRecord> = metrics
        .iter()
        .map(|m| {
            let key = normalize_account_id(&m.account_id);
            match directory.get(&key) {
                Some(meta) => MergedRecord {
                    metrics: m.clone(),
                    group: meta.group.clone(),
                    matched: true,
                },
                None => MergedRecord {
                    metrics: m.clone(),
                    group: UNKNOWN_GROUP.to_string(),
                    matched: false,
                },
            }
        })
        .collect();

    let stats = MergeStats::from_records(&merged);
    info!(
        "Merged {} metric rows: {} matched, {} unmatched ({:.1}% match rate)",
        stats.total,
        stats.matched,
        stats.unmatched,
        stats.match_rate()
    );
    merged
}
