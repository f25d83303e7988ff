use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use snipsync_core::MergeReport;

/// Process-wide exchange counters reported by `/healthz`
#[derive(Default)]
pub struct SyncMetrics {
    pushes: AtomicU64,
    pushes_rejected: AtomicU64,
    pulls: AtomicU64,
    full_syncs: AtomicU64,
    inserted: AtomicU64,
    updated: AtomicU64,
    stale: AtomicU64,
    dangling: AtomicU64,
    linked: AtomicU64,
    deleted: AtomicU64,
    tombstoned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetricsSnapshot {
    pub pushes: u64,
    pub pushes_rejected: u64,
    pub pulls: u64,
    pub full_syncs: u64,
    pub inserted: u64,
    pub updated: u64,
    pub stale: u64,
    pub dangling: u64,
    pub linked: u64,
    pub deleted: u64,
    pub tombstoned: u64,
}

impl SyncMetrics {
    pub fn record_push(&self, report: &MergeReport) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.inserted.fetch_add(report.inserted, Ordering::Relaxed);
        self.updated.fetch_add(report.updated, Ordering::Relaxed);
        self.stale.fetch_add(report.stale, Ordering::Relaxed);
        self.dangling.fetch_add(report.dangling, Ordering::Relaxed);
        self.linked.fetch_add(report.linked, Ordering::Relaxed);
        self.deleted.fetch_add(report.deleted, Ordering::Relaxed);
        self.tombstoned.fetch_add(report.tombstoned, Ordering::Relaxed);
    }

    pub fn record_rejected_push(&self) {
        self.pushes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pull(&self) {
        self.pulls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_full_sync(&self) {
        self.full_syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            pushes: self.pushes.load(Ordering::Relaxed),
            pushes_rejected: self.pushes_rejected.load(Ordering::Relaxed),
            pulls: self.pulls.load(Ordering::Relaxed),
            full_syncs: self.full_syncs.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            dangling: self.dangling.load(Ordering::Relaxed),
            linked: self.linked.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            tombstoned: self.tombstoned.load(Ordering::Relaxed),
        }
    }
}
