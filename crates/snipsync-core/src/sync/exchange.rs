//! Exchange coordinator: one push, pull, full or ping per request

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::delta::DeltaExtractor;
use super::identity::IdentityAssigner;
use super::merge::{MergeEngine, MergeReport};
use super::protocol::{server_time, PingResponse, PullRequest, PullResponse, PushRequest, PushResponse};
use crate::db::{Database, LibSqlEntityStore};
use crate::error::{Error, Result};

/// Default cap on change items plus deletions in one push
pub const DEFAULT_MAX_PUSH_ITEMS: usize = 5_000;

/// Request size limits enforced before anything touches the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    pub max_push_items: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            max_push_items: DEFAULT_MAX_PUSH_ITEMS,
        }
    }
}

/// Result of a successful push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// What the client receives
    pub response: PushResponse,
    /// What the merge did, for logs and metrics
    pub report: MergeReport,
}

/// Thread-safe sync service over one store.
///
/// Every operation takes the store lock, so pushes are serialized and each
/// last-write-wins comparison sees the state it then overwrites.
#[derive(Clone)]
pub struct SyncService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    limits: SyncLimits,
}

impl SyncService {
    /// Open a sync service backed by the database file at `db_path`.
    pub async fn open_path(db_path: impl Into<PathBuf>, limits: SyncLimits) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
            limits,
        })
    }

    /// Open an in-memory sync service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
            limits: SyncLimits::default(),
        })
    }

    #[must_use]
    pub fn with_limits(mut self, limits: SyncLimits) -> Self {
        self.limits = limits;
        self
    }

    pub const fn limits(&self) -> SyncLimits {
        self.limits
    }

    /// Filesystem path of the store, `None` when in memory
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Apply a push atomically and report the identities minted for new records
    ///
    /// Size and identity errors are returned before the store is touched; any
    /// error during the merge rolls the whole push back.
    pub async fn push(&self, request: PushRequest) -> Result<PushOutcome> {
        let items = request.item_count();
        if items > self.limits.max_push_items {
            return Err(Error::invalid(format!(
                "push carries {items} items, limit is {}",
                self.limits.max_push_items
            )));
        }

        // Detached so a dropped request cannot leave the transaction open
        let service = self.clone();
        tokio::spawn(async move { service.apply_push(request).await })
            .await
            .map_err(|error| Error::Database(format!("Push task failed: {error}")))?
    }

    async fn apply_push(&self, request: PushRequest) -> Result<PushOutcome> {
        let ids = IdentityAssigner::assign_all(&request.changes)?;
        let server_time = server_time();

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN IMMEDIATE", ()).await?;

        let store = LibSqlEntityStore::new(conn);
        let report = match MergeEngine::new(&store, &ids, server_time)
            .apply(&request)
            .await
        {
            Ok(report) => report,
            Err(error) => {
                conn.execute("ROLLBACK", ()).await.ok();
                tracing::warn!("Push rolled back: {error}");
                return Err(error);
            }
        };

        if let Err(error) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            tracing::warn!("Push commit failed: {error}");
            return Err(error.into());
        }

        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            stale = report.stale,
            dangling = report.dangling,
            linked = report.linked,
            deleted = report.deleted,
            tombstoned = report.tombstoned,
            "Push applied"
        );

        Ok(PushOutcome {
            response: PushResponse {
                server_time,
                id_mappings: ids.into_mappings(),
            },
            report,
        })
    }

    /// Everything that changed after the client's watermark
    pub async fn pull(&self, request: PullRequest) -> Result<PullResponse> {
        let db = self.db.lock().await;
        let store = LibSqlEntityStore::new(db.connection());
        let response = DeltaExtractor::new(&store)
            .pull(request.last_sync_at, server_time())
            .await?;
        tracing::debug!(
            since = request.last_sync_at,
            changes = response.changes.len(),
            deletions = response.deletions.len(),
            "Pull served"
        );
        Ok(response)
    }

    /// The complete current state, without deletions
    pub async fn full(&self) -> Result<PullResponse> {
        let db = self.db.lock().await;
        let store = LibSqlEntityStore::new(db.connection());
        DeltaExtractor::new(&store).full(server_time()).await
    }

    #[must_use]
    pub fn ping(&self) -> PingResponse {
        PingResponse {
            server_time: server_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::protocol::{ChangeItem, PushChanges};
    use crate::models::TagData;
    use tempfile::tempdir;

    fn new_tags(count: i64) -> PushRequest {
        PushRequest {
            changes: PushChanges {
                tags: (1..=count)
                    .map(|local_id| ChangeItem::New {
                        local_id,
                        data: TagData {
                            name: format!("tag-{local_id}"),
                            created_at: Some(1),
                            updated_at: Some(1),
                        },
                    })
                    .collect(),
                ..PushChanges::default()
            },
            deletions: Vec::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_over_limit_is_rejected_before_merge() {
        let service = SyncService::open_in_memory()
            .await
            .unwrap()
            .with_limits(SyncLimits { max_push_items: 2 });

        let err = service.push(new_tags(3)).await.unwrap_err();
        assert!(err.is_validation());
        assert!(service.full().await.unwrap().changes.is_empty());

        let outcome = service.push(new_tags(2)).await.unwrap();
        assert_eq!(outcome.response.id_mappings.len(), 2);
        assert_eq!(outcome.report.inserted, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn state_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("snipsync.db");

        let service = SyncService::open_path(&path, SyncLimits::default())
            .await
            .unwrap();
        service.push(new_tags(1)).await.unwrap();
        assert_eq!(service.db_path(), Some(&path));
        drop(service);

        let reopened = SyncService::open_path(&path, SyncLimits::default())
            .await
            .unwrap();
        let state = reopened.full().await.unwrap();
        assert_eq!(state.changes.tags.len(), 1);
        assert_eq!(state.changes.tags[0].name, "tag-1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ping_reports_current_time() {
        let service = SyncService::open_in_memory().await.unwrap();
        let before = server_time();
        let ping = service.ping();
        assert!(ping.server_time >= before);
    }
}
