//! Delta extraction for pull and full sync

use super::protocol::{ChangeSet, PullResponse};
use crate::db::EntityStore;
use crate::error::Result;
use crate::models::Tombstone;

/// Watermark filter: anything at or below zero selects everything
const fn watermark(since: i64) -> Option<i64> {
    if since > 0 {
        Some(since)
    } else {
        None
    }
}

/// Reads everything that changed after a watermark
pub struct DeltaExtractor<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> DeltaExtractor<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Entities with a timestamp strictly after `since`
    pub async fn changes_since(&self, since: i64) -> Result<ChangeSet> {
        let since = watermark(since);
        Ok(ChangeSet {
            folders: self.store.changed_since(since).await?,
            snippets: self.store.changed_since(since).await?,
            snippet_contents: self.store.changed_since(since).await?,
            tags: self.store.changed_since(since).await?,
            snippet_tags: self.store.links_since(since).await?,
        })
    }

    /// Tombstones with `deleted_at` strictly after `since`
    pub async fn deletions_since(&self, since: i64) -> Result<Vec<Tombstone>> {
        self.store.tombstones_since(watermark(since)).await
    }

    /// Incremental pull
    pub async fn pull(&self, since: i64, server_time: i64) -> Result<PullResponse> {
        Ok(PullResponse {
            server_time,
            changes: self.changes_since(since).await?,
            deletions: self.deletions_since(since).await?,
        })
    }

    /// Complete current state; deletions are never reported
    pub async fn full(&self, server_time: i64) -> Result<PullResponse> {
        Ok(PullResponse {
            server_time,
            changes: self.changes_since(0).await?,
            deletions: Vec::new(),
        })
    }
}
