//! Merge engine: applies a push to the entity store
//!
//! New items are inserted under their minted identity. Updates overwrite only
//! when the incoming `updatedAt` is strictly newer (last-write-wins, ties keep
//! the stored record). Deletions cascade to owned children and always leave a
//! tombstone, so a late update can never bring the record back.

use serde::Serialize;
use tracing::debug;

use super::identity::IdentityAssigner;
use super::protocol::{ChangeItem, PushRequest, SnippetTagItem};
use crate::db::{EntityStore, StoredRecord};
use crate::error::{Error, Result};
use crate::models::{
    association_key, parse_association_key, Folder, FolderData, RecordId, Snippet,
    SnippetContent, SnippetContentData, SnippetData, SnippetTag, SyncTable, Tag, TagData,
    Tombstone,
};

/// What a push did to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// New records stored
    pub inserted: u64,
    /// Existing records overwritten by a newer update
    pub updated: u64,
    /// Updates discarded because the stored record was as new or newer
    pub stale: u64,
    /// Items whose target or parent no longer exists
    pub dangling: u64,
    /// Snippet-tag links created
    pub linked: u64,
    /// Rows removed by deletion items, cascades excluded
    pub deleted: u64,
    /// Tombstones appended
    pub tombstoned: u64,
}

impl MergeReport {
    /// Add another report's counters to this one
    pub fn absorb(&mut self, other: &Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.stale += other.stale;
        self.dangling += other.dangling;
        self.linked += other.linked;
        self.deleted += other.deleted;
        self.tombstoned += other.tombstoned;
    }
}

/// Applies one push through a store, using identities minted up front
pub struct MergeEngine<'a, S: EntityStore> {
    store: &'a S,
    ids: &'a IdentityAssigner,
    server_time: i64,
    report: MergeReport,
}

impl<'a, S: EntityStore> MergeEngine<'a, S> {
    /// `server_time` stamps new records that carry no timestamps of their own
    pub fn new(store: &'a S, ids: &'a IdentityAssigner, server_time: i64) -> Self {
        Self {
            store,
            ids,
            server_time,
            report: MergeReport::default(),
        }
    }

    /// Apply every part of a push in dependency order
    pub async fn apply(mut self, request: &PushRequest) -> Result<MergeReport> {
        let changes = &request.changes;
        self.apply_folders(&changes.folders).await?;
        self.apply_tags(&changes.tags).await?;
        self.apply_snippets(&changes.snippets).await?;
        self.apply_snippet_contents(&changes.snippet_contents).await?;
        self.apply_snippet_tags(&changes.snippet_tags).await?;
        self.apply_deletions(&request.deletions).await?;
        Ok(self.report)
    }

    pub async fn apply_folders(&mut self, items: &[ChangeItem<FolderData>]) -> Result<()> {
        for item in items {
            let (id, data) = self.target(SyncTable::Folders, item)?;
            let (created_at, updated_at) = self.timestamps(item)?;
            let folder = Folder {
                id,
                name: data.name.clone(),
                default_language: data.default_language.clone(),
                parent_id: self.ids.resolve_optional(SyncTable::Folders, data.parent_id)?,
                is_open: data.is_open,
                order_index: data.order_index,
                icon: data.icon.clone(),
                created_at,
                updated_at,
            };
            self.write(item.is_new(), &folder).await?;
        }
        Ok(())
    }

    pub async fn apply_tags(&mut self, items: &[ChangeItem<TagData>]) -> Result<()> {
        for item in items {
            let (id, data) = self.target(SyncTable::Tags, item)?;
            let (created_at, updated_at) = self.timestamps(item)?;
            let tag = Tag {
                id,
                name: data.name.clone(),
                created_at,
                updated_at,
            };
            self.write(item.is_new(), &tag).await?;
        }
        Ok(())
    }

    pub async fn apply_snippets(&mut self, items: &[ChangeItem<SnippetData>]) -> Result<()> {
        for item in items {
            let (id, data) = self.target(SyncTable::Snippets, item)?;
            let (created_at, updated_at) = self.timestamps(item)?;
            let snippet = Snippet {
                id,
                name: data.name.clone(),
                description: data.description.clone(),
                folder_id: self.ids.resolve_optional(SyncTable::Folders, data.folder_id)?,
                is_deleted: data.is_deleted,
                is_favorites: data.is_favorites,
                created_at,
                updated_at,
            };
            self.write(item.is_new(), &snippet).await?;
        }
        Ok(())
    }

    /// Contents need their owning snippet; a new content without one is
    /// tombstoned so the creating device drops it on its next pull.
    pub async fn apply_snippet_contents(
        &mut self,
        items: &[ChangeItem<SnippetContentData>],
    ) -> Result<()> {
        for item in items {
            let (id, data) = self.target(SyncTable::SnippetContents, item)?;
            let (created_at, updated_at) = self.timestamps(item)?;
            let content = SnippetContent {
                id,
                snippet_id: self.ids.resolve(SyncTable::Snippets, data.snippet_id)?,
                label: data.label.clone(),
                value: data.value.clone(),
                language: data.language.clone(),
                created_at,
                updated_at,
            };

            if !self.store.exists::<Snippet>(&content.snippet_id).await? {
                debug!(
                    content = %content.id,
                    snippet = %content.snippet_id,
                    "content owner missing"
                );
                self.report.dangling += 1;
                if item.is_new() {
                    self.tombstone(Tombstone {
                        table_name: SyncTable::SnippetContents,
                        record_id: content.id.as_str(),
                        deleted_at: self.server_time,
                    })
                    .await?;
                }
                continue;
            }

            self.write(item.is_new(), &content).await?;
        }
        Ok(())
    }

    pub async fn apply_snippet_tags(&mut self, items: &[SnippetTagItem]) -> Result<()> {
        for item in items.iter().filter(|item| item.is_new) {
            let snippet_id = self
                .ids
                .resolve(SyncTable::Snippets, item.snippet_server_id)?;
            let tag_id = self.ids.resolve(SyncTable::Tags, item.tag_server_id)?;

            if !self.store.exists::<Snippet>(&snippet_id).await?
                || !self.store.exists::<Tag>(&tag_id).await?
            {
                debug!(snippet = %snippet_id, tag = %tag_id, "link side missing");
                self.report.dangling += 1;
                continue;
            }

            let link = SnippetTag {
                snippet_id,
                tag_id,
                created_at: item.created_at.unwrap_or(self.server_time),
            };
            if self.store.link(&link).await? {
                self.report.linked += 1;
            }
        }
        Ok(())
    }

    pub async fn apply_deletions(&mut self, deletions: &[Tombstone]) -> Result<()> {
        for deletion in deletions {
            let (record_id, removed) = self.delete(deletion).await?;
            debug!(
                table = %deletion.table_name,
                record = %record_id,
                removed,
                "deletion applied"
            );
            self.report.deleted += removed;
            self.tombstone(Tombstone {
                table_name: deletion.table_name,
                record_id,
                deleted_at: deletion.deleted_at,
            })
            .await?;
        }
        Ok(())
    }

    /// Remove the named record and its cascade; returns the canonical record key
    async fn delete(&self, deletion: &Tombstone) -> Result<(String, u64)> {
        if deletion.table_name == SyncTable::SnippetTags {
            let (snippet_id, tag_id) = parse_association_key(&deletion.record_id)
                .ok_or_else(|| {
                    Error::invalid(format!(
                        "snippetTags deletion `{}` is not <snippetId>:<tagId>",
                        deletion.record_id
                    ))
                })?;
            let removed = self.store.unlink(&snippet_id, &tag_id).await?;
            return Ok((association_key(&snippet_id, &tag_id), removed));
        }

        let id: RecordId = deletion.record_id.parse().map_err(|_| {
            Error::invalid(format!(
                "{} deletion `{}` is not a record ID",
                deletion.table_name, deletion.record_id
            ))
        })?;

        let removed = match deletion.table_name {
            SyncTable::Folders => self.store.delete::<Folder>(&id).await?,
            SyncTable::Tags => {
                self.store.unlink_tag(&id).await?;
                self.store.delete::<Tag>(&id).await?
            }
            SyncTable::Snippets => {
                self.store.unlink_snippet(&id).await?;
                self.store.delete_contents_of(&id).await?;
                self.store.delete::<Snippet>(&id).await?
            }
            SyncTable::SnippetContents => self.store.delete::<SnippetContent>(&id).await?,
            SyncTable::SnippetTags => 0,
        };
        Ok((id.as_str(), removed))
    }

    async fn tombstone(&mut self, tombstone: Tombstone) -> Result<()> {
        if self.store.record_tombstone(&tombstone).await? {
            self.report.tombstoned += 1;
        }
        Ok(())
    }

    /// Insert a new record, or overwrite an existing one if strictly newer
    async fn write<R: StoredRecord>(&mut self, is_new: bool, record: &R) -> Result<()> {
        if is_new {
            self.store.insert(record).await?;
            debug!(table = %R::TABLE, id = %record.id(), "inserted");
            self.report.inserted += 1;
            return Ok(());
        }

        let Some(current) = self.store.get::<R>(&record.id()).await? else {
            debug!(table = %R::TABLE, id = %record.id(), "update target missing");
            self.report.dangling += 1;
            return Ok(());
        };

        if record.updated_at() > current.updated_at() {
            self.store.overwrite(record).await?;
            debug!(table = %R::TABLE, id = %record.id(), "overwritten");
            self.report.updated += 1;
        } else {
            debug!(
                table = %R::TABLE,
                id = %record.id(),
                incoming = record.updated_at(),
                stored = current.updated_at(),
                "stale update discarded"
            );
            self.report.stale += 1;
        }
        Ok(())
    }

    fn target<'i, T>(&self, table: SyncTable, item: &'i ChangeItem<T>) -> Result<(RecordId, &'i T)> {
        match item {
            ChangeItem::New { local_id, data } => Ok((self.ids.minted(table, *local_id)?, data)),
            ChangeItem::Update { server_id, data } => Ok((*server_id, data)),
        }
    }

    fn timestamps<T: Timestamped>(&self, item: &ChangeItem<T>) -> Result<(i64, i64)> {
        let data = item.data();
        match item {
            ChangeItem::New { .. } => {
                let created_at = data.created_at().unwrap_or(self.server_time);
                Ok((created_at, data.updated_at().unwrap_or(self.server_time)))
            }
            ChangeItem::Update { server_id, .. } => {
                let updated_at = data
                    .updated_at()
                    .ok_or_else(|| Error::invalid(format!("update of {server_id} has no updatedAt")))?;
                Ok((data.created_at().unwrap_or(updated_at), updated_at))
            }
        }
    }
}

/// Client timestamps carried by a change payload
pub trait Timestamped {
    fn created_at(&self) -> Option<i64>;
    fn updated_at(&self) -> Option<i64>;
}

macro_rules! timestamped {
    ($($data:ty),*) => {
        $(impl Timestamped for $data {
            fn created_at(&self) -> Option<i64> {
                self.created_at
            }

            fn updated_at(&self) -> Option<i64> {
                self.updated_at
            }
        })*
    };
}

timestamped!(FolderData, SnippetData, SnippetContentData, TagData);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlEntityStore};
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_000;

    fn tag_data(name: &str, updated_at: Option<i64>) -> TagData {
        TagData {
            name: name.to_string(),
            created_at: None,
            updated_at,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn new_item_without_timestamps_gets_server_time() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlEntityStore::new(db.connection());
        let mut ids = IdentityAssigner::new();
        let id = ids.assign(SyncTable::Tags, 1).unwrap();

        let mut engine = MergeEngine::new(&store, &ids, NOW);
        engine
            .apply_tags(&[ChangeItem::New {
                local_id: 1,
                data: tag_data("rust", None),
            }])
            .await
            .unwrap();
        assert_eq!(engine.report.inserted, 1);

        let tag: Tag = store.get(&id).await.unwrap().unwrap();
        assert_eq!((tag.created_at, tag.updated_at), (NOW, NOW));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_without_updated_at_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlEntityStore::new(db.connection());
        let ids = IdentityAssigner::new();

        let mut engine = MergeEngine::new(&store, &ids, NOW);
        let err = engine
            .apply_tags(&[ChangeItem::Update {
                server_id: RecordId::new(),
                data: tag_data("rust", None),
            }])
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_missing_record_is_dangling() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlEntityStore::new(db.connection());
        let ids = IdentityAssigner::new();
        let id = RecordId::new();

        let mut engine = MergeEngine::new(&store, &ids, NOW);
        engine
            .apply_tags(&[ChangeItem::Update {
                server_id: id,
                data: tag_data("ghost", Some(5)),
            }])
            .await
            .unwrap();

        assert_eq!(engine.report.dangling, 1);
        assert!(store.get::<Tag>(&id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lww_overwrites_only_when_strictly_newer() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlEntityStore::new(db.connection());
        let ids = IdentityAssigner::new();
        let id = RecordId::new();
        store
            .insert(&Tag {
                id,
                name: "original".to_string(),
                created_at: 10,
                updated_at: 10,
            })
            .await
            .unwrap();

        let mut engine = MergeEngine::new(&store, &ids, NOW);
        for (name, updated_at) in [("tie", 10), ("older", 9), ("newer", 11)] {
            engine
                .apply_tags(&[ChangeItem::Update {
                    server_id: id,
                    data: tag_data(name, Some(updated_at)),
                }])
                .await
                .unwrap();
        }

        assert_eq!(engine.report.stale, 2);
        assert_eq!(engine.report.updated, 1);
        let tag: Tag = store.get(&id).await.unwrap().unwrap();
        assert_eq!(tag.name, "newer");
        assert_eq!(tag.created_at, 10);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn link_with_missing_side_is_skipped() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlEntityStore::new(db.connection());
        let ids = IdentityAssigner::new();
        let tag = Tag {
            id: RecordId::new(),
            name: "rust".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        store.insert(&tag).await.unwrap();

        let mut engine = MergeEngine::new(&store, &ids, NOW);
        engine
            .apply_snippet_tags(&[
                SnippetTagItem {
                    snippet_server_id: RecordId::new().into(),
                    tag_server_id: tag.id.into(),
                    is_new: true,
                    created_at: Some(2),
                },
                SnippetTagItem {
                    snippet_server_id: RecordId::new().into(),
                    tag_server_id: tag.id.into(),
                    is_new: false,
                    created_at: Some(2),
                },
            ])
            .await
            .unwrap();

        assert_eq!(engine.report.dangling, 1);
        assert_eq!(engine.report.linked, 0);
        assert!(store.links_since(None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deletion_of_absent_record_still_tombstones() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlEntityStore::new(db.connection());
        let ids = IdentityAssigner::new();
        let id = RecordId::new();

        let mut engine = MergeEngine::new(&store, &ids, NOW);
        let deletion = Tombstone {
            table_name: SyncTable::Folders,
            record_id: id.as_str(),
            deleted_at: 50,
        };
        engine.apply_deletions(&[deletion.clone()]).await.unwrap();
        engine.apply_deletions(&[deletion.clone()]).await.unwrap();

        assert_eq!(engine.report.deleted, 0);
        assert_eq!(engine.report.tombstoned, 1);
        assert_eq!(store.tombstones_since(None).await.unwrap(), vec![deletion]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_deletion_ids_are_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlEntityStore::new(db.connection());
        let ids = IdentityAssigner::new();

        let mut engine = MergeEngine::new(&store, &ids, NOW);
        for (table_name, record_id) in [
            (SyncTable::Snippets, "42"),
            (SyncTable::SnippetTags, "not-a-pair"),
        ] {
            let err = engine
                .apply_deletions(&[Tombstone {
                    table_name,
                    record_id: record_id.to_string(),
                    deleted_at: 1,
                }])
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn reports_absorb_counters() {
        let mut total = MergeReport::default();
        let one = MergeReport {
            inserted: 2,
            stale: 1,
            tombstoned: 3,
            ..MergeReport::default()
        };
        total.absorb(&one);
        total.absorb(&one);
        assert_eq!(total.inserted, 4);
        assert_eq!(total.stale, 2);
        assert_eq!(total.tombstoned, 6);
        assert_eq!(total.updated, 0);
    }
}
