//! Permanent identity assignment for records created offline

use std::collections::HashMap;

use super::protocol::{ChangeItem, IdMapping, PushChanges};
use crate::error::{Error, Result};
use crate::models::{LocalId, RecordId, RecordRef, SyncTable};

/// Mints permanent identities for one push and resolves local references
///
/// Lives for exactly one exchange; nothing here is persisted.
#[derive(Debug, Default)]
pub struct IdentityAssigner {
    minted: HashMap<(SyncTable, LocalId), RecordId>,
    mappings: Vec<IdMapping>,
}

impl IdentityAssigner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint identities for every new item of a push, in merge order
    pub fn assign_all(changes: &PushChanges) -> Result<Self> {
        let mut assigner = Self::new();
        assigner.assign_items(SyncTable::Folders, &changes.folders)?;
        assigner.assign_items(SyncTable::Tags, &changes.tags)?;
        assigner.assign_items(SyncTable::Snippets, &changes.snippets)?;
        assigner.assign_items(SyncTable::SnippetContents, &changes.snippet_contents)?;
        Ok(assigner)
    }

    /// Mint identities for the new items of one table
    pub fn assign_items<T>(&mut self, table: SyncTable, items: &[ChangeItem<T>]) -> Result<()> {
        for item in items {
            if let ChangeItem::New { local_id, .. } = item {
                self.assign(table, *local_id)?;
            }
        }
        Ok(())
    }

    /// Mint a fresh identity for one local reference
    pub fn assign(&mut self, table: SyncTable, local_id: LocalId) -> Result<RecordId> {
        if self.minted.contains_key(&(table, local_id)) {
            return Err(Error::invalid(format!(
                "duplicate localId {local_id} in {table}"
            )));
        }

        let server_id = RecordId::new();
        self.minted.insert((table, local_id), server_id);
        self.mappings.push(IdMapping {
            table_name: table,
            local_id,
            server_id,
        });
        Ok(server_id)
    }

    /// Identity minted for a local reference, if any
    #[must_use]
    pub fn get(&self, table: SyncTable, local_id: LocalId) -> Option<RecordId> {
        self.minted.get(&(table, local_id)).copied()
    }

    /// Identity minted for a new item, which must have been assigned already
    pub fn minted(&self, table: SyncTable, local_id: LocalId) -> Result<RecordId> {
        self.get(table, local_id).ok_or_else(|| {
            Error::Database(format!("no identity minted for {table} localId {local_id}"))
        })
    }

    /// Turn a reference into a permanent identity
    pub fn resolve(&self, table: SyncTable, reference: RecordRef) -> Result<RecordId> {
        match reference {
            RecordRef::Server(id) => Ok(id),
            RecordRef::Local { local_id } => self.get(table, local_id).ok_or_else(|| {
                Error::invalid(format!(
                    "localId {local_id} does not name a new record in {table}"
                ))
            }),
        }
    }

    pub fn resolve_optional(
        &self,
        table: SyncTable,
        reference: Option<RecordRef>,
    ) -> Result<Option<RecordId>> {
        reference.map(|r| self.resolve(table, r)).transpose()
    }

    /// Mappings in the order they were minted
    #[must_use]
    pub fn mappings(&self) -> &[IdMapping] {
        &self.mappings
    }

    #[must_use]
    pub fn into_mappings(self) -> Vec<IdMapping> {
        self.mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TagData;
    use std::collections::HashSet;

    fn new_tag(local_id: LocalId) -> ChangeItem<TagData> {
        ChangeItem::New {
            local_id,
            data: TagData {
                name: format!("tag-{local_id}"),
                created_at: None,
                updated_at: None,
            },
        }
    }

    #[test]
    fn mints_one_distinct_identity_per_new_item() {
        let mut changes = PushChanges::default();
        changes.tags = (1..=5).map(new_tag).collect();
        changes.tags.push(ChangeItem::Update {
            server_id: RecordId::new(),
            data: TagData {
                name: "existing".to_string(),
                created_at: None,
                updated_at: Some(1),
            },
        });

        let assigner = IdentityAssigner::assign_all(&changes).unwrap();
        let mappings = assigner.mappings();
        assert_eq!(mappings.len(), 5);
        assert!(mappings.iter().all(|m| m.table_name == SyncTable::Tags));

        let ids: HashSet<_> = mappings.iter().map(|m| m.server_id).collect();
        assert_eq!(ids.len(), 5);
        let locals: Vec<_> = mappings.iter().map(|m| m.local_id).collect();
        assert_eq!(locals, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn local_ids_are_scoped_per_table() {
        let mut assigner = IdentityAssigner::new();
        let folder = assigner.assign(SyncTable::Folders, 1).unwrap();
        let tag = assigner.assign(SyncTable::Tags, 1).unwrap();
        assert_ne!(folder, tag);
        assert_eq!(assigner.get(SyncTable::Folders, 1), Some(folder));
    }

    #[test]
    fn duplicate_local_id_is_rejected() {
        let mut assigner = IdentityAssigner::new();
        assigner.assign(SyncTable::Snippets, 7).unwrap();
        let err = assigner.assign(SyncTable::Snippets, 7).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn resolves_server_and_local_references() {
        let mut assigner = IdentityAssigner::new();
        let minted = assigner.assign(SyncTable::Snippets, 3).unwrap();
        let server = RecordId::new();

        assert_eq!(
            assigner
                .resolve(SyncTable::Snippets, RecordRef::Local { local_id: 3 })
                .unwrap(),
            minted
        );
        assert_eq!(
            assigner
                .resolve(SyncTable::Snippets, RecordRef::Server(server))
                .unwrap(),
            server
        );
        assert_eq!(
            assigner.resolve_optional(SyncTable::Folders, None).unwrap(),
            None
        );

        let err = assigner
            .resolve(SyncTable::Folders, RecordRef::Local { local_id: 3 })
            .unwrap_err();
        assert!(err.is_validation());
    }
}
