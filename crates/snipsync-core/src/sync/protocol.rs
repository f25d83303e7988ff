//! Wire types for the push/pull exchange (JSON, camelCase)

use serde::{Deserialize, Serialize};

use crate::models::{
    flag, Folder, FolderData, LocalId, RecordId, RecordRef, Snippet, SnippetContent,
    SnippetContentData, SnippetData, SnippetTag, SyncTable, Tag, TagData, Tombstone,
};

/// Current server time in Unix milliseconds
#[must_use]
pub fn server_time() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One entity change in a push
///
/// On the wire `{isNew, localId?, serverId?, data}`: new items carry the
/// client's local reference, updates carry the permanent identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(
    try_from = "RawChangeItem<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub enum ChangeItem<T> {
    /// A record created offline on the client
    New { local_id: LocalId, data: T },
    /// A modification of a record the server already assigned
    Update { server_id: RecordId, data: T },
}

impl<T> ChangeItem<T> {
    /// Entity payload
    pub const fn data(&self) -> &T {
        match self {
            Self::New { data, .. } | Self::Update { data, .. } => data,
        }
    }

    pub const fn is_new(&self) -> bool {
        matches!(self, Self::New { .. })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChangeItem<T> {
    #[serde(deserialize_with = "flag::deserialize")]
    is_new: bool,
    #[serde(default)]
    local_id: Option<LocalId>,
    #[serde(default)]
    server_id: Option<RecordId>,
    data: T,
}

impl<T> TryFrom<RawChangeItem<T>> for ChangeItem<T> {
    type Error = String;

    fn try_from(raw: RawChangeItem<T>) -> Result<Self, Self::Error> {
        if raw.is_new {
            let local_id = raw
                .local_id
                .ok_or_else(|| "new change item is missing localId".to_string())?;
            Ok(Self::New {
                local_id,
                data: raw.data,
            })
        } else {
            let server_id = raw
                .server_id
                .ok_or_else(|| "existing change item is missing serverId".to_string())?;
            Ok(Self::Update {
                server_id,
                data: raw.data,
            })
        }
    }
}

/// A snippet-tag link change; both sides may name records created in the same push
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetTagItem {
    pub snippet_server_id: RecordRef,
    pub tag_server_id: RecordRef,
    #[serde(deserialize_with = "flag::deserialize")]
    pub is_new: bool,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Entity changes in a push, grouped by table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushChanges {
    pub folders: Vec<ChangeItem<FolderData>>,
    pub snippets: Vec<ChangeItem<SnippetData>>,
    pub snippet_contents: Vec<ChangeItem<SnippetContentData>>,
    pub tags: Vec<ChangeItem<TagData>>,
    pub snippet_tags: Vec<SnippetTagItem>,
}

impl PushChanges {
    /// Total number of change items across all tables
    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
            + self.snippets.len()
            + self.snippet_contents.len()
            + self.tags.len()
            + self.snippet_tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of `POST /api/sync/push`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushRequest {
    pub changes: PushChanges,
    pub deletions: Vec<Tombstone>,
}

impl PushRequest {
    /// Change items plus deletions
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.changes.len() + self.deletions.len()
    }
}

/// Permanent identity assigned to a record the client created offline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdMapping {
    pub table_name: SyncTable,
    pub local_id: LocalId,
    pub server_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub server_time: i64,
    pub id_mappings: Vec<IdMapping>,
}

/// Body of `POST /api/sync/pull`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequest {
    /// Watermark; `0` or less asks for everything
    pub last_sync_at: i64,
}

/// Entity state returned by pull and full, grouped by table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub folders: Vec<Folder>,
    pub snippets: Vec<Snippet>,
    pub snippet_contents: Vec<SnippetContent>,
    pub tags: Vec<Tag>,
    pub snippet_tags: Vec<SnippetTag>,
}

impl ChangeSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
            + self.snippets.len()
            + self.snippet_contents.len()
            + self.tags.len()
            + self.snippet_tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub server_time: i64,
    pub changes: ChangeSet,
    pub deletions: Vec<Tombstone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub server_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn change_item_new_requires_local_id() {
        let item: ChangeItem<TagData> =
            serde_json::from_str(r#"{"isNew": true, "localId": 4, "data": {"name": "rust"}}"#)
                .unwrap();
        assert!(item.is_new());
        assert_eq!(item.data().name, "rust");

        let err = serde_json::from_str::<ChangeItem<TagData>>(
            r#"{"isNew": true, "data": {"name": "rust"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("localId"));
    }

    #[test]
    fn change_item_update_requires_server_id() {
        let id = RecordId::new();
        let raw = format!(r#"{{"isNew": 0, "serverId": "{id}", "data": {{"name": "rust"}}}}"#);
        let item: ChangeItem<TagData> = serde_json::from_str(&raw).unwrap();
        assert!(matches!(item, ChangeItem::Update { server_id, .. } if server_id == id));

        let err = serde_json::from_str::<ChangeItem<TagData>>(
            r#"{"isNew": false, "localId": 1, "data": {"name": "rust"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("serverId"));
    }

    #[test]
    fn push_request_lists_default_to_empty() {
        let request: PushRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, PushRequest::default());

        let request: PushRequest =
            serde_json::from_str(r#"{"changes": {"tags": []}, "deletions": []}"#).unwrap();
        assert_eq!(request.item_count(), 0);
    }

    #[test]
    fn snippet_tag_item_accepts_local_refs() {
        let tag = RecordId::new();
        let raw = format!(
            r#"{{"snippetServerId": {{"localId": 2}}, "tagServerId": "{tag}", "isNew": true, "createdAt": 9}}"#
        );
        let item: SnippetTagItem = serde_json::from_str(&raw).unwrap();
        assert_eq!(item.snippet_server_id, RecordRef::Local { local_id: 2 });
        assert_eq!(item.tag_server_id, RecordRef::Server(tag));
        assert_eq!(item.created_at, Some(9));
    }

    #[test]
    fn pull_response_always_emits_every_list() {
        let response = PullResponse {
            server_time: 42,
            ..PullResponse::default()
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "serverTime": 42,
                "changes": {
                    "folders": [],
                    "snippets": [],
                    "snippetContents": [],
                    "tags": [],
                    "snippetTags": []
                },
                "deletions": []
            })
        );
    }

    #[test]
    fn id_mapping_wire_shape() {
        let id = RecordId::new();
        let mapping = IdMapping {
            table_name: SyncTable::SnippetContents,
            local_id: 3,
            server_id: id,
        };
        let value = serde_json::to_value(&mapping).unwrap();
        assert_eq!(value["tableName"], "snippet_contents");
        assert_eq!(value["localId"], 3);
        assert_eq!(value["serverId"], id.as_str());
    }
}
