//! Snippet and snippet content models

use serde::{Deserialize, Serialize};

use super::{flag, RecordId, RecordRef};

/// A snippet as stored on the server and sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    /// Permanent identity
    pub id: RecordId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Containing folder, `None` for the inbox
    pub folder_id: Option<RecordId>,
    /// Trash flag (the snippet still exists and still syncs)
    #[serde(with = "flag")]
    pub is_deleted: bool,
    /// Favorites flag
    #[serde(with = "flag", alias = "isFavorite")]
    pub is_favorites: bool,
    /// Creation timestamp (Unix ms, client clock)
    pub created_at: i64,
    /// Last update timestamp (Unix ms, client clock)
    pub updated_at: i64,
}

/// Snippet fields carried by a push change item
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder_id: Option<RecordRef>,
    #[serde(default, with = "flag")]
    pub is_deleted: bool,
    #[serde(default, with = "flag", alias = "isFavorite")]
    pub is_favorites: bool,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// One fragment (tab) of a snippet's body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetContent {
    pub id: RecordId,
    /// Owning snippet; the content is removed together with it
    pub snippet_id: RecordId,
    pub label: Option<String>,
    /// Body text
    pub value: Option<String>,
    pub language: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Snippet content fields carried by a push change item
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetContentData {
    pub snippet_id: RecordRef,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_data_accepts_original_client_payload() {
        let folder = RecordId::new();
        let raw = format!(
            r#"{{"name": "hello", "description": null, "folderId": "{folder}",
                "isDeleted": 0, "isFavorites": 1, "createdAt": 1, "updatedAt": 2}}"#
        );
        let data: SnippetData = serde_json::from_str(&raw).unwrap();
        assert_eq!(data.folder_id, Some(RecordRef::Server(folder)));
        assert!(data.is_favorites);
        assert!(!data.is_deleted);
        assert_eq!(data.updated_at, Some(2));
    }

    #[test]
    fn snippet_data_accepts_singular_favorite_alias() {
        let data: SnippetData =
            serde_json::from_str(r#"{"name": "x", "isFavorite": true}"#).unwrap();
        assert!(data.is_favorites);
    }

    #[test]
    fn content_data_requires_owning_snippet() {
        let err = serde_json::from_str::<SnippetContentData>(r#"{"value": "fn main() {}"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("snippetId"));

        let err = serde_json::from_str::<SnippetContentData>(r#"{"snippetId": null}"#);
        assert!(err.is_err());
    }
}
