//! Folder model

use serde::{Deserialize, Serialize};

use super::{flag, RecordId, RecordRef};

/// Language assigned to new snippets in a folder when the client omits it
pub const DEFAULT_LANGUAGE: &str = "plain_text";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// A folder as stored on the server and sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Permanent identity
    pub id: RecordId,
    /// Display name
    pub name: String,
    /// Language preselected for snippets created in this folder
    pub default_language: String,
    /// Parent folder, `None` for top-level folders
    pub parent_id: Option<RecordId>,
    /// Whether the folder is expanded in the sidebar
    #[serde(with = "flag")]
    pub is_open: bool,
    /// Position among its siblings
    pub order_index: i64,
    /// Optional icon name
    pub icon: Option<String>,
    /// Creation timestamp (Unix ms, client clock)
    pub created_at: i64,
    /// Last update timestamp (Unix ms, client clock)
    pub updated_at: i64,
}

/// Folder fields carried by a push change item
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderData {
    pub name: String,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub parent_id: Option<RecordRef>,
    #[serde(default, with = "flag")]
    pub is_open: bool,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_data_fills_defaults() {
        let data: FolderData = serde_json::from_str(r#"{"name": "Work"}"#).unwrap();
        assert_eq!(data.name, "Work");
        assert_eq!(data.default_language, DEFAULT_LANGUAGE);
        assert!(!data.is_open);
        assert_eq!(data.parent_id, None);
        assert_eq!(data.updated_at, None);
    }

    #[test]
    fn folder_data_requires_name() {
        let err = serde_json::from_str::<FolderData>(r#"{"icon": "star"}"#).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn folder_serializes_with_wire_field_names() {
        let folder = Folder {
            id: RecordId::new(),
            name: "Work".to_string(),
            default_language: "rust".to_string(),
            parent_id: None,
            is_open: true,
            order_index: 2,
            icon: None,
            created_at: 10,
            updated_at: 20,
        };
        let value = serde_json::to_value(&folder).unwrap();
        assert_eq!(value["defaultLanguage"], "rust");
        assert_eq!(value["isOpen"], 1);
        assert_eq!(value["parentId"], serde_json::Value::Null);
        assert_eq!(value["updatedAt"], 20);
    }
}
