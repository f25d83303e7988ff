//! Tag model

use serde::{Deserialize, Serialize};

use super::RecordId;

/// A tag for organizing snippets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Permanent identity
    pub id: RecordId,
    /// Tag name (unique, compared case-insensitively)
    pub name: String,
    /// Creation timestamp (Unix ms, client clock)
    pub created_at: i64,
    /// Last update timestamp (Unix ms, client clock)
    pub updated_at: i64,
}

/// Tag fields carried by a push change item
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagData {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Link between a snippet and a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetTag {
    pub snippet_id: RecordId,
    pub tag_id: RecordId,
    /// When the link was made (Unix ms, client clock)
    pub created_at: i64,
}

impl SnippetTag {
    /// Record ID used when the link itself is tombstoned
    #[must_use]
    pub fn record_key(&self) -> String {
        association_key(&self.snippet_id, &self.tag_id)
    }
}

/// Composite key `<snippetId>:<tagId>` identifying an association
#[must_use]
pub fn association_key(snippet_id: &RecordId, tag_id: &RecordId) -> String {
    format!("{snippet_id}:{tag_id}")
}

/// Split an association key back into its snippet and tag IDs
pub fn parse_association_key(key: &str) -> Option<(RecordId, RecordId)> {
    let (snippet, tag) = key.split_once(':')?;
    Some((snippet.parse().ok()?, tag.parse().ok()?))
}
