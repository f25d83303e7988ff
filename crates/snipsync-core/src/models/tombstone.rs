//! Tombstone model

use serde::{Deserialize, Serialize};

use super::SyncTable;

/// Immutable marker of a hard deletion, kept forever so other devices learn
/// about it and late updates cannot resurrect the record.
///
/// On the wire this is the `deletions` entry `{tableName, recordId, deletedAt}`,
/// both in push requests and pull responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    /// Table the deleted record lived in
    pub table_name: SyncTable,
    /// Permanent ID of the deleted record (`<snippetId>:<tagId>` for links)
    pub record_id: String,
    /// Deletion timestamp (Unix ms, client clock)
    pub deleted_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_wire_shape() {
        let tombstone: Tombstone = serde_json::from_str(
            r#"{"tableName": "snippetContents", "recordId": "abc", "deletedAt": 5}"#,
        )
        .unwrap();
        assert_eq!(tombstone.table_name, SyncTable::SnippetContents);

        let value = serde_json::to_value(&tombstone).unwrap();
        assert_eq!(value["tableName"], "snippet_contents");
        assert_eq!(value["recordId"], "abc");
        assert_eq!(value["deletedAt"], 5);
    }
}
