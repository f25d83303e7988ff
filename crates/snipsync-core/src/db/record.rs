//! Row mapping for the synced entity tables

use libsql::{Row, Value};

use crate::error::{Error, Result};
use crate::models::{Folder, RecordId, Snippet, SnippetContent, SyncTable, Tag};

/// An entity kind with its own table, permanent ID and `updated_at` column
///
/// `COLUMNS` lists the table columns in the order `from_row` reads them and
/// `values` binds them; `id` always comes first and `created_at` is never
/// overwritten by an update.
pub trait StoredRecord: Sized {
    /// Wire table this record belongs to
    const TABLE: SyncTable;
    /// SQL table name
    const SQL_TABLE: &'static str;
    /// Column list, `id` first
    const COLUMNS: &'static [&'static str];

    /// Permanent identity
    fn id(&self) -> RecordId;

    /// Logical last-write timestamp used for LWW
    fn updated_at(&self) -> i64;

    /// Parse a record from a row selected with `COLUMNS`
    fn from_row(row: &Row) -> Result<Self>;

    /// Values for `COLUMNS`, in order
    fn values(&self) -> Vec<Value>;
}

pub(crate) fn column_list<R: StoredRecord>() -> String {
    R::COLUMNS.join(", ")
}

pub(crate) fn insert_sql<R: StoredRecord>() -> String {
    let placeholders = (1..=R::COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        R::SQL_TABLE,
        column_list::<R>()
    )
}

pub(crate) fn overwrite_sql<R: StoredRecord>() -> String {
    let assignments = R::COLUMNS
        .iter()
        .enumerate()
        .filter(|(_, column)| !matches!(**column, "id" | "created_at"))
        .map(|(index, column)| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {} SET {assignments} WHERE id = ?1", R::SQL_TABLE)
}

pub(crate) fn parse_id(raw: &str) -> Result<RecordId> {
    raw.parse()
        .map_err(|_| Error::Database(format!("Stored record ID `{raw}` is not a UUID")))
}

fn parse_optional_id(raw: Option<String>) -> Result<Option<RecordId>> {
    raw.as_deref().map(parse_id).transpose()
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

fn optional_id(value: Option<&RecordId>) -> Value {
    value.map_or(Value::Null, |id| Value::Text(id.as_str()))
}

fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

impl StoredRecord for Folder {
    const TABLE: SyncTable = SyncTable::Folders;
    const SQL_TABLE: &'static str = "folders";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "default_language",
        "parent_id",
        "is_open",
        "order_index",
        "icon",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.get::<String>(0)?)?,
            name: row.get(1)?,
            default_language: row.get(2)?,
            parent_id: parse_optional_id(row.get(3)?)?,
            is_open: row.get::<i64>(4)? != 0,
            order_index: row.get(5)?,
            icon: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.as_str()),
            text(&self.name),
            text(&self.default_language),
            optional_id(self.parent_id.as_ref()),
            flag(self.is_open),
            Value::Integer(self.order_index),
            optional_text(self.icon.as_deref()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }
}

impl StoredRecord for Snippet {
    const TABLE: SyncTable = SyncTable::Snippets;
    const SQL_TABLE: &'static str = "snippets";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "folder_id",
        "is_deleted",
        "is_favorites",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.get::<String>(0)?)?,
            name: row.get(1)?,
            description: row.get(2)?,
            folder_id: parse_optional_id(row.get(3)?)?,
            is_deleted: row.get::<i64>(4)? != 0,
            is_favorites: row.get::<i64>(5)? != 0,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.as_str()),
            text(&self.name),
            optional_text(self.description.as_deref()),
            optional_id(self.folder_id.as_ref()),
            flag(self.is_deleted),
            flag(self.is_favorites),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }
}

impl StoredRecord for SnippetContent {
    const TABLE: SyncTable = SyncTable::SnippetContents;
    const SQL_TABLE: &'static str = "snippet_contents";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "snippet_id",
        "label",
        "value",
        "language",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.get::<String>(0)?)?,
            snippet_id: parse_id(&row.get::<String>(1)?)?,
            label: row.get(2)?,
            value: row.get(3)?,
            language: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.as_str()),
            Value::Text(self.snippet_id.as_str()),
            optional_text(self.label.as_deref()),
            optional_text(self.value.as_deref()),
            optional_text(self.language.as_deref()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }
}

impl StoredRecord for Tag {
    const TABLE: SyncTable = SyncTable::Tags;
    const SQL_TABLE: &'static str = "tags";
    const COLUMNS: &'static [&'static str] = &["id", "name", "created_at", "updated_at"];

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.get::<String>(0)?)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.as_str()),
            text(&self.name),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_numbers_every_column() {
        assert_eq!(
            insert_sql::<Tag>(),
            "INSERT INTO tags (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)"
        );
    }

    #[test]
    fn overwrite_sql_keeps_identity_and_creation_time() {
        assert_eq!(
            overwrite_sql::<Tag>(),
            "UPDATE tags SET name = ?2, updated_at = ?4 WHERE id = ?1"
        );
        let folder_sql = overwrite_sql::<Folder>();
        assert!(!folder_sql.contains("created_at"));
        assert!(folder_sql.contains("parent_id = ?4"));
    }

    #[test]
    fn values_match_column_count() {
        let tag = Tag {
            id: RecordId::new(),
            name: "rust".to_string(),
            created_at: 1,
            updated_at: 2,
        };
        assert_eq!(tag.values().len(), Tag::COLUMNS.len());

        let content = SnippetContent {
            id: RecordId::new(),
            snippet_id: RecordId::new(),
            label: None,
            value: Some("body".to_string()),
            language: None,
            created_at: 1,
            updated_at: 1,
        };
        assert_eq!(content.values().len(), SnippetContent::COLUMNS.len());
    }
}
