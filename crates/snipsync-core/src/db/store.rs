//! Entity store: durable storage for synced records, links and tombstones
//!
//! Pure persistence. Whether a write should happen at all is decided by the
//! merge engine; the store only executes it.

use libsql::{params, params_from_iter, Connection};

use super::record::{column_list, insert_sql, overwrite_sql, parse_id, StoredRecord};
use crate::error::{Error, Result};
use crate::models::{RecordId, SnippetTag, SyncTable, Tombstone};

/// Trait for sync storage operations (async)
#[allow(async_fn_in_trait)]
pub trait EntityStore {
    /// Load a record by permanent ID
    async fn get<R: StoredRecord>(&self, id: &RecordId) -> Result<Option<R>>;

    /// Whether a record with this ID currently exists
    async fn exists<R: StoredRecord>(&self, id: &RecordId) -> Result<bool>;

    /// Insert a new record; fails on an ID or uniqueness collision
    async fn insert<R: StoredRecord>(&self, record: &R) -> Result<()>;

    /// Replace every mutable column of an existing record
    async fn overwrite<R: StoredRecord>(&self, record: &R) -> Result<bool>;

    /// Hard-delete a record, returning the number of rows removed
    async fn delete<R: StoredRecord>(&self, id: &RecordId) -> Result<u64>;

    /// Records whose `updated_at` is strictly after `since`; all records if `None`
    async fn changed_since<R: StoredRecord>(&self, since: Option<i64>) -> Result<Vec<R>>;

    /// Remove every content row owned by a snippet
    async fn delete_contents_of(&self, snippet_id: &RecordId) -> Result<u64>;

    /// Insert a snippet-tag link unless it already exists
    async fn link(&self, link: &SnippetTag) -> Result<bool>;

    /// Remove one snippet-tag link
    async fn unlink(&self, snippet_id: &RecordId, tag_id: &RecordId) -> Result<u64>;

    /// Remove every link of a snippet
    async fn unlink_snippet(&self, snippet_id: &RecordId) -> Result<u64>;

    /// Remove every link of a tag
    async fn unlink_tag(&self, tag_id: &RecordId) -> Result<u64>;

    /// Links created strictly after `since`; all links if `None`
    async fn links_since(&self, since: Option<i64>) -> Result<Vec<SnippetTag>>;

    /// Append a tombstone unless an identical one exists
    ///
    /// Entities get one tombstone per record. Association keys are reused when
    /// a pair is linked again, so each unlink with a new `deleted_at` appends.
    async fn record_tombstone(&self, tombstone: &Tombstone) -> Result<bool>;

    /// Tombstones with `deleted_at` strictly after `since`; all if `None`
    async fn tombstones_since(&self, since: Option<i64>) -> Result<Vec<Tombstone>>;
}

/// libSQL implementation of `EntityStore`
///
/// Borrows a connection, which may be a transaction.
pub struct LibSqlEntityStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntityStore<'a> {
    /// Create a new store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn collect<R: StoredRecord>(&self, sql: &str, since: Option<i64>) -> Result<Vec<R>> {
        let mut rows = match since {
            Some(since) => self.conn.query(sql, [since]).await?,
            None => self.conn.query(sql, ()).await?,
        };

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(R::from_row(&row)?);
        }
        Ok(records)
    }
}

impl EntityStore for LibSqlEntityStore<'_> {
    async fn get<R: StoredRecord>(&self, id: &RecordId) -> Result<Option<R>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            column_list::<R>(),
            R::SQL_TABLE
        );
        let mut rows = self.conn.query(&sql, [id.as_str()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(R::from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn exists<R: StoredRecord>(&self, id: &RecordId) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", R::SQL_TABLE);
        let mut rows = self.conn.query(&sql, [id.as_str()]).await?;
        Ok(rows.next().await?.is_some())
    }

    async fn insert<R: StoredRecord>(&self, record: &R) -> Result<()> {
        self.conn
            .execute(&insert_sql::<R>(), params_from_iter(record.values()))
            .await?;
        Ok(())
    }

    async fn overwrite<R: StoredRecord>(&self, record: &R) -> Result<bool> {
        let rows = self
            .conn
            .execute(&overwrite_sql::<R>(), params_from_iter(record.values()))
            .await?;
        Ok(rows > 0)
    }

    async fn delete<R: StoredRecord>(&self, id: &RecordId) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE id = ?", R::SQL_TABLE);
        Ok(self.conn.execute(&sql, [id.as_str()]).await?)
    }

    async fn changed_since<R: StoredRecord>(&self, since: Option<i64>) -> Result<Vec<R>> {
        let filter = if since.is_some() {
            "WHERE updated_at > ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM {} {filter} ORDER BY id",
            column_list::<R>(),
            R::SQL_TABLE
        );
        self.collect(&sql, since).await
    }

    async fn delete_contents_of(&self, snippet_id: &RecordId) -> Result<u64> {
        Ok(self
            .conn
            .execute(
                "DELETE FROM snippet_contents WHERE snippet_id = ?",
                [snippet_id.as_str()],
            )
            .await?)
    }

    async fn link(&self, link: &SnippetTag) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO snippet_tags (snippet_id, tag_id, created_at) VALUES (?, ?, ?)",
                params![link.snippet_id.as_str(), link.tag_id.as_str(), link.created_at],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn unlink(&self, snippet_id: &RecordId, tag_id: &RecordId) -> Result<u64> {
        Ok(self
            .conn
            .execute(
                "DELETE FROM snippet_tags WHERE snippet_id = ? AND tag_id = ?",
                [snippet_id.as_str(), tag_id.as_str()],
            )
            .await?)
    }

    async fn unlink_snippet(&self, snippet_id: &RecordId) -> Result<u64> {
        Ok(self
            .conn
            .execute(
                "DELETE FROM snippet_tags WHERE snippet_id = ?",
                [snippet_id.as_str()],
            )
            .await?)
    }

    async fn unlink_tag(&self, tag_id: &RecordId) -> Result<u64> {
        Ok(self
            .conn
            .execute("DELETE FROM snippet_tags WHERE tag_id = ?", [tag_id.as_str()])
            .await?)
    }

    async fn links_since(&self, since: Option<i64>) -> Result<Vec<SnippetTag>> {
        let sql = if since.is_some() {
            "SELECT snippet_id, tag_id, created_at FROM snippet_tags
             WHERE created_at > ? ORDER BY snippet_id, tag_id"
        } else {
            "SELECT snippet_id, tag_id, created_at FROM snippet_tags ORDER BY snippet_id, tag_id"
        };
        let mut rows = match since {
            Some(since) => self.conn.query(sql, [since]).await?,
            None => self.conn.query(sql, ()).await?,
        };

        let mut links = Vec::new();
        while let Some(row) = rows.next().await? {
            links.push(SnippetTag {
                snippet_id: parse_id(&row.get::<String>(0)?)?,
                tag_id: parse_id(&row.get::<String>(1)?)?,
                created_at: row.get(2)?,
            });
        }
        Ok(links)
    }

    async fn record_tombstone(&self, tombstone: &Tombstone) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO tombstones (id, table_name, record_id, deleted_at) VALUES (?, ?, ?, ?)",
                params![
                    RecordId::new().as_str(),
                    tombstone.table_name.as_str(),
                    tombstone.record_id.as_str(),
                    tombstone.deleted_at
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn tombstones_since(&self, since: Option<i64>) -> Result<Vec<Tombstone>> {
        let sql = if since.is_some() {
            "SELECT table_name, record_id, deleted_at FROM tombstones
             WHERE deleted_at > ? ORDER BY deleted_at, table_name, record_id"
        } else {
            "SELECT table_name, record_id, deleted_at FROM tombstones
             ORDER BY deleted_at, table_name, record_id"
        };
        let mut rows = match since {
            Some(since) => self.conn.query(sql, [since]).await?,
            None => self.conn.query(sql, ()).await?,
        };

        let mut tombstones = Vec::new();
        while let Some(row) = rows.next().await? {
            let table_name: String = row.get(0)?;
            tombstones.push(Tombstone {
                table_name: table_name
                    .parse::<SyncTable>()
                    .map_err(Error::Database)?,
                record_id: row.get(1)?,
                deleted_at: row.get(2)?,
            });
        }
        Ok(tombstones)
    }
}
