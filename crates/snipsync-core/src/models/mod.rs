//! Data models for snipsync

pub mod flag;
mod folder;
mod id;
mod snippet;
mod table;
mod tag;
mod tombstone;

pub use folder::{Folder, FolderData, DEFAULT_LANGUAGE};
pub use id::{LocalId, RecordId, RecordRef};
pub use snippet::{Snippet, SnippetContent, SnippetContentData, SnippetData};
pub use table::SyncTable;
pub use tag::{association_key, parse_association_key, SnippetTag, Tag, TagData};
pub use tombstone::Tombstone;
