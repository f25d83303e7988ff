//! Synced table names

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The entity kinds that take part in synchronization
///
/// Serialized with the literal table identifiers used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SyncTable {
    #[serde(rename = "folders")]
    Folders,
    #[serde(rename = "snippets")]
    Snippets,
    #[serde(rename = "snippet_contents", alias = "snippetContents")]
    SnippetContents,
    #[serde(rename = "tags")]
    Tags,
    #[serde(rename = "snippetTags", alias = "snippet_tags")]
    SnippetTags,
}

impl SyncTable {
    /// All tables, in merge order
    pub const ALL: [Self; 5] = [
        Self::Folders,
        Self::Tags,
        Self::Snippets,
        Self::SnippetContents,
        Self::SnippetTags,
    ];

    /// Wire name of the table
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folders => "folders",
            Self::Snippets => "snippets",
            Self::SnippetContents => "snippet_contents",
            Self::Tags => "tags",
            Self::SnippetTags => "snippetTags",
        }
    }
}

impl fmt::Display for SyncTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folders" => Ok(Self::Folders),
            "snippets" => Ok(Self::Snippets),
            "snippet_contents" | "snippetContents" => Ok(Self::SnippetContents),
            "tags" => Ok(Self::Tags),
            "snippetTags" | "snippet_tags" => Ok(Self::SnippetTags),
            other => Err(format!("unknown table name `{other}`")),
        }
    }
}
