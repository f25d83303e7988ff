//! Record identities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Transient, request-scoped reference a client uses for a record it created
/// offline. Only meaningful inside one push and within one table.
pub type LocalId = i64;

/// Permanent identity of a synced record, using UUID v7 (time-sortable)
///
/// Once minted it never changes and is never handed out again, even after
/// the record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Mint a new unique record ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A reference from one record to another inside a push payload
///
/// Either the permanent ID the client already learned, or `{"localId": n}`
/// naming a record created earlier in the same push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
    /// A permanent server identity
    Server(RecordId),
    /// A record created in the same push, not yet known by its permanent ID
    Local {
        /// The creating item's local reference
        #[serde(rename = "localId")]
        local_id: LocalId,
    },
}

impl From<RecordId> for RecordRef {
    fn from(id: RecordId) -> Self {
        Self::Server(id)
    }
}
