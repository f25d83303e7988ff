//! Sync engine: identity assignment, merge, delta extraction and the
//! push/pull exchange built on top of them

mod delta;
mod exchange;
mod identity;
mod merge;
pub mod protocol;


pub use delta::DeltaExtractor;
pub use exchange::{PushOutcome, SyncLimits, SyncService, DEFAULT_MAX_PUSH_ITEMS};
pub use identity::IdentityAssigner;
pub use merge::{MergeEngine, MergeReport, Timestamped};
pub use protocol::{
    ChangeItem, ChangeSet, IdMapping, PingResponse, PullRequest, PullResponse, PushChanges,
    PushRequest, PushResponse, SnippetTagItem,
};
