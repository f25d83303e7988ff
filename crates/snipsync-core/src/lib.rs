//! snipsync-core - Core library for snipsync
//!
//! This crate contains the models, the libSQL entity store and the sync
//! engine (identity assignment, last-write-wins merge, tombstones and delta
//! extraction) served by `snipsync-api`.

pub mod db;
pub mod error;
pub mod models;
pub mod sync;

pub use error::{Error, Result};
pub use models::{RecordId, SyncTable};
pub use sync::{MergeReport, PushOutcome, SyncLimits, SyncService};
