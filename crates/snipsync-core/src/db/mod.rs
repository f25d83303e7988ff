//! Database layer for the sync store

mod connection;
mod migrations;
mod record;
mod store;

pub use connection::Database;
pub use record::StoredRecord;
pub use store::{EntityStore, LibSqlEntityStore};
