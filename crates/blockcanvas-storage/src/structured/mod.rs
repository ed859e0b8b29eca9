//! Structured storage on redb
//!
//! - [`tables`]: Table definitions and the transaction wrapper
//! - [`snapshots`]: The durable [`SnapshotStore`](crate::SnapshotStore)

pub mod snapshots;
pub mod tables;

pub use snapshots::{RedbSnapshotStore, SCHEMA_VERSION};
pub use tables::{RedbStorage, RedbStorageConfig};
