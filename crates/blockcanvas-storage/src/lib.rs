//! # Block Canvas Storage
//!
//! Local persistence for fetched collections and browsing history.
//!
//! ## Features
//!
//! - **SnapshotStore trait**: Per-collection snapshots (items, layout, order)
//!   plus an append-only visit history, with age-based eviction
//! - **InMemorySnapshotStore**: `DashMap`-backed implementation for tests
//! - **RedbSnapshotStore**: Durable implementation on `redb` with secondary
//!   time indexes and an explicit schema version
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blockcanvas_core::{CollectionKey, DisplayOrder, LayoutMap, SystemClock};
//! use blockcanvas_storage::{InMemorySnapshotStore, SnapshotStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemorySnapshotStore::new(Arc::new(SystemClock));
//!     let key = CollectionKey::new("ephemeral-visions").unwrap();
//!
//!     store
//!         .put(&key, None, Some(vec![]), LayoutMap::new(), DisplayOrder::new())
//!         .await
//!         .unwrap();
//!     assert!(store.get(&key).await.unwrap().is_some());
//! }
//! ```

pub mod error;
pub mod memory;
pub mod structured;

use std::time::Duration;

use async_trait::async_trait;
use blockcanvas_core::{
    CollectionKey, CollectionSnapshot, DisplayOrder, Item, LayoutMap, VisitRecord,
};

pub use error::StorageError;
pub use memory::InMemorySnapshotStore;
pub use structured::{RedbSnapshotStore, RedbStorage, RedbStorageConfig, SCHEMA_VERSION};

/// Persistence of collection snapshots and visit history
///
/// Every write stamps the store clock's current time. Callers treat any
/// error as a cache miss: nothing here is fatal to a navigation.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the snapshot for a collection
    async fn get(&self, key: &CollectionKey) -> Result<Option<CollectionSnapshot>, StorageError>;

    /// Write the full snapshot for a collection
    ///
    /// `items = None` writes a tombstone that invalidates a corrupted
    /// snapshot. Visit history is never touched.
    async fn put(
        &self,
        key: &CollectionKey,
        title: Option<String>,
        items: Option<Vec<Item>>,
        layout: LayoutMap,
        order: DisplayOrder,
    ) -> Result<(), StorageError>;

    /// Replace layout and order of an existing snapshot
    ///
    /// Returns `false` without writing when no record exists for `key`,
    /// so a late layout write cannot resurrect an evicted snapshot.
    async fn update_layout(
        &self,
        key: &CollectionKey,
        layout: LayoutMap,
        order: DisplayOrder,
    ) -> Result<bool, StorageError>;

    /// Append a visit to the history
    async fn append_visit(
        &self,
        key: &CollectionKey,
        title: &str,
    ) -> Result<VisitRecord, StorageError>;

    /// Most recent visits first, at most `limit` of them
    async fn list_recent_visits(&self, limit: usize) -> Result<Vec<VisitRecord>, StorageError>;

    /// Visits of one collection, most recent first
    async fn list_visits_for(
        &self,
        key: &CollectionKey,
        limit: usize,
    ) -> Result<Vec<VisitRecord>, StorageError>;

    /// Remove snapshots and visits with `now - timestamp > max_age`
    ///
    /// Returns the number of records removed.
    async fn evict_older_than(&self, max_age: Duration) -> Result<usize, StorageError>;

    /// Invalidate a snapshot by writing a tombstone over it
    async fn invalidate(&self, key: &CollectionKey) -> Result<(), StorageError> {
        self.put(key, None, None, LayoutMap::new(), DisplayOrder::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the SnapshotStore trait is object-safe
    fn _assert_object_safe(_: &dyn SnapshotStore) {}
}
