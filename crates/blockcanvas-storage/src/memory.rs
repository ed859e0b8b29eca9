//! In-memory storage implementation
//!
//! Suitable for tests and for running the canvas without a database file.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use blockcanvas_core::{
    Clock, CollectionKey, CollectionSnapshot, DisplayOrder, Item, LayoutMap, VisitRecord,
};
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::SnapshotStore;
use crate::error::StorageError;

/// In-memory implementation of [`SnapshotStore`]
///
/// Uses `DashMap` for concurrent access to snapshots and visits.
#[derive(Debug)]
pub struct InMemorySnapshotStore {
    snapshots: DashMap<CollectionKey, CollectionSnapshot>,
    visits: DashMap<u64, VisitRecord>,
    next_visit_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl InMemorySnapshotStore {
    /// Create an empty store reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshots: DashMap::new(),
            visits: DashMap::new(),
            next_visit_id: AtomicU64::new(1),
            clock,
        }
    }

    /// Number of stored snapshots, tombstones included
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Number of stored visits
    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, key: &CollectionKey) -> Result<Option<CollectionSnapshot>, StorageError> {
        Ok(self.snapshots.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(
        &self,
        key: &CollectionKey,
        title: Option<String>,
        items: Option<Vec<Item>>,
        layout: LayoutMap,
        order: DisplayOrder,
    ) -> Result<(), StorageError> {
        trace!(collection = %key, tombstone = items.is_none(), "Storing snapshot");
        let snapshot = CollectionSnapshot {
            collection_key: key.clone(),
            title,
            items,
            layout,
            order,
            saved_at_millis: self.clock.now_millis(),
        };
        self.snapshots.insert(key.clone(), snapshot);
        Ok(())
    }

    async fn update_layout(
        &self,
        key: &CollectionKey,
        layout: LayoutMap,
        order: DisplayOrder,
    ) -> Result<bool, StorageError> {
        match self.snapshots.get_mut(key) {
            Some(mut entry) => {
                let snapshot = entry.value_mut();
                snapshot.layout = layout;
                snapshot.order = order;
                snapshot.saved_at_millis = self.clock.now_millis();
                Ok(true)
            }
            None => {
                debug!(collection = %key, "Skipped layout write for missing snapshot");
                Ok(false)
            }
        }
    }

    async fn append_visit(
        &self,
        key: &CollectionKey,
        title: &str,
    ) -> Result<VisitRecord, StorageError> {
        let record = VisitRecord {
            id: self.next_visit_id.fetch_add(1, Ordering::SeqCst),
            collection_key: key.clone(),
            title: title.to_string(),
            timestamp_millis: self.clock.now_millis(),
        };
        self.visits.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_recent_visits(&self, limit: usize) -> Result<Vec<VisitRecord>, StorageError> {
        let mut visits: Vec<VisitRecord> = self
            .visits
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        visits.sort_by(|a, b| {
            b.timestamp_millis
                .cmp(&a.timestamp_millis)
                .then(b.id.cmp(&a.id))
        });
        visits.truncate(limit);
        Ok(visits)
    }

    async fn list_visits_for(
        &self,
        key: &CollectionKey,
        limit: usize,
    ) -> Result<Vec<VisitRecord>, StorageError> {
        let mut visits = self.list_recent_visits(usize::MAX).await?;
        visits.retain(|visit| &visit.collection_key == key);
        visits.truncate(limit);
        Ok(visits)
    }

    async fn evict_older_than(&self, max_age: Duration) -> Result<usize, StorageError> {
        let cutoff = self.clock.now_millis() - max_age.as_millis() as i64;
        let snapshots_before = self.snapshots.len();
        self.snapshots
            .retain(|_, snapshot| snapshot.saved_at_millis >= cutoff);
        let visits_before = self.visits.len();
        self.visits.retain(|_, visit| visit.timestamp_millis >= cutoff);

        let removed = (snapshots_before - self.snapshots.len())
            + (visits_before - self.visits.len());
        if removed > 0 {
            debug!(removed, "Evicted expired records");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcanvas_core::ManualClock;

    fn create_test_store() -> (InMemorySnapshotStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(1_000_000));
        (InMemorySnapshotStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_update_layout_requires_record() {
        let (store, _clock) = create_test_store();
        let key = CollectionKey::new("missing").unwrap();

        let written = store
            .update_layout(&key, LayoutMap::new(), DisplayOrder::new())
            .await
            .unwrap();
        assert!(!written);
        assert_eq!(store.snapshot_count(), 0);
    }

    #[tokio::test]
    async fn test_tombstone_keeps_visits() {
        let (store, _clock) = create_test_store();
        let key = CollectionKey::new("arena").unwrap();

        store.append_visit(&key, "Arena").await.unwrap();
        store.invalidate(&key).await.unwrap();

        let snapshot = store.get(&key).await.unwrap().unwrap();
        assert!(snapshot.items.is_none());
        assert_eq!(store.visit_count(), 1);
    }

    #[tokio::test]
    async fn test_visits_most_recent_first() {
        let (store, clock) = create_test_store();
        for slug in ["one", "two", "three"] {
            let key = CollectionKey::new(slug).unwrap();
            store.append_visit(&key, slug).await.unwrap();
            clock.advance_millis(10);
        }

        let recent = store.list_recent_visits(2).await.unwrap();
        let titles: Vec<&str> = recent.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["three", "two"]);
    }
}
