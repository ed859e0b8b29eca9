//! Durable snapshot and visit storage
//!
//! Snapshots are keyed by collection key with a secondary index on save
//! time. Visits get an auto-incremented id and are indexed by timestamp
//! and by collection key. Both time indexes let eviction walk only the
//! expired prefix instead of decoding every record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blockcanvas_core::{
    Clock, CollectionKey, CollectionSnapshot, DisplayOrder, Item, LayoutMap, VisitRecord,
};
use redb::{ReadableTable, WriteTransaction};
use tracing::{debug, info, instrument, warn};

use super::tables::{
    META, RedbStorage, RedbStorageConfig, SNAPSHOTS, SNAPSHOTS_BY_TIME, VISITS, VISITS_BY_KEY,
    VISITS_BY_TIME, db_err,
};
use crate::SnapshotStore;
use crate::error::StorageError;

/// Current on-disk schema version
///
/// Opening a database below this version runs an eviction pass before the
/// version is bumped.
pub const SCHEMA_VERSION: u32 = 2;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
const NEXT_VISIT_ID_KEY: &[u8] = b"next_visit_id";
const TIMESTAMP_LEN: usize = 8;

/// Order-preserving encoding of a signed millisecond timestamp
fn time_key(millis: i64) -> [u8; TIMESTAMP_LEN] {
    ((millis as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_time_key(bytes: &[u8]) -> Option<i64> {
    let raw: [u8; TIMESTAMP_LEN] = bytes.get(..TIMESTAMP_LEN)?.try_into().ok()?;
    Some((u64::from_be_bytes(raw) ^ (1 << 63)) as i64)
}

fn visit_time_key(timestamp_millis: i64, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&time_key(timestamp_millis));
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn visit_collection_prefix(collection: &CollectionKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(collection.as_bytes().len() + 1);
    key.extend_from_slice(collection.as_bytes());
    key.push(0);
    key
}

fn visit_collection_key(collection: &CollectionKey, id: u64) -> Vec<u8> {
    let mut key = visit_collection_prefix(collection);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn snapshot_time_key(saved_at_millis: i64, collection: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(TIMESTAMP_LEN + collection.len());
    key.extend_from_slice(&time_key(saved_at_millis));
    key.extend_from_slice(collection);
    key
}

fn decode_u64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.get(..8)?.try_into().ok()?))
}

/// Snapshot values carry their save time up front so index maintenance
/// never has to decode the item list.
fn encode_snapshot(snapshot: &CollectionSnapshot) -> Result<Vec<u8>, StorageError> {
    let body =
        postcard::to_allocvec(snapshot).map_err(|e| StorageError::serialization(e.to_string()))?;
    let mut value = Vec::with_capacity(TIMESTAMP_LEN + body.len());
    value.extend_from_slice(&time_key(snapshot.saved_at_millis));
    value.extend_from_slice(&body);
    Ok(value)
}

fn decode_snapshot(value: &[u8]) -> Result<CollectionSnapshot, StorageError> {
    let body = value
        .get(TIMESTAMP_LEN..)
        .ok_or_else(|| StorageError::deserialization("truncated snapshot record"))?;
    Ok(postcard::from_bytes(body)?)
}

/// redb-backed [`SnapshotStore`]
pub struct RedbSnapshotStore {
    storage: Arc<RedbStorage>,
    clock: Arc<dyn Clock>,
}

impl RedbSnapshotStore {
    /// Open the database and bring its schema up to [`SCHEMA_VERSION`]
    ///
    /// Upgrading from an older (or fresh) database evicts everything older
    /// than `upgrade_max_age` first.
    #[instrument(skip_all, fields(path = %config.db_path.display()))]
    pub fn open(
        config: RedbStorageConfig,
        clock: Arc<dyn Clock>,
        upgrade_max_age: Duration,
    ) -> Result<Self, StorageError> {
        let storage = Arc::new(RedbStorage::open(config)?);
        let store = Self { storage, clock };
        store.migrate(upgrade_max_age)?;
        Ok(store)
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> Result<Option<u32>, StorageError> {
        let raw = self.storage.get(META, SCHEMA_VERSION_KEY)?;
        Ok(raw
            .as_deref()
            .and_then(|bytes| bytes.get(..4))
            .and_then(|bytes| bytes.try_into().ok())
            .map(u32::from_be_bytes))
    }

    /// Get the underlying storage manager
    pub fn storage(&self) -> &RedbStorage {
        &self.storage
    }

    fn migrate(&self, upgrade_max_age: Duration) -> Result<(), StorageError> {
        let found = self.schema_version()?;
        match found {
            Some(version) if version > SCHEMA_VERSION => Err(StorageError::UnsupportedSchema {
                found: version,
                supported: SCHEMA_VERSION,
            }),
            Some(SCHEMA_VERSION) => Ok(()),
            _ => {
                info!(from = ?found, to = SCHEMA_VERSION, "Upgrading snapshot schema");
                let cutoff = self.cutoff(upgrade_max_age);
                self.storage.write(|txn| {
                    let removed = Self::evict_before(txn, cutoff)?;
                    if removed > 0 {
                        debug!(removed, "Evicted expired records during upgrade");
                    }
                    let mut meta = txn.open_table(META).map_err(db_err)?;
                    meta.insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_be_bytes().as_slice())
                        .map_err(db_err)?;
                    Ok(())
                })
            }
        }
    }

    fn cutoff(&self, max_age: Duration) -> i64 {
        self.clock.now_millis() - max_age.as_millis() as i64
    }

    /// Remove every snapshot and visit stamped strictly before `cutoff`
    fn evict_before(txn: &WriteTransaction, cutoff: i64) -> Result<usize, StorageError> {
        let bound = time_key(cutoff);
        let mut removed = 0;

        {
            let mut by_time = txn.open_table(SNAPSHOTS_BY_TIME).map_err(db_err)?;
            let mut snapshots = txn.open_table(SNAPSHOTS).map_err(db_err)?;

            let mut expired = Vec::new();
            for entry in by_time.range(..bound.as_slice()).map_err(db_err)? {
                let (key, _) = entry.map_err(db_err)?;
                expired.push(key.value().to_vec());
            }

            for index_key in expired {
                by_time.remove(index_key.as_slice()).map_err(db_err)?;
                let collection = &index_key[TIMESTAMP_LEN..];
                if snapshots.remove(collection).map_err(db_err)?.is_some() {
                    removed += 1;
                }
            }
        }

        {
            let mut by_time = txn.open_table(VISITS_BY_TIME).map_err(db_err)?;
            let mut by_key = txn.open_table(VISITS_BY_KEY).map_err(db_err)?;
            let mut visits = txn.open_table(VISITS).map_err(db_err)?;

            let mut expired = Vec::new();
            for entry in by_time.range(..bound.as_slice()).map_err(db_err)? {
                let (key, _) = entry.map_err(db_err)?;
                expired.push(key.value().to_vec());
            }

            for index_key in expired {
                by_time.remove(index_key.as_slice()).map_err(db_err)?;
                let Some(id_bytes) = index_key.get(TIMESTAMP_LEN..) else {
                    continue;
                };
                let record = visits
                    .remove(id_bytes)
                    .map_err(db_err)?
                    .map(|guard| postcard::from_bytes::<VisitRecord>(guard.value()));
                match record {
                    Some(Ok(visit)) => {
                        let key = visit_collection_key(&visit.collection_key, visit.id);
                        by_key.remove(key.as_slice()).map_err(db_err)?;
                        removed += 1;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Dropped undecodable visit record");
                        removed += 1;
                    }
                    None => {}
                }
            }
        }

        Ok(removed)
    }

    fn read_visits(&self, ids: Vec<Vec<u8>>) -> Result<Vec<VisitRecord>, StorageError> {
        self.storage.read(|txn| {
            let visits = txn.open_table(VISITS).map_err(db_err)?;
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(value) = visits.get(id.as_slice()).map_err(db_err)? {
                    records.push(postcard::from_bytes(value.value())?);
                }
            }
            Ok(records)
        })
    }
}

#[async_trait]
impl SnapshotStore for RedbSnapshotStore {
    async fn get(&self, key: &CollectionKey) -> Result<Option<CollectionSnapshot>, StorageError> {
        match self.storage.get(SNAPSHOTS, key.as_bytes())? {
            Some(value) => decode_snapshot(&value).map(Some),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &CollectionKey,
        title: Option<String>,
        items: Option<Vec<Item>>,
        layout: LayoutMap,
        order: DisplayOrder,
    ) -> Result<(), StorageError> {
        let snapshot = CollectionSnapshot {
            collection_key: key.clone(),
            title,
            items,
            layout,
            order,
            saved_at_millis: self.clock.now_millis(),
        };
        let value = encode_snapshot(&snapshot)?;

        self.storage.write(|txn| {
            let mut snapshots = txn.open_table(SNAPSHOTS).map_err(db_err)?;
            let mut by_time = txn.open_table(SNAPSHOTS_BY_TIME).map_err(db_err)?;

            let previous = snapshots
                .insert(key.as_bytes(), value.as_slice())
                .map_err(db_err)?
                .and_then(|old| decode_time_key(old.value()));
            if let Some(old_saved_at) = previous {
                let old_index = snapshot_time_key(old_saved_at, key.as_bytes());
                by_time.remove(old_index.as_slice()).map_err(db_err)?;
            }

            let index = snapshot_time_key(snapshot.saved_at_millis, key.as_bytes());
            by_time.insert(index.as_slice(), b"".as_slice()).map_err(db_err)?;
            Ok(())
        })?;

        debug!(
            collection = %key,
            tombstone = snapshot.items.is_none(),
            bytes = value.len(),
            "Stored snapshot"
        );
        Ok(())
    }

    async fn update_layout(
        &self,
        key: &CollectionKey,
        layout: LayoutMap,
        order: DisplayOrder,
    ) -> Result<bool, StorageError> {
        let now = self.clock.now_millis();

        let written = self.storage.write(|txn| {
            let mut snapshots = txn.open_table(SNAPSHOTS).map_err(db_err)?;
            let existing = snapshots
                .get(key.as_bytes())
                .map_err(db_err)?
                .map(|value| decode_snapshot(value.value()))
                .transpose()?;
            let Some(mut snapshot) = existing else {
                return Ok(false);
            };

            let old_index = snapshot_time_key(snapshot.saved_at_millis, key.as_bytes());
            snapshot.layout = layout;
            snapshot.order = order;
            snapshot.saved_at_millis = now;
            let value = encode_snapshot(&snapshot)?;
            snapshots
                .insert(key.as_bytes(), value.as_slice())
                .map_err(db_err)?;

            let mut by_time = txn.open_table(SNAPSHOTS_BY_TIME).map_err(db_err)?;
            by_time.remove(old_index.as_slice()).map_err(db_err)?;
            let index = snapshot_time_key(now, key.as_bytes());
            by_time.insert(index.as_slice(), b"".as_slice()).map_err(db_err)?;
            Ok(true)
        })?;

        if !written {
            debug!(collection = %key, "Skipped layout write for missing snapshot");
        }
        Ok(written)
    }

    async fn append_visit(
        &self,
        key: &CollectionKey,
        title: &str,
    ) -> Result<VisitRecord, StorageError> {
        let timestamp_millis = self.clock.now_millis();

        let record = self.storage.write(|txn| {
            let mut meta = txn.open_table(META).map_err(db_err)?;
            let id = meta
                .get(NEXT_VISIT_ID_KEY)
                .map_err(db_err)?
                .and_then(|value| decode_u64(value.value()))
                .unwrap_or(1);
            meta.insert(NEXT_VISIT_ID_KEY, (id + 1).to_be_bytes().as_slice())
                .map_err(db_err)?;

            let record = VisitRecord {
                id,
                collection_key: key.clone(),
                title: title.to_string(),
                timestamp_millis,
            };
            let value = postcard::to_allocvec(&record)
                .map_err(|e| StorageError::serialization(e.to_string()))?;

            let mut visits = txn.open_table(VISITS).map_err(db_err)?;
            visits
                .insert(id.to_be_bytes().as_slice(), value.as_slice())
                .map_err(db_err)?;

            let mut by_time = txn.open_table(VISITS_BY_TIME).map_err(db_err)?;
            let time_index = visit_time_key(timestamp_millis, id);
            by_time
                .insert(time_index.as_slice(), b"".as_slice())
                .map_err(db_err)?;

            let mut by_key = txn.open_table(VISITS_BY_KEY).map_err(db_err)?;
            let key_index = visit_collection_key(key, id);
            by_key
                .insert(key_index.as_slice(), b"".as_slice())
                .map_err(db_err)?;

            Ok(record)
        })?;

        debug!(collection = %key, visit = record.id, "Recorded visit");
        Ok(record)
    }

    async fn list_recent_visits(&self, limit: usize) -> Result<Vec<VisitRecord>, StorageError> {
        let ids = self.storage.read(|txn| {
            let by_time = txn.open_table(VISITS_BY_TIME).map_err(db_err)?;
            let mut ids = Vec::new();
            for entry in by_time.iter().map_err(db_err)?.rev().take(limit) {
                let (key, _) = entry.map_err(db_err)?;
                if let Some(id) = key.value().get(TIMESTAMP_LEN..) {
                    ids.push(id.to_vec());
                }
            }
            Ok(ids)
        })?;
        self.read_visits(ids)
    }

    async fn list_visits_for(
        &self,
        key: &CollectionKey,
        limit: usize,
    ) -> Result<Vec<VisitRecord>, StorageError> {
        let prefix = visit_collection_prefix(key);
        let ids = self.storage.read(|txn| {
            let by_key = txn.open_table(VISITS_BY_KEY).map_err(db_err)?;
            let mut ids = Vec::new();
            for entry in by_key.range(prefix.as_slice()..).map_err(db_err)? {
                let (index_key, _) = entry.map_err(db_err)?;
                let index_key = index_key.value();
                // Stop when we're past the prefix
                if !index_key.starts_with(&prefix) {
                    break;
                }
                ids.push(index_key[prefix.len()..].to_vec());
            }
            Ok(ids)
        })?;

        // Ids grow monotonically, so later ids are more recent visits
        let mut visits = self.read_visits(ids)?;
        visits.sort_by(|a, b| {
            b.timestamp_millis
                .cmp(&a.timestamp_millis)
                .then(b.id.cmp(&a.id))
        });
        visits.truncate(limit);
        Ok(visits)
    }

    async fn evict_older_than(&self, max_age: Duration) -> Result<usize, StorageError> {
        let cutoff = self.cutoff(max_age);
        let removed = self
            .storage
            .write(|txn| Self::evict_before(txn, cutoff))?;
        if removed > 0 {
            info!(removed, "Evicted expired records");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_key_preserves_order() {
        let samples = [-5_000i64, -1, 0, 1, 1_700_000_000_000];
        for pair in samples.windows(2) {
            assert!(time_key(pair[0]) < time_key(pair[1]));
        }
        for sample in samples {
            assert_eq!(decode_time_key(&time_key(sample)), Some(sample));
        }
    }

    #[test]
    fn test_snapshot_value_carries_timestamp() {
        let snapshot = CollectionSnapshot {
            collection_key: CollectionKey::new("arena").unwrap(),
            title: Some("Arena".into()),
            items: Some(vec![Item::text(1, "a")]),
            layout: LayoutMap::new(),
            order: DisplayOrder::new(),
            saved_at_millis: 1234,
        };
        let value = encode_snapshot(&snapshot).unwrap();
        assert_eq!(decode_time_key(&value), Some(1234));
        assert_eq!(decode_snapshot(&value).unwrap(), snapshot);
    }

    #[test]
    fn test_truncated_snapshot_is_rejected() {
        assert!(matches!(
            decode_snapshot(&[1, 2, 3]),
            Err(StorageError::Deserialization(_))
        ));
    }
}
