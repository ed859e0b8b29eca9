//! redb table definitions and storage manager
//!
//! Defines all tables used for structured storage.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use tracing::{debug, info, instrument};

use crate::error::StorageError;

// Key: collection key bytes, Value: saved_at (8 bytes) ++ serialized CollectionSnapshot
pub const SNAPSHOTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("snapshots");

// Key: (saved_at, collection key) concatenated, Value: empty
pub const SNAPSHOTS_BY_TIME: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("snapshots_by_time");

// Key: visit id (u64 big-endian), Value: serialized VisitRecord
pub const VISITS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("visits");

// Key: (timestamp, visit id) concatenated, Value: empty
pub const VISITS_BY_TIME: TableDefinition<&[u8], &[u8]> = TableDefinition::new("visits_by_time");

// Key: (collection key, 0x00, visit id) concatenated, Value: empty
pub const VISITS_BY_KEY: TableDefinition<&[u8], &[u8]> = TableDefinition::new("visits_by_key");

// Key: setting name, Value: big-endian integer
pub const META: TableDefinition<&[u8], &[u8]> = TableDefinition::new("meta");

/// Map any redb error into a [`StorageError::Database`]
pub(crate) fn db_err(err: impl Display) -> StorageError {
    StorageError::Database(err.to_string())
}

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/blockcanvas.redb"),
            cache_size: 32 * 1024 * 1024, // 32MB
        }
    }
}

impl RedbStorageConfig {
    /// Config for a database file at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: path.into(),
            ..Default::default()
        }
    }
}

/// Main redb storage manager
pub struct RedbStorage {
    db: Arc<Database>,
    config: RedbStorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        info!("Opened redb database");

        let storage = Self {
            db: Arc::new(db),
            config,
        };

        storage.init_tables()?;

        Ok(storage)
    }

    /// Create every table so read transactions never hit a missing table
    fn init_tables(&self) -> Result<(), StorageError> {
        self.write(|txn| {
            for table in [
                SNAPSHOTS,
                SNAPSHOTS_BY_TIME,
                VISITS,
                VISITS_BY_TIME,
                VISITS_BY_KEY,
                META,
            ] {
                txn.open_table(table).map_err(db_err)?;
            }
            Ok(())
        })?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get a reference to the database
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Run `f` inside a write transaction and commit it
    ///
    /// The transaction is aborted if `f` fails.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let value = f(&txn)?;
        txn.commit().map_err(db_err)?;
        Ok(value)
    }

    /// Run `f` inside a read transaction
    pub fn read<T>(
        &self,
        f: impl FnOnce(&ReadTransaction) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let txn = self.db.begin_read().map_err(db_err)?;
        f(&txn)
    }

    /// Get a value from a table
    pub fn get(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.read(|txn| {
            let table = txn.open_table(table).map_err(db_err)?;
            let value = table
                .get(key)
                .map_err(db_err)?
                .map(|v| v.value().to_vec());
            Ok(value)
        })
    }

    /// Put a key-value pair in a table
    pub fn put(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StorageError> {
        self.write(|txn| {
            let mut table = txn.open_table(table).map_err(db_err)?;
            table.insert(key, value).map_err(db_err)?;
            Ok(())
        })
    }

    /// Count entries in a table
    pub fn count(&self, table: TableDefinition<&[u8], &[u8]>) -> Result<usize, StorageError> {
        self.read(|txn| {
            let table = txn.open_table(table).map_err(db_err)?;
            let mut count = 0;
            for entry in table.iter().map_err(db_err)? {
                entry.map_err(db_err)?;
                count += 1;
            }
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (RedbStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStorageConfig::at(temp_dir.path().join("test.redb"));
        let storage = RedbStorage::open(config).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_put_get() {
        let (storage, _temp) = create_test_storage();

        storage.put(META, b"answer", &42u32.to_be_bytes()).unwrap();
        let value = storage.get(META, b"answer").unwrap();
        assert_eq!(value, Some(42u32.to_be_bytes().to_vec()));
        assert_eq!(storage.get(META, b"missing").unwrap(), None);
    }

    #[test]
    fn test_failed_write_is_not_committed() {
        let (storage, _temp) = create_test_storage();

        let result: Result<(), StorageError> = storage.write(|txn| {
            let mut table = txn.open_table(META).map_err(db_err)?;
            table.insert(b"half".as_slice(), b"done".as_slice()).map_err(db_err)?;
            Err(StorageError::serialization("boom"))
        });
        assert!(result.is_err());
        assert_eq!(storage.get(META, b"half").unwrap(), None);
    }

    #[test]
    fn test_count() {
        let (storage, _temp) = create_test_storage();
        assert_eq!(storage.count(VISITS).unwrap(), 0);
        storage.put(VISITS, b"a", b"1").unwrap();
        storage.put(VISITS, b"b", b"2").unwrap();
        assert_eq!(storage.count(VISITS).unwrap(), 2);
    }
}
