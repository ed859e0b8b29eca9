//! Behavioural tests shared by both SnapshotStore implementations

use std::sync::Arc;
use std::time::Duration;

use blockcanvas_core::{
    Clock, CollectionKey, DisplayOrder, Item, ItemId, LayoutEntry, LayoutMap, ManualClock,
};
use blockcanvas_storage::structured::tables::META;
use blockcanvas_storage::{
    InMemorySnapshotStore, RedbSnapshotStore, RedbStorageConfig, SCHEMA_VERSION, SnapshotStore,
    StorageError,
};
use tempfile::TempDir;

const START: i64 = 1_700_000_000_000;
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn key(slug: &str) -> CollectionKey {
    CollectionKey::new(slug).unwrap()
}

fn sample_items(count: u64) -> Vec<Item> {
    (1..=count)
        .map(|id| Item::text(id, format!("<p>{id}</p>")))
        .collect()
}

fn sample_layout(items: &[Item]) -> LayoutMap {
    items
        .iter()
        .map(|item| {
            let offset = item.id.as_u64() as f64;
            (item.id, LayoutEntry::new(offset * 10.0, offset * 5.0, -3.0))
        })
        .collect()
}

fn open_redb(dir: &TempDir, clock: Arc<ManualClock>) -> RedbSnapshotStore {
    let config = RedbStorageConfig::at(dir.path().join("canvas.redb"));
    RedbSnapshotStore::open(config, clock, DAY).unwrap()
}

// ============================================================================
// Shared scenarios
// ============================================================================

async fn check_round_trip(store: &dyn SnapshotStore, clock: &ManualClock) {
    let items = sample_items(4);
    let layout = sample_layout(&items);
    let order =
        DisplayOrder::from_ids(vec![ItemId(3), ItemId(1), ItemId(4), ItemId(2)]).unwrap();

    store
        .put(
            &key("arena"),
            Some("Arena".into()),
            Some(items.clone()),
            layout.clone(),
            order.clone(),
        )
        .await
        .unwrap();

    let snapshot = store.get(&key("arena")).await.unwrap().unwrap();
    assert_eq!(snapshot.items.as_deref(), Some(items.as_slice()));
    assert_eq!(snapshot.layout, layout);
    assert_eq!(snapshot.order, order);
    assert!(snapshot.order.validate_against(&items).is_ok());
    assert_eq!(snapshot.title.as_deref(), Some("Arena"));
    assert_eq!(snapshot.saved_at_millis, clock.now_millis());
}

async fn check_eviction_boundary(store: &dyn SnapshotStore, clock: &ManualClock) {
    let max_age = Duration::from_millis(10_000);

    store
        .put(&key("old"), None, Some(sample_items(1)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();
    store.append_visit(&key("old"), "Old").await.unwrap();

    clock.advance_millis(2);
    store
        .put(&key("young"), None, Some(sample_items(1)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();
    store.append_visit(&key("young"), "Young").await.unwrap();

    // "old" is now max_age + 1 ms old, "young" is max_age - 1 ms old
    clock.advance_millis(9_999);

    let removed = store.evict_older_than(max_age).await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.get(&key("old")).await.unwrap().is_none());
    assert!(store.get(&key("young")).await.unwrap().is_some());

    let visits = store.list_recent_visits(10).await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].title, "Young");
}

async fn check_layout_write_refreshes_timestamp(store: &dyn SnapshotStore, clock: &ManualClock) {
    let items = sample_items(2);
    store
        .put(&key("arena"), None, Some(items.clone()), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();

    clock.advance_millis(5_000);
    let layout = sample_layout(&items);
    let order = DisplayOrder::from_ids(vec![ItemId(2), ItemId(1)]).unwrap();
    assert!(
        store
            .update_layout(&key("arena"), layout.clone(), order.clone())
            .await
            .unwrap()
    );

    // Only the refreshed timestamp counts for eviction
    clock.advance_millis(5_000);
    assert_eq!(
        store.evict_older_than(Duration::from_millis(6_000)).await.unwrap(),
        0
    );

    let snapshot = store.get(&key("arena")).await.unwrap().unwrap();
    assert_eq!(snapshot.layout, layout);
    assert_eq!(snapshot.order, order);
    assert_eq!(snapshot.items.as_deref(), Some(items.as_slice()));

    assert!(
        !store
            .update_layout(&key("never-stored"), LayoutMap::new(), DisplayOrder::new())
            .await
            .unwrap()
    );
    assert!(store.get(&key("never-stored")).await.unwrap().is_none());
}

async fn check_visit_history(store: &dyn SnapshotStore, clock: &ManualClock) {
    for (slug, title) in [("a", "First"), ("b", "Second"), ("a", "Third")] {
        store.append_visit(&key(slug), title).await.unwrap();
        clock.advance_millis(100);
    }

    let recent = store.list_recent_visits(10).await.unwrap();
    let titles: Vec<&str> = recent.iter().map(|v| v.title.as_str()).collect();
    assert_eq!(titles, vec!["Third", "Second", "First"]);
    assert!(recent[0].id > recent[1].id);

    let limited = store.list_recent_visits(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].title, "Third");

    let only_a = store.list_visits_for(&key("a"), 10).await.unwrap();
    let titles: Vec<&str> = only_a.iter().map(|v| v.title.as_str()).collect();
    assert_eq!(titles, vec!["Third", "First"]);
}

async fn check_tombstone(store: &dyn SnapshotStore) {
    store
        .put(&key("arena"), None, Some(sample_items(3)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();
    store.append_visit(&key("arena"), "Arena").await.unwrap();

    store.invalidate(&key("arena")).await.unwrap();

    let snapshot = store.get(&key("arena")).await.unwrap().unwrap();
    assert!(snapshot.items.is_none());
    assert_eq!(store.list_recent_visits(10).await.unwrap().len(), 1);
}

// ============================================================================
// In-memory store
// ============================================================================

fn memory_store() -> (InMemorySnapshotStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_millis(START));
    (InMemorySnapshotStore::new(clock.clone()), clock)
}

#[tokio::test]
async fn test_memory_round_trip() {
    let (store, clock) = memory_store();
    check_round_trip(&store, &clock).await;
}

#[tokio::test]
async fn test_memory_eviction_boundary() {
    let (store, clock) = memory_store();
    check_eviction_boundary(&store, &clock).await;
}

#[tokio::test]
async fn test_memory_layout_write() {
    let (store, clock) = memory_store();
    check_layout_write_refreshes_timestamp(&store, &clock).await;
}

#[tokio::test]
async fn test_memory_visit_history() {
    let (store, clock) = memory_store();
    check_visit_history(&store, &clock).await;
}

#[tokio::test]
async fn test_memory_tombstone() {
    let (store, _clock) = memory_store();
    check_tombstone(&store).await;
}

// ============================================================================
// redb store
// ============================================================================

fn redb_store() -> (RedbSnapshotStore, Arc<ManualClock>, TempDir) {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::at_millis(START));
    let store = open_redb(&dir, clock.clone());
    (store, clock, dir)
}

#[tokio::test]
async fn test_redb_round_trip() {
    let (store, clock, _dir) = redb_store();
    check_round_trip(&store, &clock).await;
}

#[tokio::test]
async fn test_redb_eviction_boundary() {
    let (store, clock, _dir) = redb_store();
    check_eviction_boundary(&store, &clock).await;
}

#[tokio::test]
async fn test_redb_layout_write() {
    let (store, clock, _dir) = redb_store();
    check_layout_write_refreshes_timestamp(&store, &clock).await;
}

#[tokio::test]
async fn test_redb_visit_history() {
    let (store, clock, _dir) = redb_store();
    check_visit_history(&store, &clock).await;
}

#[tokio::test]
async fn test_redb_tombstone() {
    let (store, _clock, _dir) = redb_store();
    check_tombstone(&store).await;
}

#[tokio::test]
async fn test_redb_survives_reopen() {
    let (store, clock, dir) = redb_store();
    store
        .put(&key("arena"), Some("Arena".into()), Some(sample_items(2)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();
    store.append_visit(&key("arena"), "Arena").await.unwrap();
    drop(store);

    let reopened = open_redb(&dir, clock.clone());
    let snapshot = reopened.get(&key("arena")).await.unwrap().unwrap();
    assert_eq!(snapshot.items.map(|items| items.len()), Some(2));

    // Visit ids keep counting after a reopen
    let next = reopened.append_visit(&key("arena"), "Again").await.unwrap();
    assert_eq!(next.id, 2);
}

#[tokio::test]
async fn test_fresh_database_records_schema_version() {
    let (store, _clock, _dir) = redb_store();
    assert_eq!(store.schema_version().unwrap(), Some(SCHEMA_VERSION));
}

#[tokio::test]
async fn test_upgrade_from_v1_evicts_stale_records() {
    let (store, clock, dir) = redb_store();
    store
        .put(&key("stale"), None, Some(sample_items(1)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();
    store
        .storage()
        .put(META, b"schema_version", &1u32.to_be_bytes())
        .unwrap();
    drop(store);

    clock.advance_millis(2 * DAY.as_millis() as i64);
    let upgraded = open_redb(&dir, clock.clone());

    assert_eq!(upgraded.schema_version().unwrap(), Some(SCHEMA_VERSION));
    assert!(upgraded.get(&key("stale")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_current_schema_skips_eviction_on_open() {
    let (store, clock, dir) = redb_store();
    store
        .put(&key("kept"), None, Some(sample_items(1)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();
    drop(store);

    // Already at the current version: open leaves eviction to the caller
    clock.advance_millis(2 * DAY.as_millis() as i64);
    let reopened = open_redb(&dir, clock.clone());
    assert!(reopened.get(&key("kept")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_newer_schema_is_rejected() {
    let (store, clock, dir) = redb_store();
    store
        .storage()
        .put(META, b"schema_version", &9u32.to_be_bytes())
        .unwrap();
    drop(store);

    let config = RedbStorageConfig::at(dir.path().join("canvas.redb"));
    let result = RedbSnapshotStore::open(config, clock, DAY);
    assert!(matches!(
        result,
        Err(StorageError::UnsupportedSchema { found: 9, .. })
    ));
}
