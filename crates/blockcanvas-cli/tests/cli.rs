//! Command parsing and headless browsing against scripted collections

use std::sync::Arc;
use std::time::Duration;

use blockcanvas_cli::{
    Cli, Commands, browse, format_visit, history, load_config, open_store, run_maintenance,
};
use blockcanvas_core::{CollectionKey, DisplayOrder, Item, LayoutMap, ManualClock, VisitRecord};
use blockcanvas_engine::{CanvasConfig, DEFAULT_COLLECTION, NavigationOutcome};
use blockcanvas_fetch::MockCollectionApi;
use blockcanvas_storage::{InMemorySnapshotStore, SnapshotStore};
use clap::Parser;

fn key(slug: &str) -> CollectionKey {
    CollectionKey::new(slug).unwrap()
}

fn items(count: u64) -> Vec<Item> {
    (1..=count)
        .map(|id| Item::text(id, format!("<p>{id}</p>")))
        .collect()
}

fn fast_config() -> CanvasConfig {
    CanvasConfig::new().with_tick_interval_ms(10)
}

// ============================================================================
// Argument parsing
// ============================================================================

#[test]
fn test_parse_browse_with_refresh() {
    let cli = Cli::try_parse_from(["blockcanvas", "browse", "arena", "--refresh"]).unwrap();
    match cli.command {
        Commands::Browse {
            key,
            refresh,
            settle_secs,
        } => {
            assert_eq!(key.as_deref(), Some("arena"));
            assert!(refresh);
            assert_eq!(settle_secs, 10);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_parse_history_with_global_config() {
    let cli =
        Cli::try_parse_from(["blockcanvas", "history", "--limit", "5", "-c", "canvas.toml"])
            .unwrap();
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("canvas.toml")));
    assert!(matches!(
        cli.command,
        Commands::History {
            limit: 5,
            collection: None
        }
    ));
}

#[test]
fn test_parse_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["blockcanvas", "explode"]).is_err());
}

// ============================================================================
// Configuration and maintenance
// ============================================================================

#[test]
fn test_load_config_defaults_without_file() {
    let config = load_config(None).unwrap();
    assert_eq!(config.default_collection, DEFAULT_COLLECTION);
    assert_eq!(config.scheduler.batch_size, 20);
}

#[test]
fn test_load_config_reads_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("canvas.toml");
    std::fs::write(
        &path,
        "default_collection = \"arena\"\n[scheduler]\nbatch_size = 7\n",
    )
    .unwrap();

    let config = load_config(Some(path.as_path())).unwrap();
    assert_eq!(config.default_collection, "arena");
    assert_eq!(config.scheduler.batch_size, 7);
}

#[test]
fn test_load_config_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[tokio::test]
async fn test_maintenance_evicts_expired_records() {
    let clock = Arc::new(ManualClock::at_millis(1_000_000));
    let store = InMemorySnapshotStore::new(clock.clone());
    store
        .put(&key("old"), None, Some(items(2)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();
    store.append_visit(&key("old"), "Old").await.unwrap();
    clock.advance_millis(2_000);
    store
        .put(&key("new"), None, Some(items(2)), LayoutMap::new(), DisplayOrder::new())
        .await
        .unwrap();

    let removed = run_maintenance(&store, Duration::from_secs(1)).await.unwrap();

    assert_eq!(removed, 2);
    assert!(store.get(&key("old")).await.unwrap().is_none());
    assert!(store.get(&key("new")).await.unwrap().is_some());
}

// ============================================================================
// Browsing
// ============================================================================

#[tokio::test]
async fn test_browse_fetches_then_restores() {
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new(Arc::new(
        ManualClock::now(),
    )));
    let api = Arc::new(MockCollectionApi::new().with_collection("arena", "Arena", items(45)));

    let first = browse(
        fast_config(),
        store.clone(),
        api.clone(),
        &key("arena"),
        false,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert!(first.settled);
    assert_eq!(
        first.outcome,
        NavigationOutcome::Fetched {
            items: 45,
            failed_pages: Vec::new()
        }
    );
    assert_eq!(first.status.visible, 45);
    assert_eq!(first.lines()[0], "Arena (fetched)");

    let second = browse(
        fast_config(),
        store,
        api.clone(),
        &key("arena"),
        false,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(second.outcome, NavigationOutcome::Restored { items: 45 });
    assert_eq!(second.lines()[0], "Arena (restored from cache)");
    assert_eq!(api.meta_calls(), 1);
}

#[tokio::test]
async fn test_browse_unknown_collection_fails() {
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new(Arc::new(
        ManualClock::now(),
    )));
    let result = browse(
        fast_config(),
        store,
        MockCollectionApi::new(),
        &key("nowhere"),
        false,
        Duration::from_secs(1),
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("nowhere"));
}

#[tokio::test]
async fn test_browse_records_history_in_redb() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config().with_store_path(dir.path().join("canvas.redb"));
    let store = open_store(&config).unwrap();
    let api = MockCollectionApi::new().with_collection("arena", "Arena", items(3));

    browse(
        config,
        store.clone(),
        api,
        &key("arena"),
        false,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let visits = history(store.as_ref(), 10, None).await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].title, "Arena");

    let only_other = history(store.as_ref(), 10, Some(&key("other"))).await.unwrap();
    assert!(only_other.is_empty());
}

#[test]
fn test_format_visit() {
    let visit = VisitRecord {
        id: 1,
        collection_key: key("arena"),
        title: "Arena".to_string(),
        timestamp_millis: 0,
    };
    let line = format_visit(&visit);
    assert!(line.starts_with("1970-01-01 00:00:00  arena"));
    assert!(line.ends_with(" Arena"));
}
