//! Pagination and assembly tests against the scripted API

use std::sync::Arc;
use std::time::Duration;

use blockcanvas_core::{CollectionKey, Footprint, Item, ItemId, Viewport};
use blockcanvas_fetch::{CollectionFetcher, MockCollectionApi};

fn key(slug: &str) -> CollectionKey {
    CollectionKey::new(slug).unwrap()
}

fn numbered_items(count: u64) -> Vec<Item> {
    (1..=count).map(|id| Item::text(id, format!("{id}"))).collect()
}

fn ids(items: &[Item]) -> Vec<u64> {
    items.iter().map(|item| item.id.as_u64()).collect()
}

// ============================================================================
// Ordering and partial failure
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_page_order_survives_out_of_order_completion_and_failure() {
    let api = MockCollectionApi::new()
        .with_collection("arena", "Arena", numbered_items(350))
        .with_page_delay(1, Duration::from_millis(50))
        .with_page_delay(3, Duration::from_millis(10))
        .with_failing_page(2);
    let fetcher = CollectionFetcher::new(api);

    let fetched = fetcher
        .fetch_all_items(&key("arena"), Viewport::default(), |_, _| {})
        .await;

    let expected: Vec<u64> = (1..=100).chain(201..=350).collect();
    assert_eq!(ids(&fetched.items), expected);
    assert_eq!(fetched.failed_pages, vec![2]);
    assert_eq!(fetched.order.len(), fetched.items.len());
    assert!(fetched.order.validate_against(&fetched.items).is_ok());
}

#[tokio::test]
async fn test_every_page_failing_yields_empty_items() {
    let api = MockCollectionApi::new()
        .with_collection("arena", "Arena", numbered_items(150))
        .with_failing_page(1)
        .with_failing_page(2);
    let fetcher = CollectionFetcher::new(api);

    let fetched = fetcher
        .fetch_all_items(&key("arena"), Viewport::default(), |_, _| {})
        .await;

    assert!(fetched.is_empty());
    assert!(fetched.meta.is_some());
    assert_eq!(fetched.failed_pages, vec![1, 2]);
}

// ============================================================================
// Request accounting
// ============================================================================

#[tokio::test]
async fn test_one_meta_request_and_ceil_pages() {
    for (count, pages) in [(1u64, 1usize), (100, 1), (101, 2), (250, 3)] {
        let api = Arc::new(MockCollectionApi::new().with_collection(
            "arena",
            "Arena",
            numbered_items(count),
        ));
        let fetcher = CollectionFetcher::new(api.clone());

        let fetched = fetcher
            .fetch_all_items(&key("arena"), Viewport::default(), |_, _| {})
            .await;

        assert_eq!(fetched.items.len(), count as usize);
        assert_eq!(api.meta_calls(), 1);
        assert_eq!(api.page_calls(), pages, "{count} items");
    }
}

#[tokio::test]
async fn test_meta_failure_returns_empty_without_page_requests() {
    let api = Arc::new(MockCollectionApi::new().with_collection("arena", "Arena", numbered_items(10)));
    api.set_meta_fails(true);
    let fetcher = CollectionFetcher::new(api.clone());

    assert!(fetcher.fetch_collection_meta(&key("arena")).await.is_none());

    let fetched = fetcher
        .fetch_all_items(&key("arena"), Viewport::default(), |_, _| {})
        .await;
    assert!(fetched.is_empty());
    assert!(fetched.meta.is_none());
    assert_eq!(api.page_calls(), 0);
}

#[tokio::test]
async fn test_unknown_collection_is_empty() {
    let fetcher = CollectionFetcher::new(MockCollectionApi::new());
    let fetched = fetcher
        .fetch_all_items(&key("nowhere"), Viewport::default(), |_, _| {})
        .await;
    assert!(fetched.is_empty());
}

#[tokio::test]
async fn test_empty_collection_requests_no_pages() {
    let api = Arc::new(MockCollectionApi::new().with_collection("void", "Void", Vec::new()));
    let fetcher = CollectionFetcher::new(api.clone());

    let fetched = fetcher
        .fetch_all_items(&key("void"), Viewport::default(), |_, _| {})
        .await;
    assert!(fetched.is_empty());
    assert_eq!(fetched.title(), Some("Void"));
    assert_eq!(api.page_calls(), 0);
}

// ============================================================================
// Progress and seeding
// ============================================================================

#[tokio::test]
async fn test_progress_reports_running_totals() {
    let api = MockCollectionApi::new().with_collection("arena", "Arena", numbered_items(230));
    let fetcher = CollectionFetcher::new(api);

    let mut reports = Vec::new();
    fetcher
        .fetch_all_items(&key("arena"), Viewport::default(), |loaded, total| {
            reports.push((loaded, total))
        })
        .await;

    assert_eq!(reports.len(), 3);
    assert!(reports.windows(2).all(|pair| pair[0].0 < pair[1].0));
    assert_eq!(reports.last(), Some(&(230, 230)));
}

#[tokio::test]
async fn test_seeded_layout_within_viewport() {
    let api = MockCollectionApi::new().with_collection("arena", "Arena", numbered_items(120));
    let fetcher = CollectionFetcher::new(api);
    let viewport = Viewport::new(900.0, 700.0);

    let fetched = fetcher.fetch_all_items(&key("arena"), viewport, |_, _| {}).await;

    let bounds = viewport.placement_bounds(Footprint::default());
    assert_eq!(fetched.layout.len(), 120);
    for item in &fetched.items {
        let entry = fetched.layout[&item.id];
        assert!(bounds.contains(entry.x, entry.y));
        assert!((-10.0..=10.0).contains(&entry.rotation_degrees));
    }
    assert_eq!(fetched.order.ids().first(), Some(&ItemId(1)));
}
