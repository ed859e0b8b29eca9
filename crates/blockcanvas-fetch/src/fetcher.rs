//! Paginated collection assembly
//!
//! The fetcher asks for metadata first, then requests every page at once
//! and joins them all-settled: a failed page is logged and skipped, the
//! rest are stitched together in page order no matter which finished
//! first. Only a metadata failure yields an empty result.

use std::collections::HashSet;

use blockcanvas_core::{CollectionKey, DisplayOrder, Footprint, Item, LayoutMap, Viewport};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{debug, info, instrument, warn};

use crate::api::{CollectionApi, CollectionMeta};
use crate::seed::{self, MAX_SCATTER_ROTATION};

/// Fetcher settings
#[derive(Debug, Clone, PartialEq)]
pub struct FetcherConfig {
    /// Items requested per page
    pub page_size: usize,
    /// Tile size used to keep seeded positions on screen
    pub footprint: Footprint,
    /// Seeded rotation range, in degrees either side of zero
    pub max_rotation: f64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            footprint: Footprint::default(),
            max_rotation: MAX_SCATTER_ROTATION,
        }
    }
}

impl FetcherConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_footprint(mut self, footprint: Footprint) -> Self {
        self.footprint = footprint;
        self
    }
}

/// Everything a fresh load produces
#[derive(Debug, Clone, Default)]
pub struct FetchedCollection {
    /// `None` when metadata could not be fetched
    pub meta: Option<CollectionMeta>,
    /// Items in page order
    pub items: Vec<Item>,
    /// Randomly seeded layout, one entry per item
    pub layout: LayoutMap,
    /// Natural order of `items`
    pub order: DisplayOrder,
    /// 1-based numbers of pages that failed
    pub failed_pages: Vec<usize>,
}

impl FetchedCollection {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn title(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|meta| meta.title.as_deref())
    }
}

/// Remote Collection Fetcher
#[derive(Debug, Clone)]
pub struct CollectionFetcher<A> {
    api: A,
    config: FetcherConfig,
}

impl<A: CollectionApi> CollectionFetcher<A> {
    pub fn new(api: A) -> Self {
        Self::with_config(api, FetcherConfig::default())
    }

    pub fn with_config(api: A, config: FetcherConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch metadata, logging and swallowing failures
    pub async fn fetch_collection_meta(&self, key: &CollectionKey) -> Option<CollectionMeta> {
        match self.api.collection_meta(key).await {
            Ok(meta) => {
                info!(
                    target: "panel",
                    collection = %key,
                    items = meta.item_count,
                    "Collection \"{}\" has {} items",
                    meta.title.as_deref().unwrap_or(key.as_str()),
                    meta.item_count
                );
                Some(meta)
            }
            Err(e) => {
                warn!(target: "panel", collection = %key, error = %e, "Could not fetch collection info");
                None
            }
        }
    }

    /// Fetch every page of a collection and seed a random layout
    ///
    /// `on_progress(loaded, total)` runs after each successful page.
    #[instrument(skip_all, fields(collection = %key))]
    pub async fn fetch_all_items<F>(
        &self,
        key: &CollectionKey,
        viewport: Viewport,
        mut on_progress: F,
    ) -> FetchedCollection
    where
        F: FnMut(usize, usize) + Send,
    {
        let Some(meta) = self.fetch_collection_meta(key).await else {
            return FetchedCollection::default();
        };

        let page_size = self.config.page_size;
        let page_count = meta.page_count(page_size);
        let total = meta.item_count;

        let mut pending: FuturesUnordered<_> = (1..=page_count)
            .map(|page| async move {
                debug!(page, "Requesting page");
                (page, self.api.items_page(key, page, page_size).await)
            })
            .collect();

        let mut slots: Vec<Option<Vec<Item>>> = vec![None; page_count];
        let mut failed_pages = Vec::new();
        let mut loaded = 0;

        while let Some((page, result)) = pending.next().await {
            match result {
                Ok(items) => {
                    debug!(page, count = items.len(), "Page received");
                    loaded += items.len();
                    on_progress(loaded, total);
                    if let Some(slot) = slots.get_mut(page - 1) {
                        *slot = Some(items);
                    }
                }
                Err(e) => {
                    warn!(target: "panel", page, error = %e, "Error fetching page {}", page);
                    failed_pages.push(page);
                }
            }
        }
        failed_pages.sort_unstable();

        let mut seen = HashSet::new();
        let items: Vec<Item> = slots
            .into_iter()
            .flatten()
            .flatten()
            .filter(|item| seen.insert(item.id))
            .collect();

        info!(
            target: "panel",
            count = items.len(),
            failed = failed_pages.len(),
            "Fetched {} items",
            items.len()
        );

        let bounds = viewport.placement_bounds(self.config.footprint);
        let layout = seed::scatter(&items, &bounds, self.config.max_rotation, &mut rand::rng());
        let order = DisplayOrder::from_items(&items);

        FetchedCollection {
            meta: Some(meta),
            items,
            layout,
            order,
            failed_pages,
        }
    }
}
