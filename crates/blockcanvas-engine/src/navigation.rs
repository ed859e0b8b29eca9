//! Navigation Controller
//!
//! Switches the canvas between collections. A navigation tears the current
//! session down synchronously, then tries the local snapshot before the
//! network:
//!
//! 1. A fresh, non-empty snapshot is adopted without touching the network.
//! 2. A missing, stale, unreadable or tombstoned snapshot falls through to
//!    the fetcher. Unusable records are tombstoned on the way.
//! 3. A fetched collection is cached, adopted and recorded as a visit.
//!
//! Every navigation carries a generation number. When a newer navigation
//! starts before an older one finishes, the older one's results are
//! discarded.

use std::sync::Arc;

use blockcanvas_core::{
    Clock, CollectionKey, CollectionSnapshot, DisplayOrder, Item, ItemId, LayoutMap,
    SnapshotRejection, SystemClock, Viewport, VisitRecord,
};
use blockcanvas_fetch::{CollectionApi, CollectionFetcher, FetchedCollection, FetcherConfig};
use blockcanvas_storage::{SnapshotStore, StorageError};
use tracing::{debug, error, info, instrument, warn};

use crate::config::CanvasConfig;
use crate::error::NavigationError;
use crate::memory::{MemoryProbe, NoMemoryProbe};
use crate::persist::LayoutPersister;
use crate::session::{CanvasState, CanvasStatus, SessionSeed, SharedCanvas};
use crate::surface::Surface;

/// How a navigation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Adopted from the local snapshot
    Restored { items: usize },
    /// Fetched from the remote API
    Fetched {
        items: usize,
        /// 1-based numbers of pages that failed and were skipped
        failed_pages: Vec<usize>,
    },
    /// The key was already on screen and no refresh was asked for
    AlreadyCurrent,
    /// A newer navigation started before this one finished
    Superseded,
}

/// Callbacks for front ends that show navigation progress
pub trait NavigationObserver: Send + Sync {
    /// A page arrived: `loaded` of `total` items so far
    fn on_progress(&self, _key: &CollectionKey, _loaded: usize, _total: usize) {}

    /// A navigation finished successfully
    fn on_navigated(&self, _key: &CollectionKey, _outcome: &NavigationOutcome) {}
}

/// Owns the canvas and switches it between collections
///
/// Must be created inside a Tokio runtime; it spawns the layout persister.
pub struct NavigationController<A> {
    config: Arc<CanvasConfig>,
    store: Arc<dyn SnapshotStore>,
    fetcher: CollectionFetcher<A>,
    clock: Arc<dyn Clock>,
    persister: LayoutPersister,
    observer: Option<Arc<dyn NavigationObserver>>,
    pub(crate) canvas: SharedCanvas,
}

impl<A: CollectionApi> NavigationController<A> {
    pub fn new(
        config: CanvasConfig,
        store: Arc<dyn SnapshotStore>,
        api: A,
        surface: Box<dyn Surface>,
    ) -> Self {
        let config = Arc::new(config);
        let fetcher = CollectionFetcher::with_config(
            api,
            FetcherConfig {
                page_size: config.api.page_size,
                footprint: config.layout.footprint(),
                max_rotation: config.layout.max_scatter_rotation,
            },
        );
        let persister =
            LayoutPersister::spawn(Arc::clone(&store), config.interaction.persist_debounce());
        let canvas = CanvasState::shared(
            Arc::clone(&config),
            surface,
            Arc::new(NoMemoryProbe),
            persister.handle(),
            Viewport::default(),
        );

        Self {
            config,
            store,
            fetcher,
            clock: Arc::new(SystemClock),
            persister,
            observer: None,
            canvas,
        }
    }

    /// Use `clock` to judge snapshot freshness
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_memory_probe(self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.canvas.lock().probe = probe;
        self
    }

    pub fn with_viewport(self, viewport: Viewport) -> Self {
        self.canvas.lock().viewport = viewport;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn NavigationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Show the collection `key`
    ///
    /// Navigating to the collection already on screen does nothing unless
    /// `force_refresh` is set, which also skips the snapshot.
    #[instrument(skip_all, fields(collection = %key, force_refresh = force_refresh))]
    pub async fn navigate(
        &self,
        key: &CollectionKey,
        force_refresh: bool,
    ) -> Result<NavigationOutcome, NavigationError> {
        let generation = self.canvas.lock().begin_navigation(key, force_refresh);
        let Some(generation) = generation else {
            debug!("Collection already on screen");
            return Ok(NavigationOutcome::AlreadyCurrent);
        };

        let result = self.load(key, force_refresh, generation).await;
        self.canvas
            .lock()
            .finish_navigation(generation, result.is_ok());

        if let (Ok(outcome), Some(observer)) = (&result, &self.observer) {
            observer.on_navigated(key, outcome);
        }
        result
    }

    async fn load(
        &self,
        key: &CollectionKey,
        force_refresh: bool,
        generation: u64,
    ) -> Result<NavigationOutcome, NavigationError> {
        if !force_refresh {
            if let Some(seed) = self.read_snapshot(key).await {
                let count = seed.items.len();
                let title = seed.title.clone();
                if !self.canvas.lock().adopt(seed, generation) {
                    return Ok(NavigationOutcome::Superseded);
                }
                info!(target: "panel", count, "Restored {} items from cache", count);
                self.record_visit(key, title.as_deref()).await;
                return Ok(NavigationOutcome::Restored { items: count });
            }
        }

        let viewport = {
            let state = self.canvas.lock();
            if !state.is_current(generation) {
                return Ok(NavigationOutcome::Superseded);
            }
            state.viewport
        };

        let observer = self.observer.clone();
        let fetched = self
            .fetcher
            .fetch_all_items(key, viewport, |loaded, total| {
                if let Some(observer) = &observer {
                    observer.on_progress(key, loaded, total);
                }
            })
            .await;

        if fetched.is_empty() {
            error!(target: "panel", collection = %key, "No collection found for \"{}\"", key);
            return Err(NavigationError::NoCollectionFound(key.clone()));
        }

        let title = fetched.title().map(str::to_owned);
        let FetchedCollection {
            items,
            layout,
            order,
            failed_pages,
            ..
        } = fetched;
        let count = items.len();

        if let Err(e) = self
            .store
            .put(
                key,
                title.clone(),
                Some(items.clone()),
                layout.clone(),
                order.clone(),
            )
            .await
        {
            warn!(error = %e, "Failed to cache collection");
        }

        let seed = SessionSeed {
            key: key.clone(),
            title: title.clone(),
            items,
            layout,
            order,
        };
        if !self.canvas.lock().adopt(seed, generation) {
            return Ok(NavigationOutcome::Superseded);
        }
        self.record_visit(key, title.as_deref()).await;
        Ok(NavigationOutcome::Fetched {
            items: count,
            failed_pages,
        })
    }

    /// Restorable snapshot for `key`, tombstoning unusable records
    async fn read_snapshot(&self, key: &CollectionKey) -> Option<SessionSeed> {
        let snapshot = match self.store.get(key).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No cached snapshot");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Cache read failed, falling back to network");
                if matches!(e, StorageError::Deserialization(_)) {
                    self.invalidate(key).await;
                }
                return None;
            }
        };

        let now = self.clock.now_millis();
        match snapshot.check_restorable(now, self.config.cache.max_age()) {
            Ok(_) => {}
            Err(SnapshotRejection::Stale { age_millis }) => {
                debug!(age_millis, "Cached snapshot is stale");
                return None;
            }
            Err(rejection) => {
                warn!(%rejection, "Cached snapshot unusable, falling back to network");
                self.invalidate(key).await;
                return None;
            }
        }

        let order = snapshot.restored_order();
        let CollectionSnapshot {
            title,
            items,
            layout,
            ..
        } = snapshot;
        Some(SessionSeed {
            key: key.clone(),
            title,
            items: items.unwrap_or_default(),
            layout,
            order,
        })
    }

    async fn invalidate(&self, key: &CollectionKey) {
        if let Err(e) = self.store.invalidate(key).await {
            warn!(error = %e, "Failed to invalidate cached snapshot");
        }
    }

    async fn record_visit(&self, key: &CollectionKey, title: Option<&str>) {
        let title = title.unwrap_or(key.as_str());
        if let Err(e) = self.store.append_visit(key, title).await {
            warn!(error = %e, "Failed to record visit");
        }
    }

    /// Tear the canvas down and forget the current collection
    pub fn close(&self) {
        let mut state = self.canvas.lock();
        state.teardown();
        state.current_key = None;
    }

    /// Write pending layout changes now
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    pub async fn recent_visits(&self, limit: usize) -> Result<Vec<VisitRecord>, StorageError> {
        self.store.list_recent_visits(limit).await
    }

    pub fn status(&self) -> CanvasStatus {
        self.canvas.lock().status()
    }

    pub fn viewport(&self) -> Viewport {
        self.canvas.lock().viewport
    }

    /// Copy of the current layout
    pub fn layout(&self) -> LayoutMap {
        self.canvas
            .lock()
            .session
            .as_ref()
            .map(|session| session.layout.entries().clone())
            .unwrap_or_default()
    }

    /// Copy of the current display order
    pub fn display_order(&self) -> DisplayOrder {
        self.canvas
            .lock()
            .session
            .as_ref()
            .map(|session| session.layout.order().clone())
            .unwrap_or_default()
    }

    /// Visible item ids in load order
    pub fn visible_ids(&self) -> Vec<ItemId> {
        self.canvas
            .lock()
            .session
            .as_ref()
            .map(|session| session.scheduler.visible_ids())
            .unwrap_or_default()
    }

    pub fn item(&self, id: ItemId) -> Option<Item> {
        self.canvas
            .lock()
            .session
            .as_ref()
            .and_then(|session| session.items.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;
    impl NavigationObserver for Silent {}

    // Observers are stored as trait objects
    fn _assert_object_safe(_: &dyn NavigationObserver) {}

    #[test]
    fn test_default_observer_methods_are_no_ops() {
        let key = CollectionKey::new("arena").unwrap();
        Silent.on_progress(&key, 1, 2);
        Silent.on_navigated(&key, &NavigationOutcome::AlreadyCurrent);
    }
}
