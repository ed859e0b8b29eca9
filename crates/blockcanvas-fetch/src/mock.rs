//! Scripted in-memory [`CollectionApi`]
//!
//! Serves fixed collections and lets tests fail or delay individual pages.
//! Request counters make it possible to assert how much network traffic a
//! navigation caused.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use blockcanvas_core::{CollectionKey, Item};
use parking_lot::Mutex;

use crate::api::{CollectionApi, CollectionMeta};
use crate::error::FetchError;

#[derive(Debug, Clone)]
struct MockCollection {
    title: Option<String>,
    items: Vec<Item>,
}

/// In-memory API with controllable failures and latency
#[derive(Debug, Default)]
pub struct MockCollectionApi {
    collections: Mutex<HashMap<CollectionKey, MockCollection>>,
    failing_pages: Mutex<HashSet<usize>>,
    page_delays: Mutex<HashMap<usize, Duration>>,
    meta_fails: AtomicBool,
    meta_calls: AtomicUsize,
    page_calls: AtomicUsize,
}

impl MockCollectionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `items` for `key`
    pub fn with_collection(self, key: &str, title: &str, items: Vec<Item>) -> Self {
        self.set_collection(key, title, items);
        self
    }

    /// Make every request for `page` fail
    pub fn with_failing_page(self, page: usize) -> Self {
        self.failing_pages.lock().insert(page);
        self
    }

    /// Delay every response for `page`
    pub fn with_page_delay(self, page: usize, delay: Duration) -> Self {
        self.page_delays.lock().insert(page, delay);
        self
    }

    /// Replace the collection served for `key`
    pub fn set_collection(&self, key: &str, title: &str, items: Vec<Item>) {
        if let Ok(key) = CollectionKey::new(key) {
            self.collections.lock().insert(
                key,
                MockCollection {
                    title: Some(title.to_string()),
                    items,
                },
            );
        }
    }

    /// Toggle metadata failures
    pub fn set_meta_fails(&self, fails: bool) {
        self.meta_fails.store(fails, Ordering::SeqCst);
    }

    pub fn meta_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.meta_calls.store(0, Ordering::SeqCst);
        self.page_calls.store(0, Ordering::SeqCst);
    }

    fn lookup(&self, key: &CollectionKey) -> Result<MockCollection, FetchError> {
        self.collections
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: format!("mock://channels/{key}"),
            })
    }
}

#[async_trait]
impl CollectionApi for MockCollectionApi {
    async fn collection_meta(&self, key: &CollectionKey) -> Result<CollectionMeta, FetchError> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        if self.meta_fails.load(Ordering::SeqCst) {
            return Err(FetchError::transport("metadata unavailable"));
        }
        let collection = self.lookup(key)?;
        Ok(CollectionMeta::new(collection.items.len(), collection.title))
    }

    async fn items_page(
        &self,
        key: &CollectionKey,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Item>, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.page_delays.lock().get(&page).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_pages.lock().contains(&page) {
            return Err(FetchError::Status {
                status: 500,
                url: format!("mock://channels/{key}/contents?page={page}"),
            });
        }

        let collection = self.lookup(key)?;
        let start = page.saturating_sub(1) * per_page;
        Ok(collection
            .items
            .into_iter()
            .skip(start)
            .take(per_page)
            .collect())
    }
}
