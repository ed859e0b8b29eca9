//! The remote collection API seam

use async_trait::async_trait;
use blockcanvas_core::{CollectionKey, Item};

use crate::error::FetchError;

/// Collection metadata needed to plan pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMeta {
    pub item_count: usize,
    pub title: Option<String>,
}

impl CollectionMeta {
    pub fn new(item_count: usize, title: Option<String>) -> Self {
        Self { item_count, title }
    }

    /// Number of pages of `page_size` items
    pub fn page_count(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        self.item_count.div_ceil(page_size)
    }
}

/// Remote source of collections
///
/// Pages are 1-based. Implementations must be usable from many concurrent
/// requests at once.
#[async_trait]
pub trait CollectionApi: Send + Sync {
    /// Fetch the collection's metadata
    async fn collection_meta(&self, key: &CollectionKey) -> Result<CollectionMeta, FetchError>;

    /// Fetch one page of items
    async fn items_page(
        &self,
        key: &CollectionKey,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Item>, FetchError>;
}

#[async_trait]
impl<T: CollectionApi + ?Sized> CollectionApi for std::sync::Arc<T> {
    async fn collection_meta(&self, key: &CollectionKey) -> Result<CollectionMeta, FetchError> {
        (**self).collection_meta(key).await
    }

    async fn items_page(
        &self,
        key: &CollectionKey,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Item>, FetchError> {
        (**self).items_page(key, page, per_page).await
    }
}
