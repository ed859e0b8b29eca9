//! Collection context injection
//!
//! Thread-local storage for the collection being shown, so every span
//! opened within a scope can be tagged with it.

use std::cell::RefCell;

use uuid::Uuid;

/// Collection context stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionContextData {
    /// Key of the collection on screen
    pub collection: String,
    /// Unique id of this browsing session
    pub session_id: Uuid,
}

thread_local! {
    static COLLECTION_CONTEXT: RefCell<Option<CollectionContextData>> = const { RefCell::new(None) };
}

/// RAII guard for collection context
///
/// Sets the collection for the current thread; dropping it restores the
/// previous context, if any.
///
/// ```ignore
/// use blockcanvas_logging::CollectionContextGuard;
///
/// let _guard = CollectionContextGuard::new("ephemeral-visions");
/// tracing::info!("Loading batch");
/// ```
pub struct CollectionContextGuard {
    previous: Option<CollectionContextData>,
}

impl CollectionContextGuard {
    pub fn new(collection: impl Into<String>) -> Self {
        Self::with_session_id(collection, Uuid::new_v4())
    }

    /// Keep a known session id, e.g. one read back from a previous run
    pub fn with_session_id(collection: impl Into<String>, session_id: Uuid) -> Self {
        let next = CollectionContextData {
            collection: collection.into(),
            session_id,
        };
        let previous = COLLECTION_CONTEXT.with(|ctx| ctx.borrow_mut().replace(next));
        Self { previous }
    }

    pub fn current() -> Option<CollectionContextData> {
        COLLECTION_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_collection() -> Option<String> {
        Self::current().map(|ctx| ctx.collection)
    }
}

impl Drop for CollectionContextGuard {
    fn drop(&mut self) {
        COLLECTION_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a collection context set
///
/// ```ignore
/// with_collection_context!("arena", {
///     tracing::info!("Loading batch");
/// });
/// ```
#[macro_export]
macro_rules! with_collection_context {
    ($collection:expr, $body:block) => {{
        let _guard = $crate::context::CollectionContextGuard::new($collection);
        $body
    }};
}
