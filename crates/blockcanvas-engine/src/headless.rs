//! A surface that keeps elements in memory
//!
//! Used by the command-line front end and by tests. Clones share the same
//! element table, so a test can keep one clone for inspection while the
//! canvas drives the other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use blockcanvas_core::{Footprint, Item, ItemContent, ItemId, LayoutEntry, Rect};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::SurfaceError;
use crate::surface::{ElementHandle, Materialized, ObserverHandle, Surface};

/// One element held by a [`HeadlessSurface`]
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessElement {
    pub item: ItemId,
    pub entry: LayoutEntry,
    pub z_index: usize,
    pub temporarily_raised: bool,
    pub observer: Option<ObserverHandle>,
}

#[derive(Debug, Default)]
struct Inner {
    next_handle: u64,
    elements: HashMap<ElementHandle, HeadlessElement>,
    observers: HashSet<ObserverHandle>,
    failing: HashSet<ItemId>,
    footprint: Footprint,
    materialize_calls: usize,
}

/// In-memory [`Surface`]
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    inner: Arc<Mutex<Inner>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every element with this size
    pub fn with_footprint(self, footprint: Footprint) -> Self {
        self.inner.lock().footprint = footprint;
        self
    }

    /// Refuse to materialize the given item
    pub fn fail_item(&self, id: ItemId) {
        self.inner.lock().failing.insert(id);
    }

    pub fn element_count(&self) -> usize {
        self.inner.lock().elements.len()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }

    /// Total materialize calls, including rejected ones
    pub fn materialize_calls(&self) -> usize {
        self.inner.lock().materialize_calls
    }

    /// Ids of every live element, sorted
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .inner
            .lock()
            .elements
            .values()
            .map(|element| element.item)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Element currently showing `id`
    pub fn element_for(&self, id: ItemId) -> Option<HeadlessElement> {
        self.inner
            .lock()
            .elements
            .values()
            .find(|element| element.item == id)
            .cloned()
    }

    fn with_element<T>(
        &self,
        element: ElementHandle,
        f: impl FnOnce(&mut HeadlessElement) -> T,
    ) -> Result<T, SurfaceError> {
        let mut inner = self.inner.lock();
        inner
            .elements
            .get_mut(&element)
            .map(f)
            .ok_or(SurfaceError::UnknownElement(element))
    }
}

fn defers_media(item: &Item) -> bool {
    match &item.content {
        ItemContent::Image { .. } => true,
        ItemContent::Link { images, .. } => images.is_some(),
        _ => false,
    }
}

impl Surface for HeadlessSurface {
    fn materialize(
        &mut self,
        item: &Item,
        entry: &LayoutEntry,
        z_index: usize,
    ) -> Result<Materialized, SurfaceError> {
        let mut inner = self.inner.lock();
        inner.materialize_calls += 1;
        if inner.failing.contains(&item.id) {
            return Err(SurfaceError::Rejected {
                item: item.id,
                reason: "scripted failure".into(),
            });
        }

        inner.next_handle += 1;
        let element = ElementHandle(inner.next_handle);
        let observer = defers_media(item).then(|| {
            let handle = ObserverHandle(inner.next_handle);
            inner.observers.insert(handle);
            handle
        });

        inner.elements.insert(
            element,
            HeadlessElement {
                item: item.id,
                entry: *entry,
                z_index,
                temporarily_raised: false,
                observer,
            },
        );
        trace!(item = %item.id, %element, "Materialized");
        Ok(Materialized { element, observer })
    }

    fn update_transform(
        &mut self,
        element: ElementHandle,
        entry: &LayoutEntry,
    ) -> Result<(), SurfaceError> {
        self.with_element(element, |el| el.entry = *entry)
    }

    fn set_z_index(&mut self, element: ElementHandle, z_index: usize) -> Result<(), SurfaceError> {
        self.with_element(element, |el| el.z_index = z_index)
    }

    fn set_temporarily_raised(
        &mut self,
        element: ElementHandle,
        raised: bool,
    ) -> Result<(), SurfaceError> {
        self.with_element(element, |el| el.temporarily_raised = raised)
    }

    fn remove(&mut self, element: ElementHandle) -> Result<(), SurfaceError> {
        self.inner
            .lock()
            .elements
            .remove(&element)
            .map(|_| ())
            .ok_or(SurfaceError::UnknownElement(element))
    }

    fn bounding_box(&self, element: ElementHandle) -> Option<Rect> {
        let inner = self.inner.lock();
        let el = inner.elements.get(&element)?;
        Some(Rect::from_origin(el.entry.x, el.entry.y, inner.footprint))
    }

    fn footprint(&self, element: ElementHandle) -> Option<Footprint> {
        let inner = self.inner.lock();
        inner
            .elements
            .contains_key(&element)
            .then_some(inner.footprint)
    }

    fn disconnect(&mut self, observer: ObserverHandle) {
        self.inner.lock().observers.remove(&observer);
    }
}
