//! The rendering seam
//!
//! A [`Surface`] owns the visual elements the canvas materializes. The
//! engine never touches elements directly; it holds the opaque handles the
//! surface hands out and gives them back for every later change.

use std::fmt;

use blockcanvas_core::{Footprint, Item, LayoutEntry, Rect};

use crate::error::SurfaceError;

/// Opaque handle to a materialized element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Opaque handle to a lazy-load observer attached to an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverHandle(pub u64);

/// Handles produced by materializing one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Materialized {
    pub element: ElementHandle,
    /// Present when the surface deferred loading media until visible
    pub observer: Option<ObserverHandle>,
}

/// Where items become visible
///
/// Implementations are driven from inside the canvas lock, so every call
/// must return promptly.
pub trait Surface: Send {
    /// Build an element for `item` with the given transform and stacking
    fn materialize(
        &mut self,
        item: &Item,
        entry: &LayoutEntry,
        z_index: usize,
    ) -> Result<Materialized, SurfaceError>;

    /// Apply a new translation and rotation
    fn update_transform(
        &mut self,
        element: ElementHandle,
        entry: &LayoutEntry,
    ) -> Result<(), SurfaceError>;

    /// Apply a committed stacking position
    fn set_z_index(&mut self, element: ElementHandle, z_index: usize) -> Result<(), SurfaceError>;

    /// Toggle the visual z-boost shown while a raise is pending
    fn set_temporarily_raised(
        &mut self,
        element: ElementHandle,
        raised: bool,
    ) -> Result<(), SurfaceError>;

    /// Destroy an element
    fn remove(&mut self, element: ElementHandle) -> Result<(), SurfaceError>;

    /// Current bounding box in canvas coordinates
    fn bounding_box(&self, element: ElementHandle) -> Option<Rect>;

    /// Measured size of an element, `None` until it has been laid out
    fn footprint(&self, element: ElementHandle) -> Option<Footprint>;

    /// Stop a lazy-load observer
    fn disconnect(&mut self, observer: ObserverHandle);
}
