//! Pointer and viewport interaction
//!
//! A press gives the item a temporary visual raise and starts a timer that
//! commits it. Starting a drag or activating twice commits right away.
//! Only a commit reorders the display order and persists it.

use blockcanvas_core::{Item, ItemId, Viewport};
use blockcanvas_fetch::CollectionApi;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::layout::TileMode;
use crate::navigation::NavigationController;
use crate::persist::Throttle;
use crate::session::CanvasState;

/// An item held by the pointer
#[derive(Debug, Clone)]
pub(crate) struct DragState {
    id: ItemId,
    origin: (f64, f64),
    grab_offset: (f64, f64),
    dragging: bool,
    throttle: Throttle,
}

impl CanvasState {
    pub(crate) fn press(&mut self, id: ItemId, x: f64, y: f64) -> bool {
        let throttle = Throttle::new(self.config.interaction.drag_throttle());
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.scheduler.is_visible(id) {
            return false;
        }
        let Some(entry) = session.layout.get(id) else {
            return false;
        };
        session.drag = Some(DragState {
            id,
            origin: (x, y),
            grab_offset: (x - entry.x, y - entry.y),
            dragging: false,
            throttle,
        });
        self.temporary_raise(id);
        true
    }

    /// Boost `id` visually and schedule the commit
    ///
    /// No-op while a raise of the same item is already pending.
    fn temporary_raise(&mut self, id: ItemId) {
        let delay = self.config.interaction.raise_commit_delay();
        let this = self.this.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(item) = session.scheduler.materialized(id) else {
            return;
        };
        if item.is_temporarily_raised() {
            return;
        }
        if let Err(e) = self.surface.set_temporarily_raised(item.element, true) {
            warn!(item = %id, error = %e, "Failed to raise element");
        }

        let generation = session.generation;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(canvas) = this.upgrade() {
                let mut state = canvas.lock();
                if state.is_current(generation) {
                    state.commit_raise(id);
                }
            }
        });
        session.scheduler.set_raise_timer(id, timer.abort_handle());
    }

    /// Move `id` to the top of the stack for good
    ///
    /// Returns `true` when the display order changed.
    pub(crate) fn commit_raise(&mut self, id: ItemId) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if let Some(element) = session.scheduler.clear_raise(id) {
            if let Err(e) = self.surface.set_temporarily_raised(element, false) {
                warn!(item = %id, error = %e, "Failed to lower element");
            }
        }
        let changed = session.layout.raise_to_top(id);
        if changed {
            session
                .scheduler
                .restack(self.surface.as_mut(), &session.layout);
            debug!(item = %id, "Raise committed");
            self.persist_layout();
        }
        changed
    }

    pub(crate) fn drag_move(&mut self, x: f64, y: f64) -> bool {
        let threshold = self.config.interaction.drag_threshold_px;
        let Some(drag) = self
            .session
            .as_mut()
            .and_then(|session| session.drag.as_mut())
        else {
            return false;
        };
        let id = drag.id;
        if !drag.dragging {
            if (x - drag.origin.0).hypot(y - drag.origin.1) < threshold {
                return false;
            }
            drag.dragging = true;
            debug!(item = %id, "Drag started");
            self.commit_raise(id);
        }

        let throttled = self
            .session
            .as_mut()
            .and_then(|session| session.drag.as_mut())
            .is_some_and(|drag| !drag.throttle.ready(Instant::now()));
        if throttled {
            return false;
        }
        self.place_dragged(id, x, y)
    }

    /// Put the held item under the pointer at `(x, y)`, clamped to the viewport
    fn place_dragged(&mut self, id: ItemId, x: f64, y: f64) -> bool {
        let bounds = self.viewport.clamp_bounds(self.footprint_of(id));
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let (Some(drag), Some(entry)) = (session.drag.as_ref(), session.layout.get(id)) else {
            return false;
        };
        let (nx, ny) = bounds.clamp(x - drag.grab_offset.0, y - drag.grab_offset.1);
        let moved = entry.moved_to(nx, ny);
        session.layout.set(id, moved);
        if let Some(element) = session.scheduler.element(id) {
            if let Err(e) = self.surface.update_transform(element, &moved) {
                warn!(item = %id, error = %e, "Failed to move element");
            }
        }
        true
    }

    /// Release the pointer at `(x, y)`, persisting if a drag happened
    ///
    /// The release position is applied even inside the throttle window.
    pub(crate) fn drag_end(&mut self, x: f64, y: f64) -> bool {
        let dragged = self
            .session
            .as_ref()
            .and_then(|session| session.drag.as_ref())
            .filter(|drag| drag.dragging)
            .map(|drag| drag.id);
        if let Some(id) = dragged {
            self.place_dragged(id, x, y);
        }
        if let Some(session) = self.session.as_mut() {
            session.drag = None;
        }
        if dragged.is_some() {
            self.persist_layout();
        }
        dragged.is_some()
    }

    pub(crate) fn double_activate(&mut self, id: ItemId) -> Option<Item> {
        let item = self
            .session
            .as_ref()
            .filter(|session| session.scheduler.is_visible(id))
            .and_then(|session| session.items.get(&id).cloned())?;
        self.commit_raise(id);
        Some(item)
    }

    pub(crate) fn rotate(&mut self, id: ItemId, wheel_delta: f64) -> bool {
        if wheel_delta == 0.0 || !wheel_delta.is_finite() {
            return false;
        }
        let step = self.config.layout.rotation_step_degrees * wheel_delta.signum();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(entry) = session.layout.get(id) else {
            return false;
        };
        session.layout.set(id, entry.rotated_by(step));
        self.apply_transforms(&[id]);
        self.persist_layout();
        true
    }

    pub(crate) fn tile(&mut self) -> usize {
        let viewport = self.viewport;
        let layout_config = &self.config.layout;
        let Some(session) = self.session.as_mut() else {
            return 0;
        };
        let ids = session.scheduler.visible_ids();
        session.layout.tile(
            &ids,
            &viewport,
            layout_config.footprint(),
            layout_config.tile_jitter_ratio,
            &mut rand::rng(),
        );
        self.apply_transforms(&ids);
        self.persist_layout();
        ids.len()
    }

    pub(crate) fn shuffle(&mut self) -> usize {
        let layout_config = &self.config.layout;
        let bounds = self.viewport.placement_bounds(layout_config.footprint());
        let Some(session) = self.session.as_mut() else {
            return 0;
        };
        let ids = session.scheduler.visible_ids();
        session.layout.shuffle(
            &ids,
            &bounds,
            layout_config.max_scatter_rotation,
            &mut rand::rng(),
        );
        self.apply_transforms(&ids);
        self.persist_layout();
        ids.len()
    }

    pub(crate) fn toggle_tile(&mut self) -> TileMode {
        let mode = self
            .session
            .as_ref()
            .map_or(TileMode::Scattered, |session| session.layout.mode());
        match mode {
            TileMode::Scattered => self.tile(),
            TileMode::Tiled => self.shuffle(),
        };
        self.session
            .as_ref()
            .map_or(TileMode::Scattered, |session| session.layout.mode())
    }

    /// Record a new viewport size, re-clamping at most once per throttle
    /// window plus once at its trailing edge
    pub(crate) fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let now = Instant::now();
        if self.resize_throttle.ready(now) {
            self.apply_resize();
            return;
        }
        if self
            .resize_trailing
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }

        let wait = self.resize_throttle.remaining(now);
        let this = self.this.clone();
        self.resize_trailing = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(canvas) = this.upgrade() {
                let mut state = canvas.lock();
                state.resize_throttle.mark(Instant::now());
                state.apply_resize();
            }
        }));
    }

    fn apply_resize(&mut self) {
        let default_footprint = self.config.layout.footprint();
        let surface = self.surface.as_ref();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let scheduler = &session.scheduler;
        let changed = session.layout.clamp_all_to_viewport(&self.viewport, |id| {
            scheduler
                .element(id)
                .and_then(|element| surface.footprint(element))
                .unwrap_or(default_footprint)
        });

        debug!(
            width = self.viewport.width,
            height = self.viewport.height,
            clamped = changed.len(),
            "Viewport resized"
        );
        self.apply_transforms(&changed);
        self.restore_in_range();
        if !changed.is_empty() {
            self.persist_layout();
        }
    }

    pub(crate) fn scroll_to(&mut self, x: f64, y: f64) -> Vec<ItemId> {
        self.viewport = self.viewport.with_scroll(x, y);
        self.restore_in_range()
    }

    /// Push layout entries of `ids` to their elements
    fn apply_transforms(&mut self, ids: &[ItemId]) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        for id in ids {
            let (Some(element), Some(entry)) =
                (session.scheduler.element(*id), session.layout.get(*id))
            else {
                continue;
            };
            if let Err(e) = self.surface.update_transform(element, &entry) {
                warn!(item = %id, error = %e, "Failed to update element");
            }
        }
    }
}

impl<A: CollectionApi> NavigationController<A> {
    /// Pointer down on an item at canvas position `(x, y)`
    ///
    /// Returns `false` if the item is not on screen.
    pub fn press(&self, id: ItemId, x: f64, y: f64) -> bool {
        self.canvas.lock().press(id, x, y)
    }

    /// Pointer moved while pressed; returns `true` if the item moved
    pub fn drag_move(&self, x: f64, y: f64) -> bool {
        self.canvas.lock().drag_move(x, y)
    }

    /// Pointer released at `(x, y)`; returns `true` if it ended a drag
    pub fn drag_end(&self, x: f64, y: f64) -> bool {
        self.canvas.lock().drag_end(x, y)
    }

    /// Second activation within the raise delay: commit and open the item
    pub fn double_activate(&self, id: ItemId) -> Option<Item> {
        self.canvas.lock().double_activate(id)
    }

    /// Commit any pending raise of `id` now
    pub fn commit_raise(&self, id: ItemId) -> bool {
        self.canvas.lock().commit_raise(id)
    }

    /// Rotate by one step in the direction of `wheel_delta`
    pub fn rotate(&self, id: ItemId, wheel_delta: f64) -> bool {
        self.canvas.lock().rotate(id, wheel_delta)
    }

    /// Arrange visible items in a grid
    pub fn tile(&self) -> usize {
        self.canvas.lock().tile()
    }

    /// Scatter visible items again
    pub fn shuffle(&self) -> usize {
        self.canvas.lock().shuffle()
    }

    /// Tile when scattered, shuffle when tiled; returns the new mode
    pub fn toggle_tile(&self) -> TileMode {
        self.canvas.lock().toggle_tile()
    }

    pub fn resize(&self, viewport: Viewport) {
        self.canvas.lock().resize(viewport);
    }

    /// Scroll the viewport, restoring evicted items that come into range
    pub fn scroll_to(&self, x: f64, y: f64) -> Vec<ItemId> {
        self.canvas.lock().scroll_to(x, y)
    }

    /// Raise the render ceiling by one step and resume loading
    pub fn override_limit(&self) -> Option<usize> {
        self.canvas.lock().override_limit()
    }

    /// Run one memory-pressure eviction pass now
    pub fn relieve_memory_pressure(&self) -> Vec<ItemId> {
        self.canvas.lock().relieve_memory_pressure()
    }
}
