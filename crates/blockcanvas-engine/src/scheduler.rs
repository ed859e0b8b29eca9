//! Progressive Render Scheduler
//!
//! Materializes a collection a batch at a time so a large collection never
//! blocks the canvas. The scheduler owns a side-table of everything a
//! visible item holds on to (element, lazy-load observer, pending raise
//! timer) and releases it on eviction and teardown.
//!
//! ## State machine
//!
//! ```text
//! Idle --tick--> LoadingBatch --+--> Idle
//!   |                           +--> Exhausted
//!   +--ceiling reached--> LimitReached --override--> Idle
//! ```

use std::collections::{BTreeSet, HashMap};

use blockcanvas_core::{Footprint, Item, ItemId, Rect, Viewport};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::config::{CeilingPolicy, DeviceProfile, SchedulerConfig};
use crate::layout::LayoutState;
use crate::surface::{ElementHandle, Materialized, ObserverHandle, Surface};

/// Scheduler states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Idle,
    LoadingBatch,
    /// Every item of the load sequence has been attempted
    Exhausted,
    /// The render ceiling stopped loading until an override
    LimitReached,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A batch was already in progress
    Skipped,
    /// Items materialized this tick, more remain
    Materialized(usize),
    /// Items materialized this tick, nothing remains
    Exhausted(usize),
    /// No room under the ceiling
    LimitReached,
}

impl TickOutcome {
    /// True when the recurring tick should stop
    pub fn is_terminal(&self) -> bool {
        matches!(self, TickOutcome::Exhausted(_) | TickOutcome::LimitReached)
    }
}

/// Limits a scheduler runs under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub batch_size: usize,
    /// `None` for unlimited
    pub ceiling: Option<usize>,
    pub post_override_ceiling: Option<usize>,
    pub override_step: usize,
    pub policy: CeilingPolicy,
}

impl SchedulerSettings {
    pub fn new(scheduler: &SchedulerConfig, profile: &DeviceProfile) -> Self {
        Self {
            batch_size: scheduler.batch_size,
            ceiling: profile.max_concurrent_items,
            post_override_ceiling: profile.max_concurrent_items_after_override,
            override_step: profile.override_step,
            policy: scheduler.ceiling_policy,
        }
    }

    /// Settings without a ceiling
    pub fn unlimited(batch_size: usize) -> Self {
        Self {
            batch_size,
            ceiling: None,
            post_override_ceiling: None,
            override_step: 0,
            policy: CeilingPolicy::WholeBatches,
        }
    }

    pub fn with_ceiling(mut self, ceiling: usize, step: usize, post_override: usize) -> Self {
        self.ceiling = Some(ceiling);
        self.override_step = step;
        self.post_override_ceiling = Some(post_override);
        self
    }

    pub fn with_policy(mut self, policy: CeilingPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Resources held by one visible item
#[derive(Debug)]
pub struct MaterializedItem {
    pub element: ElementHandle,
    pub observer: Option<ObserverHandle>,
    raise_timer: Option<AbortHandle>,
    temporarily_raised: bool,
}

impl MaterializedItem {
    fn new(materialized: Materialized) -> Self {
        Self {
            element: materialized.element,
            observer: materialized.observer,
            raise_timer: None,
            temporarily_raised: false,
        }
    }

    pub fn is_temporarily_raised(&self) -> bool {
        self.temporarily_raised
    }
}

/// Batch materialization of one collection
#[derive(Debug)]
pub struct RenderScheduler {
    settings: SchedulerSettings,
    state: SchedulerState,
    /// Display order captured when the session started
    load_sequence: Vec<ItemId>,
    displayed_count: usize,
    visible: HashMap<ItemId, MaterializedItem>,
    evicted: BTreeSet<ItemId>,
}

impl RenderScheduler {
    pub fn new(settings: SchedulerSettings, load_sequence: Vec<ItemId>) -> Self {
        Self {
            settings,
            state: SchedulerState::Idle,
            load_sequence,
            displayed_count: 0,
            visible: HashMap::new(),
            evicted: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn ceiling(&self) -> Option<usize> {
        self.settings.ceiling
    }

    pub fn displayed_count(&self) -> usize {
        self.displayed_count
    }

    pub fn total(&self) -> usize {
        self.load_sequence.len()
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn is_visible(&self, id: ItemId) -> bool {
        self.visible.contains_key(&id)
    }

    pub fn evicted_count(&self) -> usize {
        self.evicted.len()
    }

    /// Visible ids in load order
    pub fn visible_ids(&self) -> Vec<ItemId> {
        self.load_sequence
            .iter()
            .filter(|id| self.visible.contains_key(id))
            .copied()
            .collect()
    }

    pub fn element(&self, id: ItemId) -> Option<ElementHandle> {
        self.visible.get(&id).map(|item| item.element)
    }

    pub fn materialized(&self, id: ItemId) -> Option<&MaterializedItem> {
        self.visible.get(&id)
    }

    /// How many items the next batch may attempt
    fn allowance(&self) -> usize {
        let remaining = self.load_sequence.len().saturating_sub(self.displayed_count);
        let batch = self.settings.batch_size.min(remaining);
        let Some(ceiling) = self.settings.ceiling else {
            return batch;
        };
        let visible = self.visible.len();
        match self.settings.policy {
            CeilingPolicy::WholeBatches if visible + batch <= ceiling => batch,
            CeilingPolicy::WholeBatches => 0,
            CeilingPolicy::FillToCeiling => batch.min(ceiling.saturating_sub(visible)),
            CeilingPolicy::CheckBeforeBatch if visible < ceiling => batch,
            CeilingPolicy::CheckBeforeBatch => 0,
        }
    }

    /// Materialize the next batch
    ///
    /// Ids that are already visible are skipped but still count toward the
    /// batch window. A failed item is logged and the batch continues.
    pub fn tick(
        &mut self,
        surface: &mut dyn Surface,
        items: &HashMap<ItemId, Item>,
        layout: &LayoutState,
    ) -> TickOutcome {
        match self.state {
            SchedulerState::LoadingBatch => return TickOutcome::Skipped,
            SchedulerState::Exhausted => return TickOutcome::Exhausted(0),
            SchedulerState::LimitReached => return TickOutcome::LimitReached,
            SchedulerState::Idle => {}
        }

        let total = self.load_sequence.len();
        if self.displayed_count >= total {
            self.state = SchedulerState::Exhausted;
            return TickOutcome::Exhausted(0);
        }

        let allowance = self.allowance();
        if allowance == 0 {
            debug!(
                visible = self.visible.len(),
                ceiling = ?self.settings.ceiling,
                "Render ceiling reached"
            );
            self.state = SchedulerState::LimitReached;
            return TickOutcome::LimitReached;
        }

        self.state = SchedulerState::LoadingBatch;
        let start = self.displayed_count;
        let end = (start + allowance).min(total);
        let mut materialized = 0;

        for index in start..end {
            let id = self.load_sequence[index];
            if self.visible.contains_key(&id) {
                continue;
            }
            if self.materialize_one(surface, id, items, layout) {
                materialized += 1;
            }
        }

        self.displayed_count = end;
        debug!(materialized, displayed = end, total, "Batch complete");

        if end >= total {
            self.state = SchedulerState::Exhausted;
            TickOutcome::Exhausted(materialized)
        } else {
            self.state = SchedulerState::Idle;
            TickOutcome::Materialized(materialized)
        }
    }

    fn materialize_one(
        &mut self,
        surface: &mut dyn Surface,
        id: ItemId,
        items: &HashMap<ItemId, Item>,
        layout: &LayoutState,
    ) -> bool {
        let (Some(item), Some(entry)) = (items.get(&id), layout.get(id)) else {
            warn!(item = %id, "No item or layout entry to materialize");
            return false;
        };
        let z_index = layout.z_index(id).unwrap_or_default();
        match surface.materialize(item, &entry, z_index) {
            Ok(materialized) => {
                self.visible.insert(id, MaterializedItem::new(materialized));
                self.evicted.remove(&id);
                true
            }
            Err(e) => {
                warn!(item = %id, error = %e, "Failed to materialize item");
                false
            }
        }
    }

    /// Raise the ceiling by one override step
    ///
    /// Returns the new ceiling, or `None` when there is no ceiling or it is
    /// already at its post-override maximum.
    pub fn override_limit(&mut self) -> Option<usize> {
        let ceiling = self.settings.ceiling?;
        let max = self.settings.post_override_ceiling.unwrap_or(ceiling);
        let raised = (ceiling + self.settings.override_step).min(max);
        if raised <= ceiling {
            return None;
        }
        self.settings.ceiling = Some(raised);
        if self.state == SchedulerState::LimitReached {
            self.state = SchedulerState::Idle;
        }
        Some(raised)
    }

    /// Release the resources of one visible item
    pub fn release(&mut self, surface: &mut dyn Surface, id: ItemId) -> bool {
        let Some(item) = self.visible.remove(&id) else {
            return false;
        };
        if let Some(timer) = item.raise_timer {
            timer.abort();
        }
        if let Some(observer) = item.observer {
            surface.disconnect(observer);
        }
        if let Err(e) = surface.remove(item.element) {
            warn!(item = %id, error = %e, "Failed to remove element");
        }
        true
    }

    /// Evict up to `max` visible items lying entirely outside the viewport
    /// expanded by `margin`
    ///
    /// Evicted items may come back through [`restore_in_range`](Self::restore_in_range).
    pub fn evict_offscreen(
        &mut self,
        surface: &mut dyn Surface,
        viewport: &Viewport,
        margin: f64,
        max: usize,
    ) -> Vec<ItemId> {
        let area = viewport.rect().expand(margin);
        let candidates: Vec<ItemId> = self
            .load_sequence
            .iter()
            .filter_map(|id| self.visible.get(id).map(|item| (*id, item.element)))
            .filter(|(_, element)| {
                surface
                    .bounding_box(*element)
                    .is_some_and(|bbox| bbox.is_entirely_outside(&area))
            })
            .map(|(id, _)| id)
            .take(max)
            .collect();

        for id in &candidates {
            self.release(surface, *id);
            self.evicted.insert(*id);
        }
        candidates
    }

    /// Re-materialize evicted items whose layout is back within the
    /// viewport expanded by `margin`, as far as the ceiling allows
    pub fn restore_in_range(
        &mut self,
        surface: &mut dyn Surface,
        items: &HashMap<ItemId, Item>,
        layout: &LayoutState,
        viewport: &Viewport,
        margin: f64,
        footprint: Footprint,
    ) -> Vec<ItemId> {
        let area = viewport.rect().expand(margin);
        let candidates: Vec<ItemId> = self
            .load_sequence
            .iter()
            .filter(|id| self.evicted.contains(id))
            .filter(|id| {
                layout.get(**id).is_some_and(|entry| {
                    Rect::from_origin(entry.x, entry.y, footprint).intersects(&area)
                })
            })
            .copied()
            .collect();

        let mut restored = Vec::new();
        for id in candidates {
            if self
                .settings
                .ceiling
                .is_some_and(|ceiling| self.visible.len() >= ceiling)
            {
                break;
            }
            if self.materialize_one(surface, id, items, layout) {
                restored.push(id);
            }
        }
        restored
    }

    /// Apply committed stacking positions to every visible element
    pub fn restack(&self, surface: &mut dyn Surface, layout: &LayoutState) {
        for (id, item) in &self.visible {
            let Some(z_index) = layout.z_index(*id) else {
                continue;
            };
            if let Err(e) = surface.set_z_index(item.element, z_index) {
                warn!(item = %id, error = %e, "Failed to restack element");
            }
        }
    }

    /// Attach a pending auto-commit timer, aborting any previous one
    pub fn set_raise_timer(&mut self, id: ItemId, timer: AbortHandle) {
        if let Some(item) = self.visible.get_mut(&id) {
            item.temporarily_raised = true;
            if let Some(previous) = item.raise_timer.replace(timer) {
                previous.abort();
            }
        } else {
            timer.abort();
        }
    }

    /// Clear the pending raise of `id`
    ///
    /// Returns the element if it was temporarily raised.
    pub fn clear_raise(&mut self, id: ItemId) -> Option<ElementHandle> {
        let item = self.visible.get_mut(&id)?;
        if let Some(timer) = item.raise_timer.take() {
            timer.abort();
        }
        std::mem::take(&mut item.temporarily_raised).then_some(item.element)
    }

    /// Release every visible item and forget evictions
    pub fn release_all(&mut self, surface: &mut dyn Surface) {
        let ids: Vec<ItemId> = self.visible.keys().copied().collect();
        for id in ids {
            self.release(surface, id);
        }
        self.evicted.clear();
    }
}
