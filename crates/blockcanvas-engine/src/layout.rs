//! Layout State
//!
//! Positions, rotations and stacking of the current collection. All methods
//! are synchronous; callers decide when a change is worth persisting.

use blockcanvas_core::{
    Bounds, DisplayOrder, Footprint, Item, ItemId, LayoutEntry, LayoutMap, Viewport,
};
use blockcanvas_fetch::random_entry;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Whether the tiles are scattered or arranged in a grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileMode {
    #[default]
    Scattered,
    Tiled,
}

impl TileMode {
    pub fn toggled(self) -> Self {
        match self {
            TileMode::Scattered => TileMode::Tiled,
            TileMode::Tiled => TileMode::Scattered,
        }
    }
}

/// Layout entries, display order and tile mode of one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutState {
    entries: LayoutMap,
    order: DisplayOrder,
    mode: TileMode,
}

impl LayoutState {
    pub fn new(entries: LayoutMap, order: DisplayOrder) -> Self {
        Self {
            entries,
            order,
            mode: TileMode::Scattered,
        }
    }

    pub fn get(&self, id: ItemId) -> Option<LayoutEntry> {
        self.entries.get(&id).copied()
    }

    pub fn set(&mut self, id: ItemId, entry: LayoutEntry) {
        self.entries.insert(id, entry);
    }

    pub fn entries(&self) -> &LayoutMap {
        &self.entries
    }

    pub fn order(&self) -> &DisplayOrder {
        &self.order
    }

    pub fn mode(&self) -> TileMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TileMode) {
        self.mode = mode;
    }

    /// Stacking position of `id`, 0 at the bottom
    pub fn z_index(&self, id: ItemId) -> Option<usize> {
        self.order.position(&id)
    }

    /// Move `id` to the top of the stack
    ///
    /// Returns `false` when the id was already on top or is unknown, in
    /// which case nothing changed.
    pub fn raise_to_top(&mut self, id: ItemId) -> bool {
        self.order.raise(id)
    }

    /// Give every item without an entry a random one inside `bounds`
    ///
    /// Returns how many entries were added.
    pub fn fill_missing<R: Rng>(
        &mut self,
        items: &[Item],
        bounds: &Bounds,
        max_rotation: f64,
        rng: &mut R,
    ) -> usize {
        let mut added = 0;
        for item in items {
            if !self.entries.contains_key(&item.id) {
                self.entries
                    .insert(item.id, random_entry(bounds, max_rotation, rng));
                added += 1;
            }
        }
        added
    }

    /// Clamp every entry so it stays reachable inside `viewport`
    ///
    /// Rotation is left alone. Returns the ids whose position changed.
    pub fn clamp_all_to_viewport(
        &mut self,
        viewport: &Viewport,
        footprint_of: impl Fn(ItemId) -> Footprint,
    ) -> Vec<ItemId> {
        let mut changed = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            let bounds = viewport.clamp_bounds(footprint_of(*id));
            let (x, y) = bounds.clamp(entry.x, entry.y);
            if x != entry.x || y != entry.y {
                *entry = entry.moved_to(x, y);
                changed.push(*id);
            }
        }
        changed
    }

    /// Arrange `ids` in a grid matching the viewport's aspect ratio
    ///
    /// Each tile is nudged by up to `jitter_ratio` of the grid spacing and
    /// loses its rotation.
    pub fn tile<R: Rng>(
        &mut self,
        ids: &[ItemId],
        viewport: &Viewport,
        footprint: Footprint,
        jitter_ratio: f64,
        rng: &mut R,
    ) {
        if ids.is_empty() {
            return;
        }

        let header = viewport.header_height;
        let available_w = (viewport.width - footprint.width).max(0.0);
        let available_h = (viewport.height - footprint.height - header).max(0.0);
        let aspect = if available_h > 0.0 {
            available_w / available_h
        } else {
            1.0
        };

        let count = ids.len();
        let cols = ((count as f64 * aspect).sqrt().ceil() as usize).clamp(1, count);
        let rows = count.div_ceil(cols);
        let x_spacing = available_w / cols.saturating_sub(1).max(1) as f64;
        let y_spacing = available_h / rows.saturating_sub(1).max(1) as f64;
        let jitter = x_spacing.min(y_spacing) * jitter_ratio;

        let max_y = (viewport.height - footprint.height).max(header);
        for (index, id) in ids.iter().enumerate() {
            let col = index % cols;
            let row = index / cols;
            let jitter_x = (rng.random::<f64>() - 0.5) * jitter;
            let jitter_y = (rng.random::<f64>() - 0.5) * jitter;

            let x = (col as f64 * x_spacing + jitter_x).clamp(0.0, available_w);
            let y = (header + row as f64 * y_spacing + jitter_y).clamp(header, max_y);
            self.entries.insert(*id, LayoutEntry::new(x, y, 0.0));
        }
        self.mode = TileMode::Tiled;
    }

    /// Scatter `ids` randomly again
    pub fn shuffle<R: Rng>(
        &mut self,
        ids: &[ItemId],
        bounds: &Bounds,
        max_rotation: f64,
        rng: &mut R,
    ) {
        for id in ids {
            self.entries
                .insert(*id, random_entry(bounds, max_rotation, rng));
        }
        self.mode = TileMode::Scattered;
    }

    /// Copies of the entries and order for persisting
    pub fn snapshot(&self) -> (LayoutMap, DisplayOrder) {
        (self.entries.clone(), self.order.clone())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.mode = TileMode::Scattered;
    }
}
