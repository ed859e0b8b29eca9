//! Random initial placement

use blockcanvas_core::{Bounds, Item, LayoutEntry, LayoutMap};
use rand::Rng;

/// Rotation range for scattered tiles, in degrees either side of zero
pub const MAX_SCATTER_ROTATION: f64 = 10.0;

fn sample<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max <= min {
        return min;
    }
    rng.random_range(min..=max)
}

/// One uniformly random entry inside `bounds`
pub fn random_entry<R: Rng>(
    bounds: &Bounds,
    max_rotation: f64,
    rng: &mut R,
) -> LayoutEntry {
    LayoutEntry::new(
        sample(rng, bounds.min_x, bounds.max_x),
        sample(rng, bounds.min_y, bounds.max_y),
        sample(rng, -max_rotation, max_rotation),
    )
}

/// Scatter every item inside `bounds`
pub fn scatter<R: Rng>(
    items: &[Item],
    bounds: &Bounds,
    max_rotation: f64,
    rng: &mut R,
) -> LayoutMap {
    items
        .iter()
        .map(|item| (item.id, random_entry(bounds, max_rotation, rng)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcanvas_core::{Footprint, Viewport};

    #[test]
    fn test_scatter_stays_in_bounds() {
        let bounds = Viewport::new(1000.0, 800.0).placement_bounds(Footprint::default());
        let items: Vec<Item> = (0..200).map(|id| Item::text(id, "x")).collect();

        let layout = scatter(&items, &bounds, MAX_SCATTER_ROTATION, &mut rand::rng());
        assert_eq!(layout.len(), 200);
        for entry in layout.values() {
            assert!(bounds.contains(entry.x, entry.y));
            assert!(entry.rotation_degrees.abs() <= MAX_SCATTER_ROTATION);
        }
    }

    #[test]
    fn test_degenerate_bounds_pin_to_minimum() {
        let bounds = Viewport::new(50.0, 50.0).placement_bounds(Footprint::default());
        let entry = random_entry(&bounds, 0.0, &mut rand::rng());
        assert_eq!((entry.x, entry.y, entry.rotation_degrees), (0.0, 0.0, 0.0));
    }
}
