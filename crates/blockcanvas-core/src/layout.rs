//! Spatial layout primitives
//!
//! [`LayoutEntry`] is where a tile sits; [`DisplayOrder`] is how tiles
//! stack. The tail of a display order is the top of the visual stack,
//! so raising an item moves its id to the end.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::item::{Item, ItemId};

/// Position and rotation of one tile
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub x: f64,
    pub y: f64,
    pub rotation_degrees: f64,
}

impl LayoutEntry {
    pub fn new(x: f64, y: f64, rotation_degrees: f64) -> Self {
        Self {
            x,
            y,
            rotation_degrees,
        }
    }

    /// Same entry moved to `(x, y)`, rotation kept
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self { x, y, ..*self }
    }

    /// Same entry rotated by `delta` degrees
    pub fn rotated_by(&self, delta: f64) -> Self {
        Self {
            rotation_degrees: self.rotation_degrees + delta,
            ..*self
        }
    }
}

/// Layout of every known item, keyed by id
pub type LayoutMap = BTreeMap<ItemId, LayoutEntry>;

/// Ordered, duplicate-free sequence of item ids
///
/// Keeps an id → position index next to the sequence so lookups stay
/// constant time on large collections. Serialized as the bare id list.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OrderRecord", into = "OrderRecord")]
pub struct DisplayOrder {
    ids: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
}

/// Stored form of a [`DisplayOrder`]
#[derive(Serialize, Deserialize)]
struct OrderRecord {
    ids: Vec<ItemId>,
}

impl From<OrderRecord> for DisplayOrder {
    fn from(record: OrderRecord) -> Self {
        Self::from_unique(record.ids)
    }
}

impl From<DisplayOrder> for OrderRecord {
    fn from(order: DisplayOrder) -> Self {
        Self { ids: order.ids }
    }
}

impl fmt::Debug for DisplayOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.ids).finish()
    }
}

impl DisplayOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Natural order of a fetched item list
    ///
    /// Items repeating an id keep their first position.
    pub fn from_items(items: &[Item]) -> Self {
        Self::from_unique(items.iter().map(|item| item.id))
    }

    /// Build from raw ids, rejecting duplicates
    pub fn from_ids(ids: Vec<ItemId>) -> Result<Self, ModelError> {
        let mut order = Self::with_capacity(ids.len());
        for id in ids {
            if !order.push(id) {
                return Err(ModelError::DuplicateId(id));
            }
        }
        Ok(order)
    }

    /// Build from ids, keeping the first occurrence of a repeated id
    pub fn from_unique(ids: impl IntoIterator<Item = ItemId>) -> Self {
        let ids = ids.into_iter();
        let mut order = Self::with_capacity(ids.size_hint().0);
        for id in ids {
            order.push(id);
        }
        order
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// The most recently raised id
    pub fn top(&self) -> Option<ItemId> {
        self.ids.last().copied()
    }

    /// Move `id` to the tail
    ///
    /// Returns `true` if the sequence changed. Raising the current top, or
    /// an id that is not in the sequence, leaves it untouched.
    pub fn raise(&mut self, id: ItemId) -> bool {
        match self.position(&id) {
            Some(index) if index + 1 == self.ids.len() => false,
            Some(index) => {
                self.ids.remove(index);
                self.ids.push(id);
                for (position, moved) in self.ids.iter().enumerate().skip(index) {
                    self.index.insert(*moved, position);
                }
                true
            }
            None => false,
        }
    }

    /// Append an id that is not yet present
    pub fn push(&mut self, id: ItemId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.index.insert(id, self.ids.len());
        self.ids.push(id);
        true
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.index.clear();
    }

    /// Check that this order is a permutation of the items' ids
    pub fn validate_against(&self, items: &[Item]) -> Result<(), ModelError> {
        let known: HashSet<ItemId> = items.iter().map(|item| item.id).collect();
        if self.ids.len() != known.len() {
            return Err(ModelError::LengthMismatch {
                expected: known.len(),
                actual: self.ids.len(),
            });
        }
        match self.ids.iter().find(|id| !known.contains(id)) {
            Some(id) => Err(ModelError::UnknownId(*id)),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.ids.iter()
    }
}

impl IntoIterator for DisplayOrder {
    type Item = ItemId;
    type IntoIter = std::vec::IntoIter<ItemId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ItemId> {
        raw.iter().copied().map(ItemId).collect()
    }

    #[test]
    fn test_raise_moves_to_tail() {
        let mut order = DisplayOrder::from_ids(ids(&[1, 2, 3])).unwrap();
        assert!(order.raise(ItemId(1)));
        assert_eq!(order.ids(), ids(&[2, 3, 1]).as_slice());
        assert_eq!(order.top(), Some(ItemId(1)));
    }

    #[test]
    fn test_raise_is_idempotent() {
        let mut once = DisplayOrder::from_ids(ids(&[1, 2, 3])).unwrap();
        once.raise(ItemId(2));

        let mut twice = DisplayOrder::from_ids(ids(&[1, 2, 3])).unwrap();
        twice.raise(ItemId(2));
        assert!(!twice.raise(ItemId(2)));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_raise_unknown_is_noop() {
        let mut order = DisplayOrder::from_ids(ids(&[1, 2])).unwrap();
        assert!(!order.raise(ItemId(9)));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_from_ids_rejects_duplicates() {
        let err = DisplayOrder::from_ids(ids(&[1, 2, 1])).unwrap_err();
        assert_eq!(err, ModelError::DuplicateId(ItemId(1)));
    }

    #[test]
    fn test_validate_against_items() {
        let items = vec![Item::text(1, "a"), Item::text(2, "b")];
        let good = DisplayOrder::from_ids(ids(&[2, 1])).unwrap();
        assert!(good.validate_against(&items).is_ok());

        let short = DisplayOrder::from_ids(ids(&[2])).unwrap();
        assert!(matches!(
            short.validate_against(&items),
            Err(ModelError::LengthMismatch { .. })
        ));

        let stranger = DisplayOrder::from_ids(ids(&[2, 5])).unwrap();
        assert_eq!(
            stranger.validate_against(&items),
            Err(ModelError::UnknownId(ItemId(5)))
        );
    }

    #[test]
    fn test_positions_follow_raises() {
        let mut order = DisplayOrder::from_ids(ids(&[1, 2, 3, 4])).unwrap();
        order.raise(ItemId(2));
        assert_eq!(order.ids(), ids(&[1, 3, 4, 2]).as_slice());
        for (position, id) in order.ids().iter().enumerate() {
            assert_eq!(order.position(id), Some(position));
        }
        assert!(!order.push(ItemId(3)));
        assert!(order.push(ItemId(7)));
        assert_eq!(order.position(&ItemId(7)), Some(4));

        order.clear();
        assert!(!order.contains(&ItemId(1)));
        assert_eq!(order.position(&ItemId(2)), None);
    }

    #[test]
    fn test_encoding_is_the_id_list() {
        let order = DisplayOrder::from_ids(ids(&[3, 1, 2])).unwrap();
        let bytes = postcard::to_allocvec(&order).unwrap();
        assert_eq!(bytes, postcard::to_allocvec(&ids(&[3, 1, 2])).unwrap());

        let decoded: DisplayOrder = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, order);
        assert_eq!(decoded.position(&ItemId(2)), Some(2));
    }

    #[test]
    fn test_from_items_skips_repeats() {
        let items = vec![Item::text(4, "a"), Item::text(4, "b"), Item::text(5, "c")];
        let order = DisplayOrder::from_items(&items);
        assert_eq!(order.ids(), ids(&[4, 5]).as_slice());
    }
}
