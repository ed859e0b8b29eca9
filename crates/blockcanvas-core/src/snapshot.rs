//! Persisted records
//!
//! A [`CollectionSnapshot`] is everything needed to restore a collection
//! without touching the network: the fetched items, where each tile sits,
//! and how the tiles stack. [`VisitRecord`]s form the browsing history.

use std::collections::HashSet;
use std::fmt::{self, Display};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::item::{Item, ItemId};
use crate::layout::{DisplayOrder, LayoutMap};

/// Identifier of a remote collection (the channel slug)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionKey(String);

impl CollectionKey {
    /// Create a key from user input, trimming surrounding whitespace
    pub fn new(key: impl AsRef<str>) -> Result<Self, ModelError> {
        let trimmed = key.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyKey);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CollectionKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Persisted state of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub collection_key: CollectionKey,
    /// Collection title, kept so cached loads can record a visit offline
    pub title: Option<String>,
    /// `None` marks a tombstone written over a corrupted record
    pub items: Option<Vec<Item>>,
    pub layout: LayoutMap,
    pub order: DisplayOrder,
    pub saved_at_millis: i64,
}

/// Why a snapshot cannot be restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRejection {
    /// The record was invalidated with a tombstone write
    Tombstoned,
    /// The record holds no items
    Empty,
    /// The record is older than the configured max age
    Stale { age_millis: i64 },
}

impl Display for SnapshotRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotRejection::Tombstoned => write!(f, "snapshot was invalidated"),
            SnapshotRejection::Empty => write!(f, "snapshot has no items"),
            SnapshotRejection::Stale { age_millis } => {
                write!(f, "snapshot is stale ({age_millis} ms old)")
            }
        }
    }
}

impl CollectionSnapshot {
    /// Age of the record relative to `now_millis`
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.saved_at_millis
    }

    /// True once `now - saved_at` exceeds `max_age`
    pub fn is_expired(&self, now_millis: i64, max_age: Duration) -> bool {
        self.age_millis(now_millis) > max_age.as_millis() as i64
    }

    /// Check the record is usable for restoring a session
    ///
    /// Restorable records hold a non-empty item list and are strictly
    /// younger than `max_age`.
    pub fn check_restorable(
        &self,
        now_millis: i64,
        max_age: Duration,
    ) -> Result<&[Item], SnapshotRejection> {
        let items = self.items.as_deref().ok_or(SnapshotRejection::Tombstoned)?;
        if items.is_empty() {
            return Err(SnapshotRejection::Empty);
        }
        let age_millis = self.age_millis(now_millis);
        if age_millis >= max_age.as_millis() as i64 {
            return Err(SnapshotRejection::Stale { age_millis });
        }
        Ok(items)
    }

    /// Display order to restore with
    ///
    /// An empty stored order falls back to the items' natural order. Ids
    /// that no longer match an item are dropped and items missing from the
    /// stored order are appended, so the result is always a permutation of
    /// the item ids.
    pub fn restored_order(&self) -> DisplayOrder {
        let items = self.items.as_deref().unwrap_or_default();
        if self.order.is_empty() {
            return DisplayOrder::from_items(items);
        }
        let known: HashSet<ItemId> = items.iter().map(|item| item.id).collect();
        let kept = self.order.iter().copied().filter(|id| known.contains(id));
        DisplayOrder::from_unique(kept.chain(items.iter().map(|item| item.id)))
    }
}

/// One entry of the visit history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// Auto-incremented record id
    pub id: u64,
    pub collection_key: CollectionKey,
    pub title: String,
    pub timestamp_millis: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(items: Option<Vec<Item>>, order: &[u64], saved_at: i64) -> CollectionSnapshot {
        CollectionSnapshot {
            collection_key: CollectionKey::new("arena").unwrap(),
            title: None,
            items,
            layout: LayoutMap::new(),
            order: DisplayOrder::from_ids(order.iter().copied().map(ItemId).collect()).unwrap(),
            saved_at_millis: saved_at,
        }
    }

    #[test]
    fn test_key_trims_and_rejects_blank() {
        assert_eq!(CollectionKey::new("  slug ").unwrap().as_str(), "slug");
        assert_eq!(CollectionKey::new("   "), Err(ModelError::EmptyKey));
    }

    #[test]
    fn test_restorable_checks() {
        let max_age = Duration::from_millis(1_000);
        let items = vec![Item::text(1, "a")];

        let fresh = snapshot(Some(items.clone()), &[], 10_000);
        assert!(fresh.check_restorable(10_500, max_age).is_ok());

        let stale = snapshot(Some(items), &[], 10_000);
        assert_eq!(
            stale.check_restorable(11_000, max_age),
            Err(SnapshotRejection::Stale { age_millis: 1_000 })
        );

        let tombstone = snapshot(None, &[], 10_000);
        assert_eq!(
            tombstone.check_restorable(10_001, max_age),
            Err(SnapshotRejection::Tombstoned)
        );

        let empty = snapshot(Some(Vec::new()), &[], 10_000);
        assert_eq!(
            empty.check_restorable(10_001, max_age),
            Err(SnapshotRejection::Empty)
        );
    }

    #[test]
    fn test_restored_order_falls_back_to_natural_order() {
        let items = vec![Item::text(3, "a"), Item::text(1, "b")];
        let record = snapshot(Some(items), &[], 0);
        let order: Vec<u64> = record.restored_order().iter().map(|id| id.0).collect();
        assert_eq!(order, vec![3, 1]);
    }

    #[test]
    fn test_restored_order_repairs_partial_order() {
        let items = vec![Item::text(1, "a"), Item::text(2, "b"), Item::text(3, "c")];
        let record = snapshot(Some(items), &[3, 9, 1], 0);
        let order: Vec<u64> = record.restored_order().iter().map(|id| id.0).collect();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn test_restoring_a_large_collection_is_linear() {
        let count = 40_000u64;
        let items: Vec<Item> = (1..=count).map(|id| Item::text(id, "x")).collect();
        let mut stored: Vec<u64> = (1..=count).collect();
        // One raise, so the stored order differs from the natural one
        stored.remove(0);
        stored.push(1);
        let record = snapshot(Some(items), &stored, 0);

        let started = std::time::Instant::now();
        let order = record.restored_order();
        let elapsed = started.elapsed();

        assert_eq!(order.len(), count as usize);
        assert_eq!(order.top(), Some(ItemId(1)));
        assert_eq!(order.position(&ItemId(2)), Some(0));
        assert!(elapsed < Duration::from_secs(1), "took {:?}", elapsed);
    }

    #[test]
    fn test_expiry_is_strict() {
        let record = snapshot(Some(vec![Item::text(1, "a")]), &[], 0);
        let max_age = Duration::from_millis(100);
        assert!(!record.is_expired(100, max_age));
        assert!(record.is_expired(101, max_age));
    }
}
