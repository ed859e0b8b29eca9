//! Debounced layout persistence and input throttling
//!
//! Layout writes are coalesced per collection: each schedule call replaces
//! the pending layout and pushes the deadline back by the debounce window.
//! The write only touches an existing record, so a write that lands after
//! the collection was evicted or tombstoned is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use blockcanvas_core::{CollectionKey, DisplayOrder, LayoutMap};
use blockcanvas_storage::SnapshotStore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Idle deadline used while nothing is pending
const IDLE_WAIT: Duration = Duration::from_secs(3600);

#[derive(Debug)]
enum PersistCommand {
    Schedule {
        key: CollectionKey,
        layout: LayoutMap,
        order: DisplayOrder,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
struct PendingWrite {
    layout: LayoutMap,
    order: DisplayOrder,
    due: Instant,
}

/// Sending side of the persister, cheap to clone
#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistHandle {
    /// Queue a layout write for `key`, restarting its debounce window
    pub fn schedule(&self, key: CollectionKey, layout: LayoutMap, order: DisplayOrder) {
        if self
            .tx
            .send(PersistCommand::Schedule { key, layout, order })
            .is_err()
        {
            warn!("Layout persister stopped, dropping write");
        }
    }

    /// Write everything pending now and wait for it
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Background task writing debounced layouts to the store
#[derive(Debug)]
pub struct LayoutPersister {
    handle: PersistHandle,
    task: JoinHandle<()>,
}

impl LayoutPersister {
    /// Spawn the persister on the current runtime
    pub fn spawn(store: Arc<dyn SnapshotStore>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, debounce, rx));
        Self {
            handle: PersistHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> PersistHandle {
        self.handle.clone()
    }

    pub async fn flush(&self) {
        self.handle.flush().await;
    }
}

impl Drop for LayoutPersister {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    store: Arc<dyn SnapshotStore>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    let mut pending: HashMap<CollectionKey, PendingWrite> = HashMap::new();

    loop {
        let deadline = pending
            .values()
            .map(|write| write.due)
            .min()
            .unwrap_or_else(|| Instant::now() + IDLE_WAIT);

        tokio::select! {
            command = rx.recv() => match command {
                Some(PersistCommand::Schedule { key, layout, order }) => {
                    let due = Instant::now() + debounce;
                    pending.insert(key, PendingWrite { layout, order, due });
                }
                Some(PersistCommand::Flush(done)) => {
                    write_all(store.as_ref(), pending.drain().collect()).await;
                    let _ = done.send(());
                }
                None => {
                    write_all(store.as_ref(), pending.drain().collect()).await;
                    info!("Layout persister stopped");
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline), if !pending.is_empty() => {
                let now = Instant::now();
                let due: Vec<CollectionKey> = pending
                    .iter()
                    .filter(|(_, write)| write.due <= now)
                    .map(|(key, _)| key.clone())
                    .collect();
                let writes = due
                    .into_iter()
                    .filter_map(|key| pending.remove(&key).map(|write| (key, write)))
                    .collect();
                write_all(store.as_ref(), writes).await;
            }
        }
    }
}

async fn write_all(store: &dyn SnapshotStore, writes: Vec<(CollectionKey, PendingWrite)>) {
    for (key, write) in writes {
        match store.update_layout(&key, write.layout, write.order).await {
            Ok(true) => debug!(collection = %key, "Layout saved"),
            Ok(false) => debug!(collection = %key, "No snapshot to update, layout dropped"),
            Err(e) => warn!(collection = %key, error = %e, "Failed to save layout"),
        }
    }
}

/// Drops events arriving sooner than `interval` after the last accepted one
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Accept the event at `now` if the interval has passed
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Record an event at `now` unconditionally
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Time left before the next event would be accepted
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last
            .map(|last| self.interval.saturating_sub(now.duration_since(last)))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcanvas_core::{Item, ItemId, LayoutEntry, ManualClock};
    use blockcanvas_storage::InMemorySnapshotStore;

    fn key(slug: &str) -> CollectionKey {
        CollectionKey::new(slug).unwrap()
    }

    fn layout_at(x: f64) -> LayoutMap {
        [(ItemId(1), LayoutEntry::new(x, 0.0, 0.0))].into_iter().collect()
    }

    async fn seeded_store() -> Arc<InMemorySnapshotStore> {
        let store = Arc::new(InMemorySnapshotStore::new(Arc::new(ManualClock::at_millis(0))));
        store
            .put(
                &key("arena"),
                None,
                Some(vec![Item::text(1, "x")]),
                LayoutMap::new(),
                DisplayOrder::new(),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_are_coalesced_until_quiet() {
        let store = seeded_store().await;
        let persister = LayoutPersister::spawn(store.clone(), Duration::from_millis(1000));
        let handle = persister.handle();

        handle.schedule(key("arena"), layout_at(1.0), DisplayOrder::new());
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle.schedule(key("arena"), layout_at(2.0), DisplayOrder::new());
        tokio::time::sleep(Duration::from_millis(600)).await;

        // 1.2 s after the first schedule, but only 0.6 s after the last
        let snapshot = store.get(&key("arena")).await.unwrap().unwrap();
        assert!(snapshot.layout.is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let snapshot = store.get(&key("arena")).await.unwrap().unwrap();
        assert_eq!(snapshot.layout, layout_at(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_write_to_missing_record_is_dropped() {
        let store = seeded_store().await;
        let persister = LayoutPersister::spawn(store.clone(), Duration::from_millis(1000));

        persister
            .handle()
            .schedule(key("gone"), layout_at(1.0), DisplayOrder::new());
        persister.flush().await;

        assert!(store.get(&key("gone")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let store = seeded_store().await;
        let persister = LayoutPersister::spawn(store.clone(), Duration::from_secs(60));

        persister
            .handle()
            .schedule(key("arena"), layout_at(7.0), DisplayOrder::new());
        persister.flush().await;

        let snapshot = store.get(&key("arena")).await.unwrap().unwrap();
        assert_eq!(snapshot.layout, layout_at(7.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_drops_events_inside_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(25));
        let start = Instant::now();

        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(10)));
        assert_eq!(
            throttle.remaining(start + Duration::from_millis(10)),
            Duration::from_millis(15)
        );
        assert!(throttle.ready(start + Duration::from_millis(25)));
    }
}
