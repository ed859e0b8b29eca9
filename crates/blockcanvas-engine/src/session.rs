//! Canvas state and render sessions
//!
//! Everything the canvas mutates lives in one [`CanvasState`] behind a
//! `parking_lot::Mutex`. Critical sections never await, which keeps the
//! canvas on one logical thread while fetches and timers run concurrently
//! around it. Background tasks hold a weak reference plus the generation
//! of the session that spawned them and stop as soon as either is gone.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use blockcanvas_core::{
    CollectionKey, DisplayOrder, Footprint, Item, ItemId, LayoutMap, Viewport,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::CanvasConfig;
use crate::interaction::DragState;
use crate::layout::{LayoutState, TileMode};
use crate::memory::MemoryProbe;
use crate::persist::{PersistHandle, Throttle};
use crate::scheduler::{RenderScheduler, SchedulerSettings, SchedulerState, TickOutcome};
use crate::surface::Surface;

pub(crate) type SharedCanvas = Arc<Mutex<CanvasState>>;
pub(crate) type WeakCanvas = Weak<Mutex<CanvasState>>;

/// Navigation Controller states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigationState {
    #[default]
    Idle,
    /// A navigation is between teardown and adoption
    Switching,
}

/// Items, layout and order a session starts from
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub key: CollectionKey,
    pub title: Option<String>,
    pub items: Vec<Item>,
    pub layout: LayoutMap,
    pub order: DisplayOrder,
}

/// Transient state of the collection on screen
pub(crate) struct RenderSession {
    pub(crate) key: CollectionKey,
    pub(crate) title: Option<String>,
    pub(crate) items: HashMap<ItemId, Item>,
    pub(crate) layout: LayoutState,
    pub(crate) scheduler: RenderScheduler,
    pub(crate) generation: u64,
    pub(crate) tick_task: Option<JoinHandle<()>>,
    pub(crate) memory_task: Option<JoinHandle<()>>,
    pub(crate) drag: Option<DragState>,
}

impl RenderSession {
    fn stop_tasks(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
        if let Some(task) = self.memory_task.take() {
            task.abort();
        }
    }
}

/// Point-in-time view of the canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasStatus {
    pub collection: Option<CollectionKey>,
    pub title: Option<String>,
    pub navigation: NavigationState,
    /// `None` while no session exists
    pub scheduler: Option<SchedulerState>,
    pub visible: usize,
    pub displayed: usize,
    pub total: usize,
    pub evicted: usize,
    pub ceiling: Option<usize>,
    pub tile_mode: TileMode,
    /// The recurring batch tick is still running
    pub ticking: bool,
    /// The memory monitor is running
    pub monitoring_memory: bool,
}

/// State shared by the controller and its background tasks
pub(crate) struct CanvasState {
    pub(crate) config: Arc<CanvasConfig>,
    pub(crate) surface: Box<dyn Surface>,
    pub(crate) probe: Arc<dyn MemoryProbe>,
    pub(crate) persist: PersistHandle,
    pub(crate) this: WeakCanvas,
    pub(crate) viewport: Viewport,
    pub(crate) current_key: Option<CollectionKey>,
    pub(crate) navigation: NavigationState,
    pub(crate) generation: u64,
    pub(crate) session: Option<RenderSession>,
    pub(crate) resize_throttle: Throttle,
    pub(crate) resize_trailing: Option<JoinHandle<()>>,
}

impl CanvasState {
    /// Build the shared state, wiring the weak self-reference
    pub(crate) fn shared(
        config: Arc<CanvasConfig>,
        surface: Box<dyn Surface>,
        probe: Arc<dyn MemoryProbe>,
        persist: PersistHandle,
        viewport: Viewport,
    ) -> SharedCanvas {
        let resize_throttle = Throttle::new(config.interaction.resize_throttle());
        Arc::new_cyclic(|this| {
            Mutex::new(CanvasState {
                config,
                surface,
                probe,
                persist,
                this: this.clone(),
                viewport,
                current_key: None,
                navigation: NavigationState::Idle,
                generation: 0,
                session: None,
                resize_throttle,
                resize_trailing: None,
            })
        })
    }

    /// Footprint of a visible item, falling back to the configured size
    pub(crate) fn footprint_of(&self, id: ItemId) -> Footprint {
        self.session
            .as_ref()
            .and_then(|session| session.scheduler.element(id))
            .and_then(|element| self.surface.footprint(element))
            .unwrap_or_else(|| self.config.layout.footprint())
    }

    // ========================================================================
    // Navigation lifecycle
    // ========================================================================

    /// Start a navigation, returning its generation
    ///
    /// `None` means the key is already current and nothing was touched.
    pub(crate) fn begin_navigation(&mut self, key: &CollectionKey, force: bool) -> Option<u64> {
        if !force && self.current_key.as_ref() == Some(key) {
            return None;
        }
        self.teardown();
        self.generation += 1;
        self.navigation = NavigationState::Switching;
        self.current_key = Some(key.clone());
        Some(self.generation)
    }

    /// Leave `Switching` unless a newer navigation took over
    pub(crate) fn finish_navigation(&mut self, generation: u64, succeeded: bool) {
        if self.generation != generation {
            return;
        }
        self.navigation = NavigationState::Idle;
        if !succeeded {
            self.current_key = None;
        }
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Stop timers, release every element and clear layout
    pub(crate) fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.stop_tasks();
        session.scheduler.release_all(self.surface.as_mut());
        session.layout.clear();
        debug!(collection = %session.key, "Session torn down");
    }

    /// Install a new session and begin progressive materialization
    ///
    /// Returns `false` if a newer navigation started in the meantime.
    pub(crate) fn adopt(&mut self, seed: SessionSeed, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.teardown();

        let layout_config = &self.config.layout;
        let bounds = self.viewport.placement_bounds(layout_config.footprint());
        let mut layout = LayoutState::new(seed.layout, seed.order);
        let added = layout.fill_missing(
            &seed.items,
            &bounds,
            layout_config.max_scatter_rotation,
            &mut rand::rng(),
        );
        if added > 0 {
            debug!(added, "Seeded missing layout entries");
        }

        let settings =
            SchedulerSettings::new(&self.config.scheduler, self.config.device_profile());
        let scheduler = RenderScheduler::new(settings, layout.order().ids().to_vec());
        let total = seed.items.len();

        self.session = Some(RenderSession {
            key: seed.key,
            title: seed.title,
            items: seed.items.into_iter().map(|item| (item.id, item)).collect(),
            layout,
            scheduler,
            generation,
            tick_task: None,
            memory_task: None,
            drag: None,
        });
        info!(total, generation, "Session started");

        if self.run_tick(generation) {
            self.start_ticking();
        }
        if self.config.device_profile().memory_monitoring {
            self.start_memory_monitor();
        }
        true
    }

    // ========================================================================
    // Batch ticks
    // ========================================================================

    /// Run one scheduler tick for `generation`
    ///
    /// Returns `true` while the recurring tick should keep going.
    pub(crate) fn run_tick(&mut self, generation: u64) -> bool {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.generation == generation)
        else {
            return false;
        };

        let outcome = session
            .scheduler
            .tick(self.surface.as_mut(), &session.items, &session.layout);

        let profile = self.config.device_profile();
        let eviction = &self.config.eviction;
        if eviction.sweep_after_batch
            && profile.memory_monitoring
            && matches!(outcome, TickOutcome::Materialized(_) | TickOutcome::Exhausted(_))
        {
            let over_half = session
                .scheduler
                .ceiling()
                .is_some_and(|ceiling| session.scheduler.visible_count() > ceiling / 2);
            if over_half {
                let removed = session.scheduler.evict_offscreen(
                    self.surface.as_mut(),
                    &self.viewport,
                    eviction.margin_px,
                    eviction.max_removals_per_pass,
                );
                if !removed.is_empty() {
                    debug!(removed = removed.len(), "Swept offscreen items after batch");
                }
            }
        }

        match outcome {
            TickOutcome::Skipped | TickOutcome::Materialized(_) => true,
            TickOutcome::Exhausted(_) => {
                info!(
                    target: "panel",
                    collection = %session.key,
                    "All {} items loaded",
                    session.scheduler.total()
                );
                false
            }
            TickOutcome::LimitReached => {
                info!(
                    target: "panel",
                    collection = %session.key,
                    visible = session.scheduler.visible_count(),
                    "Showing {} of {} items, raise the limit to load more",
                    session.scheduler.visible_count(),
                    session.scheduler.total()
                );
                false
            }
        }
    }

    /// (Re)start the recurring batch tick of the current session
    pub(crate) fn start_ticking(&mut self) {
        let period = self.config.scheduler.tick_interval();
        let this = self.this.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(task) = session.tick_task.take() {
            task.abort();
        }

        let generation = session.generation;
        session.tick_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(canvas) = this.upgrade() else {
                    break;
                };
                let keep_going = canvas.lock().run_tick(generation);
                if !keep_going {
                    break;
                }
            }
            debug!(generation, "Batch tick stopped");
        }));
    }

    // ========================================================================
    // Memory pressure
    // ========================================================================

    fn start_memory_monitor(&mut self) {
        let period = self.config.eviction.memory_check_interval();
        let threshold = self.config.eviction.pressure_threshold;
        let probe = Arc::clone(&self.probe);
        let this = self.this.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let generation = session.generation;
        session.memory_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(canvas) = this.upgrade() else {
                    break;
                };
                let under_pressure = probe
                    .sample()
                    .is_some_and(|sample| sample.is_under_pressure(threshold));
                let keep_going = {
                    let mut state = canvas.lock();
                    if !state.is_current(generation) {
                        false
                    } else {
                        if under_pressure {
                            state.relieve_memory_pressure();
                        }
                        true
                    }
                };
                if !keep_going {
                    break;
                }
            }
            debug!(generation, "Memory monitor stopped");
        }));
    }

    /// Evict one pass of offscreen items
    pub(crate) fn relieve_memory_pressure(&mut self) -> Vec<ItemId> {
        let eviction = &self.config.eviction;
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let removed = session.scheduler.evict_offscreen(
            self.surface.as_mut(),
            &self.viewport,
            eviction.margin_px,
            eviction.max_removals_per_pass,
        );
        if !removed.is_empty() {
            info!(
                target: "panel",
                removed = removed.len(),
                "Memory pressure: removed {} offscreen items",
                removed.len()
            );
        }
        removed
    }

    /// Bring back evicted items that are within reach again
    pub(crate) fn restore_in_range(&mut self) -> Vec<ItemId> {
        let margin = self.config.eviction.margin_px;
        let footprint = self.config.layout.footprint();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let restored = session.scheduler.restore_in_range(
            self.surface.as_mut(),
            &session.items,
            &session.layout,
            &self.viewport,
            margin,
            footprint,
        );
        if !restored.is_empty() {
            debug!(restored = restored.len(), "Restored evicted items");
        }
        restored
    }

    /// Raise the render ceiling and resume loading
    pub(crate) fn override_limit(&mut self) -> Option<usize> {
        let session = self.session.as_mut()?;
        let ceiling = session.scheduler.override_limit()?;
        info!(target: "panel", ceiling, "Render limit raised to {}", ceiling);
        if session.scheduler.state() == SchedulerState::Idle {
            self.start_ticking();
        }
        Some(ceiling)
    }

    // ========================================================================
    // Persistence and inspection
    // ========================================================================

    /// Queue the current layout and order for a debounced write
    pub(crate) fn persist_layout(&self) {
        if let Some(session) = &self.session {
            let (layout, order) = session.layout.snapshot();
            self.persist.schedule(session.key.clone(), layout, order);
        }
    }

    pub(crate) fn status(&self) -> CanvasStatus {
        let session = self.session.as_ref();
        let running = |task: Option<&JoinHandle<()>>| task.is_some_and(|task| !task.is_finished());
        CanvasStatus {
            collection: self.current_key.clone(),
            title: session.and_then(|s| s.title.clone()),
            navigation: self.navigation,
            scheduler: session.map(|s| s.scheduler.state()),
            visible: session.map_or(0, |s| s.scheduler.visible_count()),
            displayed: session.map_or(0, |s| s.scheduler.displayed_count()),
            total: session.map_or(0, |s| s.scheduler.total()),
            evicted: session.map_or(0, |s| s.scheduler.evicted_count()),
            ceiling: session.and_then(|s| s.scheduler.ceiling()),
            tile_mode: session.map_or(TileMode::Scattered, |s| s.layout.mode()),
            ticking: running(session.and_then(|s| s.tick_task.as_ref())),
            monitoring_memory: running(session.and_then(|s| s.memory_task.as_ref())),
        }
    }
}
