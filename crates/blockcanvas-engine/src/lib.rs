//! # Block Canvas Engine
//!
//! Drives the canvas: holds the layout of the collection on screen,
//! materializes it batch by batch and switches between collections.
//!
//! ## Key Types
//!
//! - [`NavigationController`]: Owns the canvas; cache-first navigation and
//!   every pointer interaction
//! - [`LayoutState`]: Positions, rotations, display order and tile mode
//! - [`RenderScheduler`]: Batch materialization under a render ceiling,
//!   with offscreen eviction
//! - [`LayoutPersister`]: Debounced layout writes back to the store
//! - [`CanvasConfig`]: TOML configuration for every piece above
//!
//! ## Key Traits
//!
//! - [`Surface`]: Where items become visible ([`HeadlessSurface`] keeps
//!   them in memory)
//! - [`MemoryProbe`]: Memory readings for pressure eviction
//! - [`NavigationObserver`]: Progress callbacks for front ends
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use blockcanvas_core::CollectionKey;
//! use blockcanvas_engine::{CanvasConfig, HeadlessSurface, NavigationController};
//!
//! let controller = NavigationController::new(
//!     CanvasConfig::new(),
//!     store,
//!     api,
//!     Box::new(HeadlessSurface::new()),
//! );
//! controller.navigate(&CollectionKey::new("ephemeral-visions")?, false).await?;
//! ```

pub mod config;
pub mod error;
pub mod headless;
mod interaction;
pub mod layout;
pub mod memory;
pub mod navigation;
pub mod persist;
pub mod scheduler;
pub mod session;
pub mod surface;

pub use config::{
    ACCESS_TOKEN_ENV, CacheConfig, CanvasConfig, CeilingPolicy, DEFAULT_COLLECTION, DeviceClass,
    DeviceProfile, DeviceProfiles, EvictionConfig, InteractionConfig, LayoutConfig,
    MIN_TIMER_INTERVAL, SchedulerConfig, StoreConfig,
};
pub use error::{ConfigError, NavigationError, SurfaceError};
pub use headless::{HeadlessElement, HeadlessSurface};
pub use layout::{LayoutState, TileMode};
pub use memory::{ManualMemoryProbe, MemoryProbe, MemorySample, NoMemoryProbe};
pub use navigation::{NavigationController, NavigationObserver, NavigationOutcome};
pub use persist::{LayoutPersister, PersistHandle, Throttle};
pub use scheduler::{
    MaterializedItem, RenderScheduler, SchedulerSettings, SchedulerState, TickOutcome,
};
pub use session::{CanvasStatus, NavigationState, SessionSeed};
pub use surface::{ElementHandle, Materialized, ObserverHandle, Surface};
