//! Canvas configuration
//!
//! Every section deserializes from TOML with defaults for missing keys, so
//! a config file only needs the values it changes:
//!
//! ```toml
//! default_collection = "ephemeral-visions"
//! device = "constrained"
//!
//! [scheduler]
//! batch_size = 10
//!
//! [devices.constrained]
//! max_concurrent_items = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use blockcanvas_core::{DEFAULT_HEADER_HEIGHT, DEFAULT_ITEM_HEIGHT, DEFAULT_ITEM_WIDTH, Footprint};
use blockcanvas_fetch::{ApiConfig, MAX_SCATTER_ROTATION};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable that overrides [`ApiConfig::access_token`]
pub const ACCESS_TOKEN_ENV: &str = "BLOCKCANVAS_ACCESS_TOKEN";

/// Collection shown when none is requested
pub const DEFAULT_COLLECTION: &str = "ephemeral-visions";

/// Floor for the periodic timers, which cannot run with a zero period
pub const MIN_TIMER_INTERVAL: Duration = Duration::from_millis(1);

/// Class of device the canvas runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// No render ceiling, no memory monitoring
    #[default]
    Desktop,
    /// Render ceiling and memory-pressure eviction
    Constrained,
}

/// How the render ceiling cuts off the last batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingPolicy {
    /// Never start a batch that would cross the ceiling
    #[default]
    WholeBatches,
    /// Shrink the last batch to land exactly on the ceiling
    FillToCeiling,
    /// Start a full batch whenever the count is below the ceiling
    CheckBeforeBatch,
}

/// Batch loading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Items materialized per tick
    pub batch_size: usize,
    /// Milliseconds between ticks
    pub tick_interval_ms: u64,
    pub ceiling_policy: CeilingPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            tick_interval_ms: 100,
            ceiling_policy: CeilingPolicy::WholeBatches,
        }
    }
}

impl SchedulerConfig {
    /// Never shorter than [`MIN_TIMER_INTERVAL`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms).max(MIN_TIMER_INTERVAL)
    }
}

/// Render limits for one device class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Render ceiling, `None` for unlimited
    pub max_concurrent_items: Option<usize>,
    /// Highest ceiling reachable through overrides
    pub max_concurrent_items_after_override: Option<usize>,
    /// Ceiling increase per override
    pub override_step: usize,
    /// Sample memory and evict offscreen items under pressure
    pub memory_monitoring: bool,
}

impl DeviceProfile {
    /// Profile without any ceiling
    pub fn unlimited() -> Self {
        Self {
            max_concurrent_items: None,
            max_concurrent_items_after_override: None,
            override_step: 0,
            memory_monitoring: false,
        }
    }

    /// Profile with a ceiling, override step and post-override ceiling
    pub fn limited(ceiling: usize, step: usize, post_override: usize) -> Self {
        Self {
            max_concurrent_items: Some(ceiling),
            max_concurrent_items_after_override: Some(post_override),
            override_step: step,
            memory_monitoring: true,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Render limits per device class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfiles {
    pub desktop: DeviceProfile,
    pub constrained: DeviceProfile,
}

impl Default for DeviceProfiles {
    fn default() -> Self {
        Self {
            desktop: DeviceProfile::unlimited(),
            constrained: DeviceProfile::limited(100, 50, 300),
        }
    }
}

impl DeviceProfiles {
    pub fn for_class(&self, class: DeviceClass) -> &DeviceProfile {
        match class {
            DeviceClass::Desktop => &self.desktop,
            DeviceClass::Constrained => &self.constrained,
        }
    }
}

/// Memory-pressure eviction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Milliseconds between memory samples
    pub memory_check_interval_ms: u64,
    /// Fraction of the memory limit that counts as pressure
    pub pressure_threshold: f64,
    /// Pixels added around the viewport before an item counts as offscreen
    pub margin_px: f64,
    /// Most items removed per pass
    pub max_removals_per_pass: usize,
    /// Sweep offscreen items after a batch once half the ceiling is shown
    pub sweep_after_batch: bool,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            memory_check_interval_ms: 5_000,
            pressure_threshold: 0.8,
            margin_px: 200.0,
            max_removals_per_pass: 10,
            sweep_after_batch: true,
        }
    }
}

impl EvictionConfig {
    /// Never shorter than [`MIN_TIMER_INTERVAL`]
    pub fn memory_check_interval(&self) -> Duration {
        Duration::from_millis(self.memory_check_interval_ms).max(MIN_TIMER_INTERVAL)
    }
}

/// Pointer interaction timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Delay before a temporary raise commits on its own
    pub raise_commit_delay_ms: u64,
    /// Pointer travel before a press becomes a drag
    pub drag_threshold_px: f64,
    /// Minimum milliseconds between applied drag moves
    pub drag_throttle_ms: u64,
    /// Minimum milliseconds between resize re-clamps
    pub resize_throttle_ms: u64,
    /// Quiet period before layout changes are written
    pub persist_debounce_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            raise_commit_delay_ms: 300,
            drag_threshold_px: 5.0,
            drag_throttle_ms: 25,
            resize_throttle_ms: 100,
            persist_debounce_ms: 1_000,
        }
    }
}

impl InteractionConfig {
    pub fn raise_commit_delay(&self) -> Duration {
        Duration::from_millis(self.raise_commit_delay_ms)
    }

    pub fn drag_throttle(&self) -> Duration {
        Duration::from_millis(self.drag_throttle_ms)
    }

    pub fn resize_throttle(&self) -> Duration {
        Duration::from_millis(self.resize_throttle_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

/// Tile geometry and arrangement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub item_width: f64,
    pub item_height: f64,
    pub header_height: f64,
    /// Degrees added per wheel step
    pub rotation_step_degrees: f64,
    /// Scatter rotation range either side of zero
    pub max_scatter_rotation: f64,
    /// Tile jitter as a fraction of grid spacing
    pub tile_jitter_ratio: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            item_width: DEFAULT_ITEM_WIDTH,
            item_height: DEFAULT_ITEM_HEIGHT,
            header_height: DEFAULT_HEADER_HEIGHT,
            rotation_step_degrees: 5.0,
            max_scatter_rotation: MAX_SCATTER_ROTATION,
            tile_jitter_ratio: 0.2,
        }
    }
}

impl LayoutConfig {
    pub fn footprint(&self) -> Footprint {
        Footprint::new(self.item_width, self.item_height)
    }
}

/// Snapshot freshness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Snapshots and visits older than this are stale
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 24 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Local database location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub cache_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/blockcanvas.redb"),
            cache_size_mb: 32,
        }
    }
}

/// Top-level canvas configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub default_collection: String,
    pub device: DeviceClass,
    pub api: ApiConfig,
    pub scheduler: SchedulerConfig,
    pub devices: DeviceProfiles,
    pub eviction: EvictionConfig,
    pub interaction: InteractionConfig,
    pub layout: LayoutConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
}

impl CanvasConfig {
    /// Default configuration with the default collection filled in
    pub fn new() -> Self {
        Self {
            default_collection: DEFAULT_COLLECTION.to_string(),
            ..Default::default()
        }
    }

    /// Read a TOML file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_env();
        config.validate()?;
        debug!(path = %path.display(), "Loaded canvas config");
        Ok(config)
    }

    /// Parse TOML without touching the environment
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(raw)?;
        if config.default_collection.trim().is_empty() {
            config.default_collection = DEFAULT_COLLECTION.to_string();
        }
        Ok(config)
    }

    /// Apply [`ACCESS_TOKEN_ENV`] if it is set and non-empty
    pub fn apply_env(&mut self) {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => self.api.access_token = Some(token),
            _ => {}
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.batch_size == 0 {
            return Err(ConfigError::invalid("scheduler.batch_size must be positive"));
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "scheduler.tick_interval_ms must be positive",
            ));
        }
        if self.api.page_size == 0 {
            return Err(ConfigError::invalid("api.page_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.eviction.pressure_threshold) {
            return Err(ConfigError::invalid(
                "eviction.pressure_threshold must be within 0..=1",
            ));
        }
        if self.eviction.memory_check_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "eviction.memory_check_interval_ms must be positive",
            ));
        }
        for (name, profile) in [
            ("desktop", &self.devices.desktop),
            ("constrained", &self.devices.constrained),
        ] {
            if let (Some(ceiling), Some(post)) = (
                profile.max_concurrent_items,
                profile.max_concurrent_items_after_override,
            ) {
                if post < ceiling {
                    return Err(ConfigError::Invalid(format!(
                        "devices.{name}: post-override ceiling {post} is below ceiling {ceiling}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Render limits for the configured device class
    pub fn device_profile(&self) -> &DeviceProfile {
        self.devices.for_class(self.device)
    }

    pub fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = device;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.scheduler.batch_size = batch_size;
        self
    }

    pub fn with_tick_interval_ms(mut self, millis: u64) -> Self {
        self.scheduler.tick_interval_ms = millis;
        self
    }

    pub fn with_ceiling_policy(mut self, policy: CeilingPolicy) -> Self {
        self.scheduler.ceiling_policy = policy;
        self
    }

    /// Replace the constrained device profile
    pub fn with_constrained_profile(mut self, profile: DeviceProfile) -> Self {
        self.devices.constrained = profile;
        self
    }

    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.cache.max_age_secs = max_age.as_secs();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = CanvasConfig::new();
        assert_eq!(config.default_collection, "ephemeral-visions");
        assert_eq!(config.scheduler.batch_size, 20);
        assert_eq!(config.scheduler.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.interaction.raise_commit_delay(), Duration::from_millis(300));
        assert_eq!(config.cache.max_age(), Duration::from_secs(86_400));
        assert_eq!(config.device_profile().max_concurrent_items, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CanvasConfig::from_toml(
            r#"
            device = "constrained"

            [scheduler]
            batch_size = 10
            ceiling_policy = "fill_to_ceiling"

            [devices.constrained]
            max_concurrent_items = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.device, DeviceClass::Constrained);
        assert_eq!(config.default_collection, DEFAULT_COLLECTION);
        assert_eq!(config.scheduler.batch_size, 10);
        assert_eq!(config.scheduler.tick_interval_ms, 100);
        assert_eq!(config.scheduler.ceiling_policy, CeilingPolicy::FillToCeiling);
        assert_eq!(config.device_profile().max_concurrent_items, Some(25));
        assert_eq!(config.api.page_size, 100);
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let config = CanvasConfig::new().with_batch_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_intervals_are_rejected_but_never_reach_timers() {
        let mut config = CanvasConfig::new().with_tick_interval_ms(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(config.scheduler.tick_interval(), MIN_TIMER_INTERVAL);

        config.scheduler.tick_interval_ms = 100;
        config.eviction.memory_check_interval_ms = 0;
        assert!(config.validate().is_err());
        assert_eq!(config.eviction.memory_check_interval(), MIN_TIMER_INTERVAL);
    }

    #[test]
    fn test_validation_rejects_shrinking_override() {
        let config = CanvasConfig::new().with_constrained_profile(DeviceProfile::limited(50, 10, 20));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(
            CanvasConfig::from_toml("scheduler = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("canvas.toml");
        std::fs::write(&path, "default_collection = \"moodboard\"\n").unwrap();

        let config = CanvasConfig::load(&path).unwrap();
        assert_eq!(config.default_collection, "moodboard");

        assert!(matches!(
            CanvasConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
