//! JSONL logging for Block Canvas
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines on the console (default) or in files
//! - **Collection Context**: Spans opened under a [`CollectionContextGuard`]
//!   carry the collection they belong to
//! - **Status Panel**: Events with target `"panel"` are copied into a bounded
//!   [`LogPanel`] that front ends show and clear
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use blockcanvas_logging::{CanvasSubscriberBuilder, LogConfig};
//!
//! let logging = CanvasSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//!
//! tracing::info!(target: "panel", "Loading collection");
//! for entry in logging.panel().map(|p| p.entries()).unwrap_or_default() {
//!     println!("{entry}");
//! }
//! ```

pub mod config;
pub mod context;
pub mod layers;
pub mod panel;

pub use config::{
    ConsoleConfig, DEFAULT_PANEL_CAPACITY, FileConfig, JsonlConfig, LogConfig, PanelConfig,
    RotationStrategy,
};
pub use context::{CollectionContextData, CollectionContextGuard};
pub use layers::{CollectionContextExtension, CollectionContextLayer};
pub use panel::{LogPanel, PANEL_TARGET, PanelEntry, PanelLayer, PanelLevel};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Layer type the builder assembles
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Errors raised while setting up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log appender error: {0}")]
    Appender(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Keeps file output and the panel alive
///
/// Dropping it flushes and stops the file writer.
#[must_use = "dropping the handle stops file output"]
pub struct LoggingHandle {
    panel: Option<LogPanel>,
    _file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    /// The panel feed, unless disabled in the config
    pub fn panel(&self) -> Option<&LogPanel> {
        self.panel.as_ref()
    }
}

/// Builder for configuring and initializing the logging subscriber
///
/// Console output is JSONL by default. Use [`LogConfig::development`] for
/// human-readable output.
pub struct CanvasSubscriberBuilder {
    config: LogConfig,
}

impl CanvasSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn with_panel(mut self, enabled: bool) -> Self {
        self.config.panel.enabled = enabled;
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Assemble the layers without installing them
    ///
    /// Useful for scoped subscribers via `tracing::subscriber::with_default`.
    pub fn build(self) -> Result<(Vec<BoxedLayer>, LoggingHandle), LoggingError> {
        let config = self.config;
        let mut stack: Vec<BoxedLayer> = vec![CollectionContextLayer::new().boxed()];

        if config.console.enabled {
            let level = config
                .console
                .level
                .as_deref()
                .unwrap_or(&config.default_level);
            let filter = env_filter(level);
            let console = if config.console.pretty {
                tracing_subscriber::fmt::layer()
                    .with_ansi(config.console.ansi)
                    .with_target(true)
                    .with_filter(filter)
                    .boxed()
            } else {
                layers::jsonl_layer(std::io::stdout, &config.jsonl, filter)
            };
            stack.push(console);
        }

        let mut file_guard = None;
        if let Some(file_config) = &config.file {
            let (writer, guard) = file_writer(file_config)?;
            file_guard = Some(guard);
            stack.push(layers::jsonl_layer(
                writer,
                &config.jsonl,
                env_filter(&config.default_level),
            ));
        }

        let panel = config
            .panel
            .enabled
            .then(|| LogPanel::new(config.panel.capacity));
        if let Some(panel) = &panel {
            stack.push(panel.layer().boxed());
        }

        Ok((
            stack,
            LoggingHandle {
                panel,
                _file_guard: file_guard,
            },
        ))
    }

    /// Install the subscriber globally
    ///
    /// Fails if a global subscriber has already been set.
    pub fn init(self) -> Result<LoggingHandle, LoggingError> {
        let (layers, handle) = self.build()?;
        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(handle)
    }
}

impl Default for CanvasSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// RUST_LOG if set, otherwise `level`
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Non-blocking writer for file output
///
/// `Never` truncates a single file; the rotating strategies append.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Install logging for tests: warnings only, no panel
///
/// Safe to call repeatedly; later calls do nothing.
pub fn init_testing() {
    let _ = CanvasSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
