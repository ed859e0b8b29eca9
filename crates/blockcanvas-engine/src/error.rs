//! Error types for blockcanvas-engine

use blockcanvas_core::{CollectionKey, ItemId};
use thiserror::Error;

use crate::surface::ElementHandle;

/// Errors that abort a navigation
///
/// Everything else (page failures, cache write failures, per-item
/// materialization failures) is logged and absorbed where it happens.
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Metadata could not be fetched or the collection has no items
    #[error("No collection found for \"{0}\"")]
    NoCollectionFound(CollectionKey),
}

/// Errors raised by a [`Surface`](crate::Surface)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    /// The handle does not refer to a live element
    #[error("Unknown element: {0:?}")]
    UnknownElement(ElementHandle),

    /// The surface refused to build an element for the item
    #[error("Cannot materialize item {item}: {reason}")]
    Rejected { item: ItemId, reason: String },
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("I/O error: {0}")]
    Io(String),

    /// The config file is not valid TOML for [`CanvasConfig`](crate::CanvasConfig)
    #[error("Parse error: {0}")]
    Parse(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a new Invalid error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
