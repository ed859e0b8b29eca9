//! Error types for Block Canvas core types

use thiserror::Error;

use crate::item::ItemId;

/// Errors raised when constructing or validating core types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Collection key must not be empty")]
    EmptyKey,

    #[error("Duplicate item id in display order: {0}")]
    DuplicateId(ItemId),

    #[error("Display order references unknown item: {0}")]
    UnknownId(ItemId),

    #[error("Display order has {actual} ids, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}
