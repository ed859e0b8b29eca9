//! # Block Canvas Core
//!
//! Core types shared by every Block Canvas crate.
//!
//! The canvas renders the items of a remote collection as free-floating
//! tiles. This crate holds the pieces every layer agrees on:
//!
//! ## Key Types
//!
//! - [`Item`]: A remote content unit (image, text, link, embedded collection)
//! - [`LayoutEntry`] / [`LayoutMap`]: Per-item position and rotation
//! - [`DisplayOrder`]: Z-stacking and load sequence of item ids
//! - [`CollectionSnapshot`]: The persisted record for one collection
//! - [`VisitRecord`]: One entry of the visit history
//! - [`Viewport`] / [`Footprint`] / [`Rect`]: Screen-space geometry
//!
//! ## Key Traits
//!
//! - [`Clock`]: Time abstraction for testability

pub mod clock;
pub mod error;
pub mod geometry;
pub mod item;
pub mod layout;
pub mod snapshot;

pub use clock::*;
pub use error::*;
pub use geometry::*;
pub use item::*;
pub use layout::*;
pub use snapshot::*;
