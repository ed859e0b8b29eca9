//! # Block Canvas Fetch
//!
//! Fetches a remote collection page by page and seeds a random layout for
//! a fresh load.
//!
//! ## Key Types
//!
//! - [`CollectionApi`]: The remote API seam
//! - [`HttpCollectionApi`]: `reqwest` implementation with bearer auth
//! - [`CollectionFetcher`]: Concurrent all-settled pagination
//! - [`MockCollectionApi`]: Scripted API for tests

pub mod api;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod mock;
pub mod seed;
pub mod wire;

pub use api::{CollectionApi, CollectionMeta};
pub use error::FetchError;
pub use fetcher::{CollectionFetcher, FetchedCollection, FetcherConfig};
pub use http::{ApiConfig, DEFAULT_BASE_URL, HttpCollectionApi};
pub use mock::MockCollectionApi;
pub use seed::{MAX_SCATTER_ROTATION, random_entry, scatter};
