//! Remote content items
//!
//! An [`Item`] is one block of a remote collection. Items are immutable
//! once fetched: the fetcher owns the assembled list and everything
//! downstream reads it.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of an item, unique within a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Get the raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Coarse classification of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Image,
    Text,
    Link,
    EmbeddedCollection,
    Other,
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Image => write!(f, "image"),
            ItemKind::Text => write!(f, "text"),
            ItemKind::Link => write!(f, "link"),
            ItemKind::EmbeddedCollection => write!(f, "collection"),
            ItemKind::Other => write!(f, "other"),
        }
    }
}

/// One rendition of an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVersion {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageVersion {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Image renditions at the resolutions the API publishes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    pub thumb: Option<ImageVersion>,
    pub display: Option<ImageVersion>,
    pub large: Option<ImageVersion>,
    pub original: Option<ImageVersion>,
}

impl ImageSet {
    /// Best rendition for a tile: display, then large, then thumb
    pub fn tile_version(&self) -> Option<&ImageVersion> {
        self.display
            .as_ref()
            .or(self.large.as_ref())
            .or(self.thumb.as_ref())
    }
}

/// Where a link item points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSource {
    pub url: String,
    pub title: Option<String>,
}

/// Variant-specific item payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemContent {
    Image {
        images: ImageSet,
    },
    Text {
        content_html: Option<String>,
    },
    Link {
        source: Option<LinkSource>,
        images: Option<ImageSet>,
    },
    EmbeddedCollection {
        slug: String,
    },
    Other,
}

impl ItemContent {
    /// Classification of this payload
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemContent::Image { .. } => ItemKind::Image,
            ItemContent::Text { .. } => ItemKind::Text,
            ItemContent::Link { .. } => ItemKind::Link,
            ItemContent::EmbeddedCollection { .. } => ItemKind::EmbeddedCollection,
            ItemContent::Other => ItemKind::Other,
        }
    }
}

/// Who connected an item to the collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub connected_by_username: Option<String>,
    pub connected_by_user_slug: Option<String>,
}

/// A remote content unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: Option<String>,
    pub description_html: Option<String>,
    pub content: ItemContent,
    pub connected_at: Option<DateTime<Utc>>,
    pub attribution: Attribution,
}

impl Item {
    /// Create an item with no optional metadata
    pub fn new(id: impl Into<ItemId>, content: ItemContent) -> Self {
        Self {
            id: id.into(),
            title: None,
            description_html: None,
            content,
            connected_at: None,
            attribution: Attribution::default(),
        }
    }

    /// Create a text item, handy for tests and fixtures
    pub fn text(id: impl Into<ItemId>, html: impl Into<String>) -> Self {
        Self::new(
            id,
            ItemContent::Text {
                content_html: Some(html.into()),
            },
        )
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the connection timestamp
    pub fn with_connected_at(mut self, at: DateTime<Utc>) -> Self {
        self.connected_at = Some(at);
        self
    }

    /// Set attribution
    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.content.kind()
    }

    /// Slug of the nested collection, for embedded collection items
    pub fn embedded_slug(&self) -> Option<&str> {
        match &self.content {
            ItemContent::EmbeddedCollection { slug } => Some(slug),
            _ => None,
        }
    }
}
