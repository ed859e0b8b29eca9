//! JSON shapes of the remote API
//!
//! Only the fields the canvas reads are modelled; everything else in the
//! payload is ignored. Conversion into [`Item`] happens here so the rest of
//! the workspace never sees wire types.

use blockcanvas_core::{
    Attribution, ImageSet, ImageVersion, Item, ItemContent, ItemId, LinkSource,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `GET /channels/{slug}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiChannel {
    /// Total number of blocks in the channel
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub title: Option<String>,
}

/// `GET /channels/{slug}/contents`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiContents {
    #[serde(default)]
    pub contents: Vec<ApiBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiImageVersion {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiImage {
    pub thumb: Option<ApiImageVersion>,
    pub display: Option<ApiImageVersion>,
    pub large: Option<ApiImageVersion>,
    pub original: Option<ApiImageVersion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSource {
    pub url: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiBlock {
    pub id: u64,
    /// Block class: `Image`, `Text`, `Link`, `Channel`, `Media`, `Attachment`
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description_html: Option<String>,
    #[serde(default)]
    pub content_html: Option<String>,
    #[serde(default)]
    pub image: Option<ApiImage>,
    #[serde(default)]
    pub source: Option<ApiSource>,
    /// Set on embedded channel blocks
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub connected_at: Option<String>,
    #[serde(default)]
    pub connected_by_username: Option<String>,
    #[serde(default)]
    pub connected_by_user_slug: Option<String>,
}

fn convert_version(version: Option<ApiImageVersion>) -> Option<ImageVersion> {
    let version = version?;
    let mut converted = ImageVersion::new(version.url?);
    converted.width = version.width;
    converted.height = version.height;
    Some(converted)
}

impl From<ApiImage> for ImageSet {
    fn from(image: ApiImage) -> Self {
        ImageSet {
            thumb: convert_version(image.thumb),
            display: convert_version(image.display),
            large: convert_version(image.large),
            original: convert_version(image.original),
        }
    }
}

impl ApiBlock {
    fn class_is(&self, name: &str) -> bool {
        self.class
            .as_deref()
            .is_some_and(|class| class.eq_ignore_ascii_case(name))
    }

    fn content(&mut self) -> ItemContent {
        if self.class_is("Channel") {
            if let Some(slug) = self.slug.take() {
                return ItemContent::EmbeddedCollection { slug };
            }
            return ItemContent::Other;
        }
        if self.class_is("Link") {
            let source = self.source.take().and_then(|source| {
                source.url.map(|url| LinkSource {
                    url,
                    title: source.title,
                })
            });
            return ItemContent::Link {
                source,
                images: self.image.take().map(ImageSet::from),
            };
        }
        if self.class_is("Text") {
            return ItemContent::Text {
                content_html: self.content_html.take(),
            };
        }
        match self.image.take() {
            Some(image) => ItemContent::Image {
                images: image.into(),
            },
            None => ItemContent::Other,
        }
    }
}

impl From<ApiBlock> for Item {
    fn from(mut block: ApiBlock) -> Self {
        let content = block.content();
        let connected_at = block
            .connected_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc));

        Item {
            id: ItemId(block.id),
            title: block.title,
            description_html: block.description_html,
            content,
            connected_at,
            attribution: Attribution {
                connected_by_username: block.connected_by_username,
                connected_by_user_slug: block.connected_by_user_slug,
            },
        }
    }
}
