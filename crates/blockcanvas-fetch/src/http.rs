//! HTTP implementation of [`CollectionApi`]

use std::time::Duration;

use async_trait::async_trait;
use blockcanvas_core::{CollectionKey, Item};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::api::{CollectionApi, CollectionMeta};
use crate::error::FetchError;
use crate::wire::{ApiChannel, ApiContents};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.are.na/v2";

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API root, without a trailing slash
    pub base_url: String,
    /// Bearer token sent with every request
    pub access_token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Items requested per page
    pub page_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            timeout_secs: 30,
            page_size: 100,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// [`CollectionApi`] over HTTPS with bearer authentication
#[derive(Debug, Clone)]
pub struct HttpCollectionApi {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpCollectionApi {
    /// Build a client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("blockcanvas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::InvalidConfig(e.to_string()))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FetchError::InvalidConfig(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidConfig(format!(
                "{} cannot be a base URL",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
        })
    }

    /// `{base}/channels/{key}` plus an optional trailing segment
    ///
    /// The key is pushed as a single percent-encoded segment, so it can
    /// never leave the channel path or add a query.
    fn channel_url(&self, key: &CollectionKey, tail: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("channels")
                .push(key.as_str())
                .extend(tail);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, usize)],
    ) -> Result<T, FetchError> {
        let mut request = self.client.get(url.clone()).query(query);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        trace!(url = %url, bytes = body.len(), "Received response");
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl CollectionApi for HttpCollectionApi {
    async fn collection_meta(&self, key: &CollectionKey) -> Result<CollectionMeta, FetchError> {
        let channel: ApiChannel = self.get_json(self.channel_url(key, None), &[]).await?;
        debug!(collection = %key, length = channel.length, "Fetched collection metadata");
        Ok(CollectionMeta::new(channel.length, channel.title))
    }

    async fn items_page(
        &self,
        key: &CollectionKey,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Item>, FetchError> {
        let url = self.channel_url(key, Some("contents"));
        let contents: ApiContents = self
            .get_json(url, &[("per", per_page), ("page", page)])
            .await?;
        Ok(contents.contents.into_iter().map(Item::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url_strips_trailing_slash() {
        let config = ApiConfig::default().with_base_url("https://api.example/v2/");
        let api = HttpCollectionApi::new(&config).unwrap();
        let key = CollectionKey::new("moodboard").unwrap();
        assert_eq!(
            api.channel_url(&key, None).as_str(),
            "https://api.example/v2/channels/moodboard"
        );
        assert_eq!(
            api.channel_url(&key, Some("contents")).as_str(),
            "https://api.example/v2/channels/moodboard/contents"
        );
    }

    #[test]
    fn test_key_cannot_escape_channel_path() {
        let config = ApiConfig::default().with_base_url("https://api.example/v2");
        let api = HttpCollectionApi::new(&config).unwrap();

        let traversal = CollectionKey::new("a/../users/x").unwrap();
        let url = api.channel_url(&traversal, Some("contents"));
        assert_eq!(
            url.as_str(),
            "https://api.example/v2/channels/a%2F..%2Fusers%2Fx/contents"
        );

        let query = CollectionKey::new("foo?x=1").unwrap();
        let url = api.channel_url(&query, None);
        assert_eq!(url.path(), "/v2/channels/foo%3Fx=1");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = ApiConfig::default().with_base_url("not a url");
        assert!(matches!(
            HttpCollectionApi::new(&config),
            Err(FetchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_builders() {
        let config = ApiConfig::default()
            .with_access_token("secret")
            .with_page_size(50)
            .with_timeout_secs(5);
        assert_eq!(config.access_token.as_deref(), Some("secret"));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
