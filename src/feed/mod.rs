//! Hot-gallery feed source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::FeedCredentials;
use crate::error::{Error, Result};
use crate::model::FeedEntry;

pub const HOT_FEED_URL: &str = "https://api.imgur.com/3/gallery/hot/time/0.json";

/// Anything that can produce the current hot-gallery snapshot.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the snapshot, newest entry first.
    async fn fetch_hot_feed(&self) -> Result<Vec<FeedEntry>>;
}

// Gallery images and albums share these fields.
#[derive(Deserialize)]
struct GalleryItem {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Deserialize)]
struct GalleryResponse {
    #[serde(default)]
    data: Vec<GalleryItem>,
    success: bool,
    status: i64,
}

/// Parse a hot-gallery response body.
///
/// Schema mismatches are `Fetch` errors; a well-formed body that reports
/// failure is an `Upstream` error.
pub fn parse_hot_feed(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let response: GalleryResponse = serde_json::from_slice(body)
        .map_err(|e| Error::Fetch(format!("unexpected feed body: {e}")))?;

    if !response.success || response.status != 200 {
        return Err(Error::Upstream {
            status: response.status,
        });
    }

    Ok(response
        .data
        .into_iter()
        .map(|item| FeedEntry {
            id: item.id,
            title: item.title.unwrap_or_default(),
            cover_image_id: item.cover.filter(|cover| !cover.is_empty()),
            link: item.link.unwrap_or_default(),
        })
        .collect())
}

/// Feed source backed by the public gallery API.
pub struct ImgurFeed {
    client: reqwest::Client,
    url: String,
    credentials: FeedCredentials,
}

impl ImgurFeed {
    /// Build a feed client. Every request is bounded by `timeout`.
    pub fn new(credentials: FeedCredentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Fetch(format!("cannot build feed client: {e}")))?;
        Ok(Self {
            client,
            url: HOT_FEED_URL.to_string(),
            credentials,
        })
    }

    /// Point the client at a different endpoint.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl FeedSource for ImgurFeed {
    async fn fetch_hot_feed(&self) -> Result<Vec<FeedEntry>> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .header(
                AUTHORIZATION,
                format!("Client-ID {}", self.credentials.client_id.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("request to {} failed: {e}", self.url)))?;

        // Error statuses still carry the {success, status} envelope.
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("reading feed body failed: {e}")))?;

        parse_hot_feed(&body)
    }
}
