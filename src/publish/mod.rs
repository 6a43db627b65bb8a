//! Social-network publisher.
//!
//! The publisher is built once per process and handed to the worker; there
//! is no shared global client.

pub mod oauth;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::config::PublisherCredentials;
use crate::error::{Error, Result};

pub const STATUS_URL: &str = "https://api.twitter.com/2/tweets";

/// Posts a status message, optionally with media.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, status: &str, media: Option<&[u8]>) -> Result<()>;
}

/// Publisher for the v2 status endpoint, signed with OAuth 1.0a.
pub struct StatusPublisher {
    client: reqwest::Client,
    url: String,
    credentials: PublisherCredentials,
}

impl StatusPublisher {
    /// Build the HTTP client. Every request is bounded by `timeout`.
    pub fn new(credentials: PublisherCredentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Publish(format!("cannot build publisher client: {e}")))?;
        Ok(Self {
            client,
            url: STATUS_URL.to_string(),
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
impl Publisher for StatusPublisher {
    async fn publish(&self, status: &str, media: Option<&[u8]>) -> Result<()> {
        if media.is_some() {
            return Err(Error::Publish(
                "media attachments are not supported".to_string(),
            ));
        }

        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
        let authorization = oauth::authorization_header(
            "POST",
            &self.url,
            &[],
            &self.credentials,
            &oauth::RequestNonce {
                nonce: &nonce,
                timestamp,
            },
        )?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&serde_json::json!({ "text": status }))
            .send()
            .await
            .map_err(|e| Error::Publish(format!("request failed: {e}")))?;

        let code = response.status();
        if !code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Publish(format!("{code}: {body}")));
        }

        debug!(%code, "status posted");
        Ok(())
    }
}
