//! API credentials from a local settings file.
//!
//! JSON (`conf.json`) or TOML, picked by file extension. A missing or
//! unreadable file is not fatal: the relay starts with empty credentials and
//! the feed and publisher calls fail downstream instead.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// On-disk shape of the settings file. Unknown keys are ignored.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    #[serde(rename = "feedClientID", alias = "imgurClientID")]
    feed_client_id: Option<String>,
    #[serde(rename = "feedClientSecret", alias = "imgurClientSecret")]
    feed_client_secret: Option<String>,
    #[serde(rename = "publisherAPIKey", alias = "twitterAPIKey")]
    publisher_api_key: Option<String>,
    #[serde(rename = "publisherAPISecret", alias = "twitterAPISecret")]
    publisher_api_secret: Option<String>,
    #[serde(rename = "publisherAccessToken", alias = "twitterAccessToken")]
    publisher_access_token: Option<String>,
    #[serde(
        rename = "publisherAccessTokenSecret",
        alias = "twitterAccessTokenSecret"
    )]
    publisher_access_token_secret: Option<String>,
}

/// Recognized settings, secrets wrapped.
#[derive(Debug, Default)]
pub struct Settings {
    pub feed_client_id: Option<SecretString>,
    pub feed_client_secret: Option<SecretString>,
    pub publisher_api_key: Option<SecretString>,
    pub publisher_api_secret: Option<SecretString>,
    pub publisher_access_token: Option<SecretString>,
    pub publisher_access_token_secret: Option<SecretString>,
}

impl From<RawSettings> for Settings {
    fn from(raw: RawSettings) -> Self {
        Self {
            feed_client_id: raw.feed_client_id.map(SecretString::from),
            feed_client_secret: raw.feed_client_secret.map(SecretString::from),
            publisher_api_key: raw.publisher_api_key.map(SecretString::from),
            publisher_api_secret: raw.publisher_api_secret.map(SecretString::from),
            publisher_access_token: raw.publisher_access_token.map(SecretString::from),
            publisher_access_token_secret: raw
                .publisher_access_token_secret
                .map(SecretString::from),
        }
    }
}

/// Credentials for the gallery feed.
#[derive(Debug)]
pub struct FeedCredentials {
    pub client_id: SecretString,
}

/// OAuth 1.0a credentials for the publisher.
#[derive(Debug)]
pub struct PublisherCredentials {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub access_token: SecretString,
    pub access_token_secret: SecretString,
}

fn or_empty(secret: &Option<SecretString>) -> SecretString {
    let exposed = secret.as_ref().map(|s| s.expose_secret()).unwrap_or_default();
    SecretString::from(exposed.to_owned())
}

impl Settings {
    /// Parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let bad = |e: String| Error::Config(format!("bad settings file {}: {e}", path.display()));
        let raw: RawSettings = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content).map_err(|e| bad(e.to_string()))?
        } else {
            serde_json::from_str(&content).map_err(|e| bad(e.to_string()))?
        };
        Ok(raw.into())
    }

    /// Parse a settings file, falling back to empty credentials on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                info!(path = %path.display(), "settings loaded");
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), "could not read settings, using empty credentials: {e}");
                Self::default()
            }
        }
    }

    pub fn feed_credentials(&self) -> FeedCredentials {
        FeedCredentials {
            client_id: or_empty(&self.feed_client_id),
        }
    }

    pub fn publisher_credentials(&self) -> PublisherCredentials {
        PublisherCredentials {
            consumer_key: or_empty(&self.publisher_api_key),
            consumer_secret: or_empty(&self.publisher_api_secret),
            access_token: or_empty(&self.publisher_access_token),
            access_token_secret: or_empty(&self.publisher_access_token_secret),
        }
    }
}
