//! Core data model.
//!
//! A feed entry is what the gallery hands us. A publish job is what the
//! poller queues for it. A seen marker is what the worker leaves behind once
//! the entry has been announced. All three share one key: the feed's entry id.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum title length in characters, ellipsis included.
pub const TITLE_LIMIT: usize = 90;

/// Appended to titles cut at [`TITLE_LIMIT`].
pub const ELLIPSIS: char = '…';

/// How long a published id stays suppressed by default.
pub const DEFAULT_RETENTION: std::time::Duration = std::time::Duration::from_secs(72 * 60 * 60);

// ---------------------------------------------------------------------------
// Feed Entry
// ---------------------------------------------------------------------------

/// One entry of the hot-gallery snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Stable, feed-assigned id. Also the dedup and queue key.
    pub id: String,
    pub title: String,
    /// Cover image of an album. An empty string counts as absent.
    pub cover_image_id: Option<String>,
    pub link: String,
}

impl FeedEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            cover_image_id: None,
            link: link.into(),
        }
    }

    pub fn cover(mut self, cover_image_id: impl Into<String>) -> Self {
        self.cover_image_id = Some(cover_image_id.into());
        self
    }

    /// The cover-derived image URL, if the entry has a non-empty cover id.
    pub fn cover_link(&self) -> Option<String> {
        self.cover_image_id
            .as_deref()
            .filter(|cover| !cover.is_empty())
            .map(|cover| format!("http://i.imgur.com/{cover}.jpg"))
    }

    /// Canonical gallery page for this entry.
    pub fn gallery_url(&self) -> String {
        format!("https://imgur.com/gallery/{}", self.id)
    }
}

// ---------------------------------------------------------------------------
// Publish Job
// ---------------------------------------------------------------------------

/// A pending announcement. Serialized as the work queue payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishJob {
    pub id: String,
    pub rendered_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
}

impl PublishJob {
    /// Render the status text for an entry.
    pub fn from_entry(entry: &FeedEntry) -> Self {
        let cover = entry.cover_link();
        let link = cover.as_deref().unwrap_or(&entry.link);
        let rendered_status = format!(
            "{} {} ({})",
            truncate_title(&entry.title),
            link,
            entry.gallery_url()
        );

        Self {
            id: entry.id.clone(),
            rendered_status,
            media_ref: cover,
        }
    }
}

/// Cut a title to [`TITLE_LIMIT`] characters, ending in [`ELLIPSIS`] when cut.
pub fn truncate_title(title: &str) -> Cow<'_, str> {
    if title.chars().count() <= TITLE_LIMIT {
        return Cow::Borrowed(title);
    }
    let mut cut: String = title.chars().take(TITLE_LIMIT - 1).collect();
    cut.push(ELLIPSIS);
    Cow::Owned(cut)
}

// ---------------------------------------------------------------------------
// Seen Marker
// ---------------------------------------------------------------------------

/// Record that an id has been published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenMarker {
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

impl SeenMarker {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Where an entry id is in the relay pipeline.
///
/// Never stored: derived from seen-marker and queue membership by
/// [`crate::pipeline::lifecycle_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// No job, no live marker.
    Unseen,
    /// Job queued, not leased.
    Queued,
    /// Job leased by a worker.
    Publishing,
    /// Live marker. Terminal until the marker expires.
    Published,
}

impl Lifecycle {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, to),
            (Unseen, Queued)
                | (Queued, Publishing)
                | (Publishing, Queued)      // lease expired without success
                | (Publishing, Published)
                | (Publishing, Unseen)      // dead-lettered
                | (Published, Unseen) // marker expired
        )
    }

    /// Check a transition, returning an error if disallowed.
    pub fn transition(self, to: Lifecycle) -> crate::error::Result<Lifecycle> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(crate::error::Error::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Lifecycle::Unseen => "unseen",
            Lifecycle::Queued => "queued",
            Lifecycle::Publishing => "publishing",
            Lifecycle::Published => "published",
        };
        write!(f, "{s}")
    }
}
