//! Error types for gallery-relay.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The feed could not be reached or its body did not match the schema.
    #[error("feed fetch failed: {0}")]
    Fetch(String),

    /// The feed answered but reported failure.
    #[error("feed reported failure (status {status})")]
    Upstream { status: i64 },

    #[error("dedup store error: {0}")]
    Store(String),

    #[error("work queue error: {0}")]
    Queue(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("malformed job payload for {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
