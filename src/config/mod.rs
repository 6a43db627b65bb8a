//! Typed configuration.
//!
//! Process settings come from environment variables, loaded once at
//! startup. API credentials come from a local settings file, see
//! [`settings`]. Sensitive values are wrapped in `SecretString`.

pub mod settings;

pub use settings::{FeedCredentials, PublisherCredentials, Settings};

use crate::error::{Error, Result};
use crate::pipeline::{PollerConfig, WorkerConfig};
use secrecy::SecretString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    /// Postgres URL. Without one the relay runs on the in-memory store.
    pub database_url: Option<SecretString>,
    pub settings_path: PathBuf,
    pub bind_addr: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub poller: PollerConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let call_timeout = Duration::from_secs(parsed(&var, "CALL_TIMEOUT_SECONDS", 5)?);
        let worker_defaults = WorkerConfig::default();

        let worker = WorkerConfig {
            batch_size: parsed(&var, "BATCH_SIZE", worker_defaults.batch_size)?,
            lease: Duration::from_secs(parsed(&var, "LEASE_SECONDS", 30)?),
            retention: Duration::from_secs(parsed(&var, "RETENTION_HOURS", 72u64)? * 3600),
            max_deliveries: parsed(&var, "MAX_DELIVERIES", worker_defaults.max_deliveries)?,
            call_timeout,
            publish_timeout: Duration::from_secs(parsed(&var, "PUBLISH_TIMEOUT_SECONDS", 15)?),
        };
        // Publish, mark and delete must all finish inside one lease, or a slow
        // job is redelivered while its first attempt is still running.
        let job_budget = worker.publish_timeout + 2 * worker.call_timeout;
        if job_budget >= worker.lease {
            return Err(Error::Config(format!(
                "PUBLISH_TIMEOUT_SECONDS ({}s) + 2 x CALL_TIMEOUT_SECONDS ({}s) must be shorter than LEASE_SECONDS ({}s)",
                worker.publish_timeout.as_secs(),
                worker.call_timeout.as_secs(),
                worker.lease.as_secs()
            )));
        }
        if worker.batch_size == 0 {
            return Err(Error::Config("BATCH_SIZE must be at least 1".to_string()));
        }

        Ok(Self {
            database_url: var("DATABASE_URL")
                .filter(|url| !url.is_empty())
                .map(SecretString::from),
            settings_path: var("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("conf.json")),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            otel_endpoint: var("OTEL_ENDPOINT"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            poller: PollerConfig {
                call_timeout,
                fetch_timeout: Duration::from_secs(parsed(&var, "FEED_TIMEOUT_SECONDS", 10)?),
            },
            worker,
        })
    }
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {name} {raw:?}: {e}"))),
        None => Ok(default),
    }
}
