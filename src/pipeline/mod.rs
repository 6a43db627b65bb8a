//! The relay pipeline: poll → dedup → enqueue → lease → publish → mark seen.
//!
//! The poller and the worker are stateless between runs and never talk to
//! each other directly. The dedup store and work queue are their only
//! shared state.

pub mod poller;
pub mod schedule;
pub mod worker;

pub use poller::{PollReport, Poller};
pub use schedule::Scheduler;
pub use worker::{BatchReport, Worker};

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{DEFAULT_RETENTION, Lifecycle};
use crate::store::{DedupStore, JobStatus, Presence, WorkQueue};

/// Poller tunables.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Deadline for each dedup store and work queue call.
    pub call_timeout: Duration,
    /// Deadline for the feed fetch.
    pub fetch_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Worker tunables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs leased per batch.
    pub batch_size: usize,
    /// Lease duration. Must cover one publish attempt.
    pub lease: Duration,
    /// How long a published id stays suppressed.
    pub retention: Duration,
    /// Deliveries after which a still-failing job is dropped.
    pub max_deliveries: u32,
    /// Deadline for each dedup store and work queue call.
    pub call_timeout: Duration,
    /// Deadline for the publisher call. `publish_timeout + 2 * call_timeout`
    /// must stay under `lease`.
    pub publish_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            lease: Duration::from_secs(30),
            retention: DEFAULT_RETENTION,
            max_deliveries: 5,
            call_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(15),
        }
    }
}

/// Run `fut` with a deadline, turning expiry into [`Error::Timeout`].
pub(crate) async fn bounded<T>(
    limit: Duration,
    operation: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout { operation })?
}

/// Derive an id's lifecycle state from store and queue membership.
///
/// A live seen-marker wins over a leftover job: once published, a job that
/// failed to delete is only a redelivery risk, not pending work.
pub async fn lifecycle_of(
    store: &dyn DedupStore,
    queue: &dyn WorkQueue,
    id: &str,
) -> Result<Lifecycle> {
    if store.lookup(id).await? == Presence::Seen {
        return Ok(Lifecycle::Published);
    }
    Ok(match queue.status(id).await? {
        None => Lifecycle::Unseen,
        Some(JobStatus::Ready) => Lifecycle::Queued,
        Some(JobStatus::Leased) => Lifecycle::Publishing,
    })
}
