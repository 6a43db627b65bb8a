//! Coordination surface shared by the poller and the worker.
//!
//! The dedup store remembers which ids were published; the work queue holds
//! jobs waiting to be published. Both are keyed by feed entry id and must be
//! safe under concurrent callers: every mutation is atomic and add-if-absent
//! or lease-exclusive, so no external locking is needed.

pub mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::SeenMarker;

/// Whether an id has a live seen-marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Seen,
    Unseen,
}

/// Result of an add-if-absent seen-marker write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// A live marker was already there (racing duplicate).
    AlreadyMarked,
}

/// Result of an add-if-absent enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Added,
    /// A job with this id is already outstanding; queue state unchanged.
    AlreadyQueued,
    /// The id has a live seen-marker; nothing was queued.
    AlreadySeen,
}

/// Queue-side state of an outstanding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Ready,
    Leased,
}

/// A job handed out by [`WorkQueue::lease`].
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub id: String,
    pub payload: serde_json::Value,
    /// Number of times this job has been leased, this lease included.
    pub deliveries: u32,
}

/// Presence set of published ids with bounded retention.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn lookup(&self, id: &str) -> Result<Presence>;

    /// The live marker for `id`, with its expiry.
    async fn marker(&self, id: &str) -> Result<Option<SeenMarker>>;

    /// Record `id` as published for `ttl`. An expired marker counts as absent.
    async fn mark_seen(&self, id: &str, ttl: Duration) -> Result<MarkOutcome>;

    /// Drop expired markers. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Durable, lease-based queue of pending publish jobs.
///
/// Implementations share their key space with a [`DedupStore`]: enqueue
/// checks for a live seen-marker in the same atomic step as the insert.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Queue `id` unless a job for it is outstanding or it has a live
    /// seen-marker.
    async fn enqueue_if_absent(&self, id: &str, payload: serde_json::Value)
    -> Result<EnqueueOutcome>;

    /// Lease up to `max` ready jobs, oldest first, for `lease`. A job whose
    /// lease has run out is ready again.
    async fn lease(&self, max: usize, lease: Duration) -> Result<Vec<LeasedJob>>;

    /// Remove a job. Deleting an absent id is a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    async fn status(&self, id: &str) -> Result<Option<JobStatus>>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
