//! In-process store implementing both the dedup store and the work queue.
//!
//! Single-process only: state lives behind one mutex and dies with the
//! process. Time comes from the tokio clock, so tests can pause and advance it
//! to expire leases and markers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use super::{
    DedupStore, EnqueueOutcome, JobStatus, LeasedJob, MarkOutcome, Presence, WorkQueue,
};
use crate::error::{Error, Result};
use crate::model::SeenMarker;

struct QueuedJob {
    payload: serde_json::Value,
    seq: u64,
    deliveries: u32,
    leased_until: Option<Instant>,
}

impl QueuedJob {
    fn is_leased(&self, now: Instant) -> bool {
        self.leased_until.is_some_and(|until| now < until)
    }
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, QueuedJob>,
    /// Seen-marker expiry per id. Expired entries linger until purged.
    markers: HashMap<String, Instant>,
    next_seq: u64,
}

impl Inner {
    /// Expiry of `id`'s marker, if it is still live.
    fn live_marker(&self, id: &str, now: Instant) -> Option<Instant> {
        self.markers
            .get(id)
            .copied()
            .filter(|expires_at| now < *expires_at)
    }
}

/// Memory-backed [`DedupStore`] + [`WorkQueue`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Inner>, String> {
        self.inner
            .lock()
            .map_err(|_| "memory store lock poisoned".to_string())
    }

    /// Number of outstanding jobs, leased or not.
    pub fn queued_len(&self) -> Result<usize> {
        let inner = self.lock().map_err(Error::Queue)?;
        Ok(inner.jobs.len())
    }
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn lookup(&self, id: &str) -> Result<Presence> {
        let inner = self.lock().map_err(Error::Store)?;
        Ok(match inner.live_marker(id, Instant::now()) {
            Some(_) => Presence::Seen,
            None => Presence::Unseen,
        })
    }

    async fn marker(&self, id: &str) -> Result<Option<SeenMarker>> {
        let inner = self.lock().map_err(Error::Store)?;
        let now = Instant::now();
        let Some(expires_at) = inner.live_marker(id, now) else {
            return Ok(None);
        };
        // Expiry is kept on the monotonic clock; report it as wall time.
        let remaining = chrono::Duration::from_std(expires_at - now)
            .map_err(|e| Error::Store(format!("marker expiry out of range: {e}")))?;
        Ok(Some(SeenMarker {
            id: id.to_string(),
            expires_at: Utc::now() + remaining,
        }))
    }

    async fn mark_seen(&self, id: &str, ttl: Duration) -> Result<MarkOutcome> {
        let mut inner = self.lock().map_err(Error::Store)?;
        let now = Instant::now();
        if inner.live_marker(id, now).is_some() {
            return Ok(MarkOutcome::AlreadyMarked);
        }
        inner.markers.insert(id.to_string(), now + ttl);
        Ok(MarkOutcome::Marked)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut inner = self.lock().map_err(Error::Store)?;
        let now = Instant::now();
        let before = inner.markers.len();
        inner.markers.retain(|_, expires_at| now < *expires_at);
        Ok((before - inner.markers.len()) as u64)
    }
}

#[async_trait]
impl WorkQueue for MemoryStore {
    async fn enqueue_if_absent(
        &self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<EnqueueOutcome> {
        let mut inner = self.lock().map_err(Error::Queue)?;
        let now = Instant::now();
        if inner.live_marker(id, now).is_some() {
            return Ok(EnqueueOutcome::AlreadySeen);
        }
        if inner.jobs.contains_key(id) {
            return Ok(EnqueueOutcome::AlreadyQueued);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(
            id.to_string(),
            QueuedJob {
                payload,
                seq,
                deliveries: 0,
                leased_until: None,
            },
        );
        Ok(EnqueueOutcome::Added)
    }

    async fn lease(&self, max: usize, lease: Duration) -> Result<Vec<LeasedJob>> {
        let mut inner = self.lock().map_err(Error::Queue)?;
        let now = Instant::now();

        let mut ready: Vec<(u64, String)> = inner
            .jobs
            .iter()
            .filter(|(_, job)| !job.is_leased(now))
            .map(|(id, job)| (job.seq, id.clone()))
            .collect();
        ready.sort_unstable();
        ready.truncate(max);

        let mut leased = Vec::with_capacity(ready.len());
        for (_, id) in ready {
            if let Some(job) = inner.jobs.get_mut(&id) {
                job.leased_until = Some(now + lease);
                job.deliveries += 1;
                leased.push(LeasedJob {
                    payload: job.payload.clone(),
                    deliveries: job.deliveries,
                    id,
                });
            }
        }
        Ok(leased)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.lock().map_err(Error::Queue)?;
        inner.jobs.remove(id);
        Ok(())
    }

    async fn status(&self, id: &str) -> Result<Option<JobStatus>> {
        let inner = self.lock().map_err(Error::Queue)?;
        let now = Instant::now();
        Ok(inner.jobs.get(id).map(|job| {
            if job.is_leased(now) {
                JobStatus::Leased
            } else {
                JobStatus::Ready
            }
        }))
    }
}
