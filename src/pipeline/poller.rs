//! Poller: reconcile the feed snapshot against the dedup store and queue
//! whatever has not been published yet.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use super::{PollerConfig, bounded};
use crate::error::Result;
use crate::feed::FeedSource;
use crate::model::{FeedEntry, Lifecycle, PublishJob};
use crate::store::{DedupStore, EnqueueOutcome, Presence, WorkQueue};
use crate::telemetry::metrics;
use crate::telemetry::pipeline::start_poll_span;

/// Counts from one poll run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub entries: usize,
    pub enqueued: usize,
    pub already_queued: usize,
    pub seen: usize,
    pub failed: usize,
}

/// What happened to a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryResult {
    Enqueued,
    AlreadyQueued,
    Seen,
    Failed,
}

impl EntryResult {
    fn label(self) -> &'static str {
        match self {
            EntryResult::Enqueued => "enqueued",
            EntryResult::AlreadyQueued => "already_queued",
            EntryResult::Seen => "seen",
            EntryResult::Failed => "error",
        }
    }
}

impl PollReport {
    fn record(&mut self, result: EntryResult) {
        match result {
            EntryResult::Enqueued => self.enqueued += 1,
            EntryResult::AlreadyQueued => self.already_queued += 1,
            EntryResult::Seen => self.seen += 1,
            EntryResult::Failed => self.failed += 1,
        }
    }
}

pub struct Poller {
    feed: Arc<dyn FeedSource>,
    store: Arc<dyn DedupStore>,
    queue: Arc<dyn WorkQueue>,
    config: PollerConfig,
}

impl Poller {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        store: Arc<dyn DedupStore>,
        queue: Arc<dyn WorkQueue>,
        config: PollerConfig,
    ) -> Self {
        Self {
            feed,
            store,
            queue,
            config,
        }
    }

    /// Run one poll.
    ///
    /// Only a failed feed fetch fails the run; per-entry store and queue
    /// errors are logged and the entry is left for the next run. Safe to run
    /// concurrently with itself and with worker batches.
    pub async fn poll(&self) -> Result<PollReport> {
        let run_id = Uuid::new_v4();
        async {
            let started = Instant::now();

            let entries = bounded(
                self.config.fetch_timeout,
                "feed fetch",
                self.feed.fetch_hot_feed(),
            )
            .await
            .inspect_err(|e| error!("feed fetch failed, aborting poll: {e}"))?;
            Span::current().record("relay.entries", entries.len());

            let mut report = PollReport {
                entries: entries.len(),
                ..PollReport::default()
            };

            // The feed is newest-first; announce in discovery order.
            for entry in entries.iter().rev() {
                let result = self.reconcile(entry).await;
                metrics::feed_entries().add(1, &[KeyValue::new("result", result.label())]);
                report.record(result);
            }

            match bounded(self.config.call_timeout, "marker purge", self.store.purge_expired())
                .await
            {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired seen-markers purged"),
                Err(e) => warn!("could not purge expired seen-markers: {e}"),
            }

            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            metrics::operation_duration_ms().record(elapsed_ms, &[KeyValue::new("operation", "poll")]);
            info!(
                entries = report.entries,
                enqueued = report.enqueued,
                already_queued = report.already_queued,
                seen = report.seen,
                failed = report.failed,
                "poll finished"
            );
            Ok(report)
        }
        .instrument(start_poll_span(&run_id))
        .await
    }

    async fn reconcile(&self, entry: &FeedEntry) -> EntryResult {
        let id = entry.id.as_str();

        match bounded(self.config.call_timeout, "dedup lookup", self.store.lookup(id)).await {
            Ok(Presence::Seen) => return EntryResult::Seen,
            Ok(Presence::Unseen) => {}
            Err(e) => {
                error!(id, "dedup lookup failed, skipping entry: {e}");
                return EntryResult::Failed;
            }
        }

        let job = PublishJob::from_entry(entry);
        let payload = match serde_json::to_value(&job) {
            Ok(payload) => payload,
            Err(e) => {
                error!(id, "could not encode job payload, skipping entry: {e}");
                return EntryResult::Failed;
            }
        };

        match bounded(
            self.config.call_timeout,
            "enqueue",
            self.queue.enqueue_if_absent(id, payload),
        )
        .await
        {
            Ok(EnqueueOutcome::Added) => {
                match Lifecycle::Unseen.transition(Lifecycle::Queued) {
                    Ok(to) => debug!(id, from = %Lifecycle::Unseen, %to, "state_transition"),
                    Err(e) => error!(id, "{e}"),
                }
                EntryResult::Enqueued
            }
            Ok(EnqueueOutcome::AlreadyQueued) => EntryResult::AlreadyQueued,
            // Published between our lookup and the enqueue.
            Ok(EnqueueOutcome::AlreadySeen) => EntryResult::Seen,
            Err(e) => {
                error!(id, "enqueue failed, entry retried next poll: {e}");
                EntryResult::Failed
            }
        }
    }
}
