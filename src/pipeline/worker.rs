//! Worker: lease queued jobs, publish them, then mark seen and delete.
//!
//! Delivery to the publisher is at-least-once. A job that is leased but not
//! deleted (crash, publish failure, delete failure) becomes leasable again
//! once its lease runs out.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use super::{WorkerConfig, bounded};
use crate::error::{Error, Result};
use crate::model::{Lifecycle, PublishJob};
use crate::publish::Publisher;
use crate::store::{DedupStore, LeasedJob, MarkOutcome, WorkQueue};
use crate::telemetry::metrics;
use crate::telemetry::pipeline::{record_transition, start_job_span, start_process_span};

/// Record a transition on the job span, logging one the state machine rejects.
fn transition(span: &Span, from: Lifecycle, to: Lifecycle) {
    if let Err(e) = record_transition(span, from, to) {
        error!("{e}");
    }
}

/// Counts from one worker batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub leased: usize,
    pub published: usize,
    /// Left leased for a retry after lease expiry.
    pub failed: usize,
    /// Deleted after exhausting their deliveries.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Published,
    Failed,
    Dropped,
}

impl JobOutcome {
    fn label(self) -> &'static str {
        match self {
            JobOutcome::Published => "ok",
            JobOutcome::Failed => "error",
            JobOutcome::Dropped => "dropped",
        }
    }
}

pub struct Worker {
    store: Arc<dyn DedupStore>,
    queue: Arc<dyn WorkQueue>,
    publisher: Arc<dyn Publisher>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        store: Arc<dyn DedupStore>,
        queue: Arc<dyn WorkQueue>,
        publisher: Arc<dyn Publisher>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            publisher,
            config,
        }
    }

    /// Lease and process one batch.
    ///
    /// Only a failed lease call fails the batch. Each job is handled on its
    /// own: one job's failure never stops the others.
    pub async fn process_batch(&self) -> Result<BatchReport> {
        let run_id = Uuid::new_v4();
        async {
            let started = Instant::now();

            let jobs = bounded(
                self.config.call_timeout,
                "lease",
                self.queue.lease(self.config.batch_size, self.config.lease),
            )
            .await
            .inspect_err(|e| error!("could not lease jobs: {e}"))?;
            Span::current().record("relay.leased", jobs.len());

            let mut report = BatchReport {
                leased: jobs.len(),
                ..BatchReport::default()
            };
            for job in jobs {
                let outcome = self.handle(job).await;
                metrics::jobs_published().add(1, &[KeyValue::new("result", outcome.label())]);
                match outcome {
                    JobOutcome::Published => report.published += 1,
                    JobOutcome::Failed => report.failed += 1,
                    JobOutcome::Dropped => report.dropped += 1,
                }
            }

            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            metrics::operation_duration_ms()
                .record(elapsed_ms, &[KeyValue::new("operation", "process")]);
            if report.leased > 0 {
                info!(
                    leased = report.leased,
                    published = report.published,
                    failed = report.failed,
                    dropped = report.dropped,
                    "batch finished"
                );
            }
            Ok(report)
        }
        .instrument(start_process_span(&run_id))
        .await
    }

    async fn handle(&self, leased: LeasedJob) -> JobOutcome {
        let span = start_job_span(&leased.id, leased.deliveries);
        transition(&span, Lifecycle::Queued, Lifecycle::Publishing);

        async {
            let job: PublishJob = match serde_json::from_value(leased.payload.clone()) {
                Ok(job) => job,
                Err(source) => {
                    let err = Error::Decode {
                        id: leased.id.clone(),
                        source,
                    };
                    return self.retry_or_drop(&leased, &span, err).await;
                }
            };

            // Media is not attached yet; the publisher accepts it for later use.
            if let Err(e) = bounded(
                self.config.publish_timeout,
                "publish",
                self.publisher.publish(&job.rendered_status, None),
            )
            .await
            {
                return self.retry_or_drop(&leased, &span, e).await;
            }

            match bounded(
                self.config.call_timeout,
                "mark seen",
                self.store.mark_seen(&leased.id, self.config.retention),
            )
            .await
            {
                Ok(MarkOutcome::Marked) => {}
                Ok(MarkOutcome::AlreadyMarked) => debug!("seen-marker already present"),
                // Already published: still delete so it is not sent again.
                Err(e) => warn!("published but could not write seen-marker: {e}"),
            }
            transition(&span, Lifecycle::Publishing, Lifecycle::Published);

            if let Err(e) = bounded(
                self.config.call_timeout,
                "delete",
                self.queue.delete(&leased.id),
            )
            .await
            {
                error!("published but could not delete job, it may be redelivered: {e}");
            }
            JobOutcome::Published
        }
        .instrument(span.clone())
        .await
    }

    /// Leave a failed job for redelivery, or drop it once it has used up its
    /// deliveries.
    async fn retry_or_drop(&self, leased: &LeasedJob, span: &Span, err: Error) -> JobOutcome {
        if leased.deliveries < self.config.max_deliveries {
            warn!(
                deliveries = leased.deliveries,
                "job failed, retried after lease expiry: {err}"
            );
            return JobOutcome::Failed;
        }

        match bounded(
            self.config.call_timeout,
            "delete",
            self.queue.delete(&leased.id),
        )
        .await
        {
            Ok(()) => {
                error!(
                    deliveries = leased.deliveries,
                    "job dropped after exhausting deliveries: {err}"
                );
                transition(span, Lifecycle::Publishing, Lifecycle::Unseen);
                JobOutcome::Dropped
            }
            Err(e) => {
                error!("job exhausted deliveries but could not be dropped: {err}; delete: {e}");
                JobOutcome::Failed
            }
        }
    }
}
