//! Span helpers for poll runs, worker batches and individual jobs.

use tracing::Span;
use uuid::Uuid;

use crate::error::Result;
use crate::model::Lifecycle;

/// Start a span covering one poller run.
pub fn start_poll_span(run_id: &Uuid) -> Span {
    tracing::info_span!(
        "relay.poll",
        "relay.run_id" = %run_id,
        "relay.entries" = tracing::field::Empty,
    )
}

/// Start a span covering one worker batch.
pub fn start_process_span(run_id: &Uuid) -> Span {
    tracing::info_span!(
        "relay.process",
        "relay.run_id" = %run_id,
        "relay.leased" = tracing::field::Empty,
    )
}

/// Start a span for a single leased job.
pub fn start_job_span(job_id: &str, deliveries: u32) -> Span {
    tracing::info_span!(
        "relay.job",
        "relay.job_id" = job_id,
        "relay.deliveries" = deliveries,
        "relay.state" = tracing::field::Empty,
    )
}

/// Record a lifecycle transition on a job span.
///
/// A disallowed transition is not recorded and comes back as
/// [`crate::error::Error::InvalidTransition`].
pub fn record_transition(span: &Span, from: Lifecycle, to: Lifecycle) -> Result<Lifecycle> {
    let to = from.transition(to)?;
    span.record("relay.state", tracing::field::display(to));
    span.in_scope(|| {
        tracing::info!(%from, %to, "state_transition");
    });
    Ok(to)
}
