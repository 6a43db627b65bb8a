//! Metric instrument factories for gallery-relay.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("gallery-relay")
}

/// Counter: feed entries seen by the poller.
/// Labels: `result` ("enqueued" | "already_queued" | "seen" | "error").
pub fn feed_entries() -> Counter<u64> {
    meter()
        .u64_counter("relay.feed.entries")
        .with_description("Feed entries reconciled by the poller")
        .build()
}

/// Counter: work queue operations.
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("relay.queue.operations")
        .with_description("Number of work queue operations")
        .build()
}

/// Counter: publish attempts by outcome.
/// Labels: `result` ("ok" | "error" | "dropped").
pub fn jobs_published() -> Counter<u64> {
    meter()
        .u64_counter("relay.jobs.published")
        .with_description("Publish attempts by outcome")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("relay.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
