//! # gallery-relay
//!
//! Polls a hot-gallery feed and republishes each new entry as a social
//! status exactly once, even though polling and publishing run on separate
//! schedules and retry independently.
//!
//! The poller enqueues unseen entries into a lease-based work queue; the
//! worker leases jobs, publishes them, then records the id in a dedup store
//! and deletes the job. Both stores are available in memory and on Postgres.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod server;
pub mod store;
pub mod telemetry;
