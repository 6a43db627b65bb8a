//! Work queue operations over the `publish_jobs` table.
//!
//! A lease is a visibility timeout: `leased_until` hides a job from other
//! workers until it passes, after which the job is handed out again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use std::time::Duration;

use super::{Db, as_secs};
use crate::error::{Error, Result};
use crate::store::{EnqueueOutcome, JobStatus, LeasedJob, WorkQueue};
use crate::telemetry::metrics;

fn queue_error(e: sqlx::Error) -> Error {
    Error::Queue(e.to_string())
}

fn count_operation(operation: &'static str) {
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("queue", "publish_jobs"),
            KeyValue::new("operation", operation),
        ],
    );
}

#[async_trait]
impl WorkQueue for Db {
    async fn enqueue_if_absent(
        &self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<EnqueueOutcome> {
        // The marker check and the insert share one statement. The worker
        // writes the marker before deleting the job, so a job deleted after
        // publishing is not re-inserted while its marker is live.
        let (seen, inserted): (bool, bool) = sqlx::query_as(
            "WITH live AS (
                 SELECT EXISTS (
                     SELECT 1 FROM seen_markers WHERE id = $1 AND expires_at > now()
                 ) AS seen
             ),
             ins AS (
                 INSERT INTO publish_jobs (id, payload)
                 SELECT $1::text, $2::jsonb FROM live WHERE NOT live.seen
                 ON CONFLICT (id) DO NOTHING
                 RETURNING id
             )
             SELECT (SELECT seen FROM live), EXISTS (SELECT 1 FROM ins)",
        )
        .bind(id)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await
        .map_err(queue_error)?;

        let outcome = match (seen, inserted) {
            (true, _) => EnqueueOutcome::AlreadySeen,
            (false, true) => EnqueueOutcome::Added,
            (false, false) => EnqueueOutcome::AlreadyQueued,
        };
        count_operation(match outcome {
            EnqueueOutcome::Added => "enqueue",
            EnqueueOutcome::AlreadyQueued => "enqueue_duplicate",
            EnqueueOutcome::AlreadySeen => "enqueue_seen",
        });
        Ok(outcome)
    }

    async fn lease(&self, max: usize, lease: Duration) -> Result<Vec<LeasedJob>> {
        // SKIP LOCKED keeps concurrent leasers from ever handing out the same row.
        let mut rows = sqlx::query_as::<_, (String, serde_json::Value, i32, DateTime<Utc>)>(
            "UPDATE publish_jobs
             SET leased_until = now() + make_interval(secs => $2),
                 deliveries = deliveries + 1
             WHERE id IN (
                 SELECT id FROM publish_jobs
                 WHERE leased_until IS NULL OR leased_until <= now()
                 ORDER BY enqueued_at, id
                 LIMIT $1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, payload, deliveries, enqueued_at",
        )
        .bind(i64::try_from(max).unwrap_or(i64::MAX))
        .bind(as_secs(lease))
        .fetch_all(&self.pool)
        .await
        .map_err(queue_error)?;

        // RETURNING does not preserve the subquery's order.
        rows.sort_by(|a, b| a.3.cmp(&b.3).then_with(|| a.0.cmp(&b.0)));

        count_operation(if rows.is_empty() { "lease_empty" } else { "lease" });

        Ok(rows
            .into_iter()
            .map(|(id, payload, deliveries, _)| LeasedJob {
                id,
                payload,
                deliveries: deliveries.max(0) as u32,
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM publish_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(queue_error)?;
        count_operation("delete");
        Ok(())
    }

    async fn status(&self, id: &str) -> Result<Option<JobStatus>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT leased_until IS NOT NULL AND leased_until > now()
             FROM publish_jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(queue_error)?;

        Ok(row.map(|(leased,)| {
            if leased {
                JobStatus::Leased
            } else {
                JobStatus::Ready
            }
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.health_check().await
    }
}
