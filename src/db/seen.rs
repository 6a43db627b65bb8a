//! Seen-marker operations over the `seen_markers` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::{Db, as_secs};
use crate::error::{Error, Result};
use crate::model::SeenMarker;
use crate::store::{DedupStore, MarkOutcome, Presence};

fn store_error(e: sqlx::Error) -> Error {
    Error::Store(e.to_string())
}

#[async_trait]
impl DedupStore for Db {
    async fn lookup(&self, id: &str) -> Result<Presence> {
        let (seen,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM seen_markers WHERE id = $1 AND expires_at > now())",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(if seen {
            Presence::Seen
        } else {
            Presence::Unseen
        })
    }

    async fn marker(&self, id: &str) -> Result<Option<SeenMarker>> {
        let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, expires_at FROM seen_markers WHERE id = $1 AND expires_at > now()",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|(id, expires_at)| SeenMarker { id, expires_at }))
    }

    async fn mark_seen(&self, id: &str, ttl: Duration) -> Result<MarkOutcome> {
        // An expired row is overwritten; a live one is left alone.
        let written: Option<(String,)> = sqlx::query_as(
            "INSERT INTO seen_markers (id, expires_at)
             VALUES ($1, now() + make_interval(secs => $2))
             ON CONFLICT (id) DO UPDATE SET expires_at = EXCLUDED.expires_at
             WHERE seen_markers.expires_at <= now()
             RETURNING id",
        )
        .bind(id)
        .bind(as_secs(ttl))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(match written {
            Some(_) => MarkOutcome::Marked,
            None => MarkOutcome::AlreadyMarked,
        })
    }

    async fn purge_expired(&self) -> Result<u64> {
        let purged = sqlx::query("DELETE FROM seen_markers WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(store_error)?
            .rows_affected();
        Ok(purged)
    }
}
