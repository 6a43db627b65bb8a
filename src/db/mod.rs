//! Postgres-backed dedup store and work queue.
//!
//! Both live in the same database and share one connection pool, so any
//! number of relay processes can poll and publish against them concurrently.

pub mod queue;
pub mod seen;

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use crate::error::{Error, Result};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const POOL_SIZE: u32 = 10;

/// Owns the pool. Implements [`crate::store::DedupStore`] and
/// [`crate::store::WorkQueue`].
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(POOL_SIZE)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Create or upgrade the `publish_jobs` and `seen_markers` tables.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<Postgres, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// Postgres intervals take fractional seconds.
fn as_secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}
