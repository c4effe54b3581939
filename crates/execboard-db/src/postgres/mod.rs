//! PostgreSQL data access layer.

mod applications;
mod jobs;
mod messages;
mod notifications;
mod payments;
pub mod pool;
mod profiles;
mod rows;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::DbResult;
use crate::repos::StoreHealth;

pub use pool::{create_pool, run_migrations};

/// Repository implementation over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Convert a row count to the unsigned totals used in pages.
pub(crate) fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}
