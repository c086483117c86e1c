//! Where staged rows go.

use std::future::Future;

use sqlx::PgPool;
use traysync_core::FlatStockRow;

use crate::error::SinkError;

/// Destination for the rows of one run.
///
/// `clear` is called exactly once per run, before the first page is
/// requested. `insert_batch` is then called once per batch, sequentially,
/// and must return the number of rows written.
pub trait BatchSink {
    fn clear(&self) -> impl Future<Output = Result<(), SinkError>> + Send;

    fn insert_batch(
        &self,
        rows: &[FlatStockRow],
    ) -> impl Future<Output = Result<u64, SinkError>> + Send;
}

/// Writes to the Postgres `staging_products` table.
#[derive(Debug, Clone)]
pub struct PgStagingSink {
    pool: PgPool,
}

impl PgStagingSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BatchSink for PgStagingSink {
    async fn clear(&self) -> Result<(), SinkError> {
        traysync_db::clear_staging_products(&self.pool).await?;
        Ok(())
    }

    async fn insert_batch(&self, rows: &[FlatStockRow]) -> Result<u64, SinkError> {
        let inserted = traysync_db::insert_staging_rows(&self.pool, rows).await?;
        tracing::debug!(rows = inserted, "batch staged");
        Ok(inserted)
    }
}
