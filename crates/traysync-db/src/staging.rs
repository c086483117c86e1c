//! Operations on the `staging_products` table.
//!
//! The table is a scratch copy of the catalog: it is truncated at the start of
//! every run and refilled batch by batch. Nothing here reads individual rows
//! back; downstream consumers query the table directly.

use sqlx::{PgPool, Postgres, QueryBuilder};
use traysync_core::FlatStockRow;

use crate::DbError;

/// Bound parameters per row in [`insert_staging_rows`].
const COLUMNS_PER_ROW: usize = 18;

/// Postgres caps a statement at 65 535 bind parameters.
pub const MAX_ROWS_PER_STATEMENT: usize = 65_535 / COLUMNS_PER_ROW;

/// Empties the staging table. Safe to call on an already empty table.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn clear_staging_products(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("TRUNCATE TABLE staging_products")
        .execute(pool)
        .await?;
    tracing::info!("staging_products truncated");
    Ok(())
}

/// Inserts `rows` with multi-row `INSERT` statements and returns the number of
/// rows written.
///
/// A batch larger than [`MAX_ROWS_PER_STATEMENT`] is split across several
/// statements. An empty batch is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails. Statements that already
/// succeeded are not rolled back.
pub async fn insert_staging_rows(pool: &PgPool, rows: &[FlatStockRow]) -> Result<u64, DbError> {
    let mut inserted = 0u64;
    for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut builder = insert_builder(chunk);
        let result = builder.build().execute(pool).await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Number of rows currently staged.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_staging_products(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM staging_products")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn insert_builder(rows: &[FlatStockRow]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO staging_products (\
         variant_id, product_id, external_parent_id, sku, name, parent_name, \
         cost_price, list_price, sale_price, ean, distribution_center_id, \
         physical_stock, reserved_stock, stock_alert, created_at_source, \
         updated_at_source, parent_id, raw_payload) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.variant_id)
            .push_bind(row.product_id)
            .push_bind(row.external_parent_id)
            .push_bind(&row.sku)
            .push_bind(&row.name)
            .push_bind(row.parent_name.as_deref())
            .push_bind(row.cost_price)
            .push_bind(row.list_price)
            .push_bind(row.sale_price)
            .push_bind(row.ean.as_deref())
            .push_bind(row.distribution_center_id)
            .push_bind(row.physical_stock)
            .push_bind(row.reserved_stock)
            .push_bind(row.stock_alert)
            .push_bind(&row.created_at_source)
            .push_bind(&row.updated_at_source)
            .push_bind(row.parent_id)
            .push_bind(&row.raw_payload);
    });
    builder
}
