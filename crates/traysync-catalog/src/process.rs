//! Validation, flattening, and batching of one fetched page.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::{json, Value};
use traysync_core::{FlatStockRow, RawPayloadMode};

use crate::types::TrayProduct;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Price columns are `NUMERIC(12, 2)`: ten integer digits, two fractional.
const PRICE_SCALE: u32 = 2;
const PRICE_INTEGER_DIGITS: u32 = 10;

/// Rows produced from one page, already split into insert batches.
#[derive(Debug, Default)]
pub struct ProcessedPage {
    /// Batches of at most `batch_size` rows, in arrival order.
    pub batches: Vec<Vec<FlatStockRow>>,
    /// Records that failed validation and were dropped.
    pub invalid: usize,
    /// Records that validated (including ones with no stock locations).
    pub valid: usize,
}

impl ProcessedPage {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// Turns raw catalog records into staging rows.
#[derive(Debug, Clone, Copy)]
pub struct RecordProcessor {
    batch_size: usize,
    payload_mode: RawPayloadMode,
}

impl Default for RecordProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, RawPayloadMode::default())
    }
}

impl RecordProcessor {
    /// A `batch_size` of zero is raised to one.
    #[must_use]
    pub fn new(batch_size: usize, payload_mode: RawPayloadMode) -> Self {
        Self {
            batch_size: batch_size.max(1),
            payload_mode,
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Validates every record, expands each valid product into one row per
    /// stock location, and splits the rows into batches.
    ///
    /// Invalid records are counted and logged at `debug`; they never fail the
    /// page.
    #[must_use]
    pub fn process(&self, raw_page: Vec<Value>) -> ProcessedPage {
        let mut out = ProcessedPage::default();
        let mut rows: Vec<FlatStockRow> = Vec::new();

        for (position, raw) in raw_page.into_iter().enumerate() {
            match self.flatten(&raw) {
                Ok(product_rows) => {
                    out.valid += 1;
                    rows.extend(product_rows);
                }
                Err(reason) => {
                    out.invalid += 1;
                    tracing::debug!(
                        position,
                        variant_id = ?raw.get("produtoVarianteId"),
                        reason = %reason,
                        "dropping invalid catalog record"
                    );
                }
            }
        }

        out.batches = chunk(rows, self.batch_size);
        out
    }

    fn flatten(&self, raw: &Value) -> Result<Vec<FlatStockRow>, String> {
        let product = TrayProduct::deserialize(raw).map_err(|e| e.to_string())?;

        let cost_price = to_decimal("precoCusto", product.preco_custo)?;
        let list_price = to_decimal("precoDe", product.preco_de)?;
        let sale_price = to_decimal("precoPor", product.preco_por)?;

        let payload = match self.payload_mode {
            RawPayloadMode::Minimal => json!({
                "produtoVarianteId": product.produto_variante_id,
                "produtoId": product.produto_id,
                "sku": &product.sku,
            }),
            RawPayloadMode::Full => raw.clone(),
        };

        Ok(product
            .estoque
            .iter()
            .map(|stock| FlatStockRow {
                variant_id: product.produto_variante_id,
                product_id: product.produto_id,
                external_parent_id: product.id_pai_externo,
                sku: product.sku.clone(),
                name: product.nome.clone(),
                parent_name: product.nome_produto_pai.clone(),
                cost_price,
                list_price,
                sale_price,
                ean: product.ean.clone(),
                distribution_center_id: stock.centro_distribuicao_id,
                physical_stock: stock.estoque_fisico,
                reserved_stock: stock.estoque_reservado,
                stock_alert: stock.alerta_estoque,
                created_at_source: product.data_criacao.clone(),
                updated_at_source: product.data_atualizacao.clone(),
                parent_id: product.parent_id,
                raw_payload: payload.clone(),
            })
            .collect())
    }
}

/// Converts via the shortest decimal text that round-trips the `f64`, so a
/// catalog `19.9` becomes `19.9` and not its binary approximation.
///
/// The result is rounded to the column scale the way Postgres would round it;
/// a price that still does not fit the column fails the record.
fn to_decimal(field: &str, value: Option<f64>) -> Result<Option<Decimal>, String> {
    let Some(v) = value else {
        return Ok(None);
    };
    let parsed = v
        .to_string()
        .parse::<Decimal>()
        .map_err(|e| format!("{field} {v} is not representable: {e}"))?;
    let rounded =
        parsed.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if rounded.abs() >= Decimal::from(10_i64.pow(PRICE_INTEGER_DIGITS)) {
        return Err(format!("{field} {v} exceeds {PRICE_INTEGER_DIGITS} integer digits"));
    }
    Ok(Some(rounded))
}

fn chunk(rows: Vec<FlatStockRow>, size: usize) -> Vec<Vec<FlatStockRow>> {
    let mut batches = Vec::with_capacity(rows.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(rows.len()));
    for row in rows {
        current.push(row);
        if current.len() == size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(variant_id: i64, locations: usize) -> Value {
        let estoque: Vec<Value> = (0..locations)
            .map(|i| {
                json!({
                    "centroDistribuicaoId": i + 1,
                    "estoqueFisico": 10,
                    "estoqueReservado": 1,
                    "alertaEstoque": 2
                })
            })
            .collect();
        json!({
            "produtoVarianteId": variant_id,
            "produtoId": variant_id / 10,
            "idPaiExterno": "",
            "sku": format!("SKU-{variant_id}"),
            "nome": "Produto",
            "nomeProdutoPai": null,
            "precoCusto": 10.25,
            "precoDe": null,
            "precoPor": 19.9,
            "ean": null,
            "estoque": estoque,
            "dataCriacao": "2024-01-01",
            "dataAtualizacao": "2024-01-02",
            "parentId": 0
        })
    }

    #[test]
    fn one_row_per_stock_location() {
        let processor = RecordProcessor::default();
        let page = processor.process(vec![record(11, 1), record(12, 2)]);
        assert_eq!(page.valid, 2);
        assert_eq!(page.invalid, 0);
        assert_eq!(page.row_count(), 3);

        let rows = &page.batches[0];
        assert_eq!(rows[0].variant_id, 11);
        assert_eq!(rows[1].variant_id, 12);
        assert_eq!(rows[1].distribution_center_id, 1);
        assert_eq!(rows[2].distribution_center_id, 2);
    }

    #[test]
    fn empty_stock_contributes_no_rows() {
        let processor = RecordProcessor::default();
        let page = processor.process(vec![record(11, 0)]);
        assert_eq!(page.valid, 1);
        assert_eq!(page.row_count(), 0);
        assert!(page.batches.is_empty());
    }

    #[test]
    fn invalid_records_are_counted_not_fatal() {
        let processor = RecordProcessor::default();
        let page = processor.process(vec![
            record(11, 1),
            json!({"produtoVarianteId": 12}),
            json!("not an object"),
            record(13, 1),
        ]);
        assert_eq!(page.valid, 2);
        assert_eq!(page.invalid, 2);
        assert_eq!(page.valid + page.invalid, 4);
        assert_eq!(page.row_count(), 2);
    }

    #[test]
    fn rows_are_batched_in_order() {
        let processor = RecordProcessor::new(2, RawPayloadMode::Minimal);
        let page = processor.process(vec![record(1, 3), record(2, 2)]);
        let sizes: Vec<usize> = page.batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let ids: Vec<i64> = page.batches.concat().iter().map(|r| r.variant_id).collect();
        assert_eq!(ids, vec![1, 1, 1, 2, 2]);
    }

    #[test]
    fn zero_batch_size_is_raised_to_one() {
        assert_eq!(RecordProcessor::new(0, RawPayloadMode::Minimal).batch_size(), 1);
    }

    #[test]
    fn prices_become_decimals() {
        let page = RecordProcessor::default().process(vec![record(11, 1)]);
        let row = &page.batches[0][0];
        assert_eq!(row.cost_price, Some(Decimal::new(1025, 2)));
        assert_eq!(row.list_price, None);
        assert_eq!(row.sale_price, Some(Decimal::new(199, 1)));
    }

    #[test]
    fn out_of_range_price_counts_record_invalid() {
        let mut oversized = record(12, 2);
        oversized["precoPor"] = json!(1e11);
        let page = RecordProcessor::default().process(vec![record(11, 1), oversized]);
        assert_eq!(page.valid, 1);
        assert_eq!(page.invalid, 1);
        assert_eq!(page.row_count(), 1);
        assert_eq!(page.batches[0][0].variant_id, 11);
    }

    #[test]
    fn largest_price_that_fits_the_column_is_kept() {
        let mut edge = record(11, 1);
        edge["precoCusto"] = json!(9_999_999_999.99);
        let page = RecordProcessor::default().process(vec![edge.clone()]);
        assert_eq!(page.invalid, 0);
        assert_eq!(
            page.batches[0][0].cost_price,
            Some(Decimal::new(999_999_999_999, 2))
        );

        // Rounds up past the column limit.
        edge["precoCusto"] = json!(9_999_999_999.999);
        let page = RecordProcessor::default().process(vec![edge]);
        assert_eq!(page.invalid, 1);
    }

    #[test]
    fn whole_float_stock_keeps_record_valid() {
        let mut source = record(11, 1);
        source["estoque"][0]["estoqueFisico"] = json!(10.0);
        let page = RecordProcessor::default().process(vec![source]);
        assert_eq!(page.valid, 1);
        assert_eq!(page.invalid, 0);
        assert_eq!(page.batches[0][0].physical_stock, 10);
    }

    #[test]
    fn prices_are_rounded_to_two_places() {
        let mut source = record(11, 1);
        source["precoDe"] = json!(12.345);
        let page = RecordProcessor::default().process(vec![source]);
        assert_eq!(page.batches[0][0].list_price, Some(Decimal::new(1235, 2)));
    }

    #[test]
    fn falsy_parent_ids_become_none() {
        let page = RecordProcessor::default().process(vec![record(11, 1)]);
        let row = &page.batches[0][0];
        assert_eq!(row.external_parent_id, None);
        assert_eq!(row.parent_id, None);
    }

    #[test]
    fn minimal_payload_keeps_identifiers_only() {
        let page = RecordProcessor::default().process(vec![record(11, 1)]);
        assert_eq!(
            page.batches[0][0].raw_payload,
            json!({"produtoVarianteId": 11, "produtoId": 1, "sku": "SKU-11"})
        );
    }

    #[test]
    fn full_payload_keeps_source_record() {
        let source = record(11, 2);
        let processor = RecordProcessor::new(10, RawPayloadMode::Full);
        let page = processor.process(vec![source.clone()]);
        for row in &page.batches[0] {
            assert_eq!(row.raw_payload, source);
        }
    }
}
