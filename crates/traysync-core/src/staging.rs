use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One catalog variant joined with exactly one stock location, ready for the
/// `staging_products` table.
///
/// Field names follow the staging schema rather than the catalog's camelCase
/// JSON keys; see `traysync_catalog::types::TrayProduct` for the source shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatStockRow {
    pub variant_id: i64,
    pub product_id: i64,
    pub external_parent_id: Option<i64>,
    pub sku: String,
    pub name: String,
    pub parent_name: Option<String>,
    pub cost_price: Option<Decimal>,
    pub list_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub ean: Option<String>,
    pub distribution_center_id: i64,
    pub physical_stock: i64,
    pub reserved_stock: i64,
    pub stock_alert: i64,
    /// Opaque date string exactly as the catalog sent it.
    pub created_at_source: String,
    /// Opaque date string exactly as the catalog sent it.
    pub updated_at_source: String,
    pub parent_id: Option<i64>,
    /// Audit copy of the source record; see [`RawPayloadMode`].
    pub raw_payload: serde_json::Value,
}

/// How much of the source record is kept in [`FlatStockRow::raw_payload`].
///
/// The payload is cloned once per stock location, so `Full` multiplies the
/// memory held for a page by the average number of locations per product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RawPayloadMode {
    /// Only `produtoVarianteId`, `produtoId`, and `sku`.
    #[default]
    Minimal,
    /// The record exactly as received.
    Full,
}

impl std::str::FromStr for RawPayloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "full" => Ok(Self::Full),
            other => Err(format!(
                "unknown raw payload mode \"{other}\" (expected \"minimal\" or \"full\")"
            )),
        }
    }
}

impl std::fmt::Display for RawPayloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawPayloadMode::Minimal => write!(f, "minimal"),
            RawPayloadMode::Full => write!(f, "full"),
        }
    }
}
