//! Catalog API record types for the `produtos` endpoint.
//!
//! A page is a JSON array of variant records. Deserializing a record into
//! [`TrayProduct`] *is* the validation step: a record that does not fit this
//! shape is counted as invalid and dropped by the record processor.
//!
//! ## Observed shape
//!
//! ### Identifiers
//! `produtoVarianteId` and `produtoId` are always JSON numbers, but not always
//! integers on the wire: `501.0` shows up next to `501`. Whole floats are
//! accepted; a fractional id fails the record.
//! `idPaiExterno` arrives as a number, a numeric string, an empty string, or
//! `null`; empty string and `null` both mean "no external parent".
//! `parentId` arrives as a number, numeric string, or `null`; `0` is used by
//! the catalog for "no parent" and is treated like `null`.
//!
//! ### Prices
//! `precoCusto`, `precoDe`, `precoPor` are JSON numbers or `null`.
//!
//! ### Dates
//! `dataCriacao` / `dataAtualizacao` are passed through untouched. The catalog
//! is not consistent about the format, so nothing downstream parses them.
//!
//! ### Stock
//! `estoque` holds one entry per distribution center. It is only present when
//! the request selects stock fields; an empty array is valid and yields no
//! staging rows. Quantities follow the id rule: `10.0` is read as `10` and
//! `10.5` fails the record.

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// One catalog variant record that passed validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrayProduct {
    #[serde(deserialize_with = "whole_i64")]
    pub produto_variante_id: i64,
    #[serde(deserialize_with = "whole_i64")]
    pub produto_id: i64,

    #[serde(default, deserialize_with = "blank_as_none_id")]
    pub id_pai_externo: Option<i64>,

    pub sku: String,
    pub nome: String,

    #[serde(default)]
    pub nome_produto_pai: Option<String>,

    #[serde(default)]
    pub preco_custo: Option<f64>,
    #[serde(default)]
    pub preco_de: Option<f64>,
    #[serde(default)]
    pub preco_por: Option<f64>,

    #[serde(default)]
    pub ean: Option<String>,

    /// Ordered stock entries, one per distribution center.
    pub estoque: Vec<StockLocation>,

    pub data_criacao: String,
    pub data_atualizacao: String,

    #[serde(default, deserialize_with = "falsy_as_none_id")]
    pub parent_id: Option<i64>,
}

/// Stock figures for one distribution center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLocation {
    #[serde(deserialize_with = "whole_i64")]
    pub centro_distribuicao_id: i64,
    #[serde(deserialize_with = "whole_i64")]
    pub estoque_fisico: i64,
    #[serde(deserialize_with = "whole_i64")]
    pub estoque_reservado: i64,
    #[serde(deserialize_with = "whole_i64")]
    pub alerta_estoque: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(i64),
    Float(f64),
}

/// Numbers and numeric strings both appear for catalog ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Number(i64),
    Float(f64),
    Text(String),
}

impl LooseId {
    fn into_i64<E: de::Error>(self, field: &str) -> Result<i64, E> {
        match self {
            LooseId::Number(n) => Ok(n),
            LooseId::Float(f) => {
                float_to_i64(f).ok_or_else(|| E::custom(format!("{field} {f} is not a whole number")))
            }
            LooseId::Text(s) => parse_text_id(field, &s),
        }
    }
}

/// `Some` only for floats with no fractional part that fit in an `i64`.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn float_to_i64(value: f64) -> Option<i64> {
    // 2^63; the upper bound is exclusive.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value)).then_some(value as i64)
}

/// Integers, or floats with no fractional part.
fn whole_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Int(n) => Ok(n),
        LooseNumber::Float(f) => float_to_i64(f)
            .ok_or_else(|| de::Error::custom(format!("{f} is not a whole number"))),
    }
}

fn parse_text_id<E: de::Error>(field: &str, text: &str) -> Result<i64, E> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| E::custom(format!("{field} \"{text}\" is not a numeric id")))
}

/// `null` and `""` become `None`; numbers and numeric strings become `Some`.
fn blank_as_none_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LooseId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(LooseId::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(id) => id.into_i64("idPaiExterno").map(Some),
    }
}

/// Like [`blank_as_none_id`], but `0` also means "no parent".
fn falsy_as_none_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LooseId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(LooseId::Text(s)) if s.is_empty() => Ok(None),
        Some(LooseId::Text(s)) => parse_text_id("parentId", &s).map(Some),
        Some(number) => number.into_i64("parentId").map(|n| (n != 0).then_some(n)),
    }
}
