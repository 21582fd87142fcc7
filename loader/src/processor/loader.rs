use super::normalize::parse_timestamp;
use crate::models::{FlatTuple, Scalar};
use crate::schema::{DataType, FieldSpec, Kind, OnConflict, TableSpec};
use crate::storage::StoreTransaction;
use common::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;
use tracing::debug;

/// Writes flattened rows into one table inside the caller's transaction.
///
/// The loader never deduplicates: loading the same rows twice inserts them
/// twice. Skipping already-loaded input is up to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLoader {
    on_conflict: OnConflict,
}

impl BatchLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_conflict(on_conflict: OnConflict) -> Self {
        Self { on_conflict }
    }

    pub async fn load(
        &self,
        tx: &mut (dyn StoreTransaction + '_),
        table: &TableSpec,
        tuples: &[FlatTuple],
    ) -> Result<u64> {
        check_arity(table, tuples)?;

        if tuples.is_empty() {
            return Ok(0);
        }

        let rows = tuples
            .iter()
            .map(|tuple| coerce_row(table, tuple))
            .collect::<Result<Vec<_>>>()?;

        let inserted = tx.insert_batch(table, self.on_conflict, &rows).await?;
        debug!(table = table.name(), rows = rows.len(), inserted = inserted, "Batch inserted");
        Ok(inserted)
    }
}

/// Every tuple must be exactly as wide as the table. A mismatch means the
/// plan and the table have drifted apart.
pub fn check_arity(table: &TableSpec, tuples: &[FlatTuple]) -> Result<()> {
    match tuples
        .iter()
        .enumerate()
        .find(|(_, tuple)| tuple.len() != table.width())
    {
        Some((row, tuple)) => Err(Error::ArityMismatch {
            table: table.name().to_string(),
            row,
            expected: table.width(),
            actual: tuple.len(),
        }),
        None => Ok(()),
    }
}

fn coerce_row(table: &TableSpec, tuple: &FlatTuple) -> Result<FlatTuple> {
    table
        .fields()
        .iter()
        .zip(tuple)
        .map(|(field, value)| {
            coerce(value, field.datatype).ok_or_else(|| type_mismatch(table, field, value))
        })
        .collect()
}

fn type_mismatch(table: &TableSpec, field: &FieldSpec, value: &Scalar) -> Error {
    Error::TypeMismatch {
        table: table.name().to_string(),
        column: field.name.clone(),
        datatype: field.datatype.to_string(),
        value: value.to_string(),
    }
}

/// Converts a value to the representation its column expects, or `None`
/// when no lossless conversion exists.
pub fn coerce(value: &Scalar, datatype: DataType) -> Option<Scalar> {
    if value.is_null() {
        return Some(Scalar::Null);
    }

    match datatype.kind() {
        Kind::Integer => match value {
            Scalar::Int(i) => Some(Scalar::Int(*i)),
            // Twitter ids arrive as `id_str`
            Scalar::Text(s) => s.trim().parse().ok().map(Scalar::Int),
            Scalar::Decimal(d) if d.fract().is_zero() => d.to_i64().map(Scalar::Int),
            _ => None,
        },
        Kind::Decimal => match value {
            Scalar::Int(i) => Some(Scalar::Decimal(Decimal::from(*i))),
            Scalar::Decimal(d) => Some(Scalar::Decimal(*d)),
            Scalar::Text(s) => Decimal::from_str(s.trim()).ok().map(Scalar::Decimal),
            _ => None,
        },
        Kind::Boolean => match value {
            Scalar::Bool(b) => Some(Scalar::Bool(*b)),
            Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" => Some(Scalar::Bool(true)),
                "false" | "f" => Some(Scalar::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        Kind::Text => match value {
            Scalar::Text(s) => Some(Scalar::Text(s.clone())),
            other => Some(Scalar::Text(other.to_string())),
        },
        Kind::Timestamp => match value {
            Scalar::Timestamp(ts) => Some(Scalar::Timestamp(*ts)),
            Scalar::Text(s) => parse_timestamp(s).map(Scalar::Timestamp),
            _ => None,
        },
        Kind::Json => match value {
            Scalar::Json(s) => Some(Scalar::Json(s.clone())),
            Scalar::Text(s) => serde_json::from_str::<serde_json::Value>(s)
                .ok()
                .map(|_| Scalar::Json(s.clone())),
            Scalar::Timestamp(_) => None,
            other => Some(Scalar::Json(other.to_string())),
        },
    }
}
