// src/process/row.rs

use csv::StringRecord;
use std::num::IntErrorKind;

use crate::schema::{Column, ColumnType};

/// Raw markers for a field that was not recorded. Matched exactly.
pub const SENTINELS: [&str; 2] = ["", "XX"];

pub fn is_sentinel(raw: &str) -> bool {
    SENTINELS.contains(&raw)
}

/// One parsed field, typed per its schema column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// `None` marks a missing float (sentinel in the source).
    F64(Option<f64>),
    Str(String),
}

/// A required numeric field held a sentinel; the row is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub column: Column,
    pub raw: String,
}

/// A field that cannot be represented in its column. Fails the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Overflow { column: Column, value: String },
    Invalid { column: Column, value: String },
}

/// Outcome of decoding one source record.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Keep(Vec<Value>),
    Drop(SchemaViolation),
}

/// Decode one record into schema order.
///
/// The sentinel check runs over the whole row before any field is parsed, so
/// a dropped row never yields a partial value list. The caller guarantees the
/// record has at least `Column::ALL.len()` fields.
pub fn decode_row(record: &StringRecord) -> Result<RowOutcome, FieldError> {
    for &column in Column::ALL {
        let raw = &record[column.index()];
        if column.ty().drops_row_on_sentinel() && is_sentinel(raw) {
            return Ok(RowOutcome::Drop(SchemaViolation {
                column,
                raw: raw.to_string(),
            }));
        }
    }

    let mut values = Vec::with_capacity(Column::ALL.len());
    for &column in Column::ALL {
        values.push(parse_field(column, &record[column.index()])?);
    }
    Ok(RowOutcome::Keep(values))
}

/// Parse a single non-sentinel (or string/float) field.
pub fn parse_field(column: Column, raw: &str) -> Result<Value, FieldError> {
    match column.ty() {
        ColumnType::Utf8 => Ok(Value::Str(raw.to_string())),
        ColumnType::Float64 => parse_float(column, raw).map(Value::F64),
        ColumnType::UInt8 => narrow(column, raw, parse_unsigned(column, raw)?).map(Value::U8),
        ColumnType::UInt16 => narrow(column, raw, parse_unsigned(column, raw)?).map(Value::U16),
        ColumnType::UInt32 => narrow(column, raw, parse_unsigned(column, raw)?).map(Value::U32),
        ColumnType::UInt64 => parse_unsigned(column, raw).map(Value::U64),
    }
}

/// Source floats use a decimal comma.
fn parse_float(column: Column, raw: &str) -> Result<Option<f64>, FieldError> {
    if is_sentinel(raw) {
        return Ok(None);
    }
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map(Some)
        .map_err(|_| FieldError::Invalid {
            column,
            value: raw.to_string(),
        })
}

fn parse_unsigned(column: Column, raw: &str) -> Result<u64, FieldError> {
    raw.trim().parse::<u64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => FieldError::Overflow {
            column,
            value: raw.to_string(),
        },
        _ => FieldError::Invalid {
            column,
            value: raw.to_string(),
        },
    })
}

fn narrow<T: TryFrom<u64>>(column: Column, raw: &str, value: u64) -> Result<T, FieldError> {
    T::try_from(value).map_err(|_| FieldError::Overflow {
        column,
        value: raw.to_string(),
    })
}
