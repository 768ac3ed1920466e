// src/process/builders.rs

use arrow::array::{
    Array, ArrayRef, Float64Builder, StringArray, StringBuilder, UInt16Builder, UInt32Builder,
    UInt64Builder, UInt8Builder,
};
use arrow::record_batch::RecordBatch;
use std::iter;
use std::sync::Arc;

use super::row::Value;
use crate::dataset::Dataset;
use crate::error::DecodeError;
use crate::schema::{dataset_schema, Column, ColumnType, Region};

enum ColumnBuilder {
    UInt8(UInt8Builder),
    UInt16(UInt16Builder),
    UInt32(UInt32Builder),
    UInt64(UInt64Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    fn for_type(ty: ColumnType) -> Self {
        match ty {
            ColumnType::UInt8 => ColumnBuilder::UInt8(UInt8Builder::new()),
            ColumnType::UInt16 => ColumnBuilder::UInt16(UInt16Builder::new()),
            ColumnType::UInt32 => ColumnBuilder::UInt32(UInt32Builder::new()),
            ColumnType::UInt64 => ColumnBuilder::UInt64(UInt64Builder::new()),
            ColumnType::Float64 => ColumnBuilder::Float64(Float64Builder::new()),
            ColumnType::Utf8 => ColumnBuilder::Utf8(StringBuilder::new()),
        }
    }

    fn append(&mut self, value: Value) {
        match (self, value) {
            (ColumnBuilder::UInt8(b), Value::U8(v)) => b.append_value(v),
            (ColumnBuilder::UInt16(b), Value::U16(v)) => b.append_value(v),
            (ColumnBuilder::UInt32(b), Value::U32(v)) => b.append_value(v),
            (ColumnBuilder::UInt64(b), Value::U64(v)) => b.append_value(v),
            (ColumnBuilder::Float64(b), Value::F64(v)) => b.append_option(v),
            (ColumnBuilder::Utf8(b), Value::Str(v)) => b.append_value(v),
            (_, value) => unreachable!("value {value:?} parsed for a different column type"),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::UInt8(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt16(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt32(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
        }
    }
}

/// Growable per-column buffers for one region, appended a whole row at a time.
pub struct ColumnBuilders {
    columns: Vec<ColumnBuilder>,
    rows: usize,
}

impl ColumnBuilders {
    pub fn new() -> Self {
        Self {
            columns: Column::ALL
                .iter()
                .map(|c| ColumnBuilder::for_type(c.ty()))
                .collect(),
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append one decoded row; `values` must be in schema order.
    pub fn push_row(&mut self, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        for (builder, value) in self.columns.iter_mut().zip(values) {
            builder.append(value);
        }
        self.rows += 1;
    }

    /// Finish all columns, append the constant `region` column and check
    /// that every column has the same length.
    pub fn finish(mut self, region: Region) -> Result<Dataset, DecodeError> {
        let mut arrays: Vec<ArrayRef> = self.columns.iter_mut().map(|b| b.finish()).collect();

        for (column, array) in Column::ALL.iter().zip(&arrays) {
            if array.len() != self.rows {
                return Err(DecodeError::ColumnLengthMismatch {
                    column: column.name().to_string(),
                    expected: self.rows,
                    found: array.len(),
                });
            }
        }

        arrays.push(Arc::new(StringArray::from_iter_values(
            iter::repeat(region.code()).take(self.rows),
        )));

        let batch = RecordBatch::try_new(dataset_schema(), arrays)?;
        Ok(Dataset::try_new(batch)?)
    }
}

impl Default for ColumnBuilders {
    fn default() -> Self {
        Self::new()
    }
}
