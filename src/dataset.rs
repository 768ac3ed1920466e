// src/dataset.rs

use arrow::array::{Array, ArrayRef, ArrowPrimitiveType, PrimitiveArray, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{Float64Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::collections::BTreeSet;
use std::path::Path;

use crate::cache::write_parquet_atomic;
use crate::error::CacheError;
use crate::schema::{dataset_schema, region_index, Column};

/// Typed columnar accident records: every schema column plus `region`,
/// all of the same length.
///
/// Used both for a single region and for the concatenation of several.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    /// A zero-row dataset with the full column set.
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(dataset_schema()),
        }
    }

    /// Wrap a batch whose columns match the dataset schema by name and type.
    /// The batch is rebound to the canonical schema, so field metadata picked
    /// up elsewhere (e.g. from a Parquet footer) is discarded.
    pub fn try_new(batch: RecordBatch) -> Result<Self, ArrowError> {
        let schema = dataset_schema();
        let found = batch.schema();
        if found.fields().len() != schema.fields().len() {
            return Err(ArrowError::SchemaError(format!(
                "expected {} columns, found {}",
                schema.fields().len(),
                found.fields().len()
            )));
        }
        for (want, got) in schema.fields().iter().zip(found.fields().iter()) {
            if want.name() != got.name() || want.data_type() != got.data_type() {
                return Err(ArrowError::SchemaError(format!(
                    "expected column {}: {}, found {}: {}",
                    want.name(),
                    want.data_type(),
                    got.name(),
                    got.data_type()
                )));
            }
        }
        let batch = RecordBatch::try_new(schema, batch.columns().to_vec())?;
        Ok(Self { batch })
    }

    /// Concatenate datasets row-wise in the given order, copying each
    /// column exactly once.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Dataset>) -> Result<Self, ArrowError> {
        let schema = dataset_schema();
        let batch = concat_batches(&schema, parts.into_iter().map(|d| &d.batch))?;
        Ok(Self { batch })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Schema columns plus `region`.
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn column(&self, column: Column) -> &ArrayRef {
        self.batch.column(column.index())
    }

    /// Downcast a numeric column; `None` when `T` is not the column's type.
    pub fn primitive<T: ArrowPrimitiveType>(&self, column: Column) -> Option<&PrimitiveArray<T>> {
        self.column(column).as_any().downcast_ref::<PrimitiveArray<T>>()
    }

    pub fn u8_column(&self, column: Column) -> Option<&PrimitiveArray<UInt8Type>> {
        self.primitive::<UInt8Type>(column)
    }

    pub fn u16_column(&self, column: Column) -> Option<&PrimitiveArray<UInt16Type>> {
        self.primitive::<UInt16Type>(column)
    }

    pub fn u32_column(&self, column: Column) -> Option<&PrimitiveArray<UInt32Type>> {
        self.primitive::<UInt32Type>(column)
    }

    pub fn u64_column(&self, column: Column) -> Option<&PrimitiveArray<UInt64Type>> {
        self.primitive::<UInt64Type>(column)
    }

    /// Float column; missing values are nulls.
    pub fn f64_column(&self, column: Column) -> Option<&PrimitiveArray<Float64Type>> {
        self.primitive::<Float64Type>(column)
    }

    pub fn str_column(&self, column: Column) -> Option<&StringArray> {
        self.column(column).as_any().downcast_ref::<StringArray>()
    }

    /// The derived `region` column.
    pub fn regions(&self) -> &StringArray {
        self.batch
            .column(region_index())
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("region column is always Utf8")
    }

    /// Sorted, de-duplicated region codes present in this dataset.
    pub fn distinct_regions(&self) -> Vec<String> {
        let regions = self.regions();
        (0..regions.len())
            .map(|i| regions.value(i))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Export to a standalone Parquet file, replacing `path` atomically.
    pub fn write_parquet(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        write_parquet_atomic(&self.batch, path.as_ref())
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::{ColumnType, Region};
    use arrow::array::{Float64Array, UInt16Array, UInt32Array, UInt64Array, UInt8Array};
    use std::sync::Arc;

    /// A dataset of `ids.len()` rows for `region`; all integer columns hold
    /// the row's id truncated to fit, floats alternate between a value and null.
    pub(crate) fn sample(region: Region, ids: &[u64]) -> Dataset {
        let mut columns: Vec<ArrayRef> = Column::ALL
            .iter()
            .map(|c| -> ArrayRef {
                match c.ty() {
                    ColumnType::UInt8 => {
                        Arc::new(UInt8Array::from_iter_values(ids.iter().map(|&i| i as u8)))
                    }
                    ColumnType::UInt16 => {
                        Arc::new(UInt16Array::from_iter_values(ids.iter().map(|&i| i as u16)))
                    }
                    ColumnType::UInt32 => {
                        Arc::new(UInt32Array::from_iter_values(ids.iter().map(|&i| i as u32)))
                    }
                    ColumnType::UInt64 => Arc::new(UInt64Array::from_iter_values(ids.iter().copied())),
                    ColumnType::Float64 => Arc::new(Float64Array::from_iter(
                        ids.iter().map(|&i| (i % 2 == 0).then_some(i as f64 + 0.5)),
                    )),
                    ColumnType::Utf8 => Arc::new(StringArray::from_iter_values(
                        ids.iter().map(|i| format!("{}-{}", c.name(), i)),
                    )),
                }
            })
            .collect();
        columns.push(Arc::new(StringArray::from_iter_values(
            ids.iter().map(|_| region.code()),
        )));
        Dataset::try_new(RecordBatch::try_new(dataset_schema(), columns).unwrap()).unwrap()
    }

    #[test]
    fn empty_has_every_column() {
        let d = Dataset::empty();
        assert_eq!(d.num_rows(), 0);
        assert_eq!(d.num_columns(), 65);
        assert!(d.distinct_regions().is_empty());
    }

    #[test]
    fn typed_accessors_check_the_column_type() {
        let d = sample(Region::Jhc, &[1, 2]);
        assert_eq!(&d.u64_column(Column::P1).unwrap().values()[..], &[1, 2]);
        assert!(d.u8_column(Column::P1).is_none());
        assert!(d.f64_column(Column::D).unwrap().is_null(0));
        assert_eq!(d.f64_column(Column::D).unwrap().value(1), 2.5);
        assert_eq!(d.str_column(Column::P2a).unwrap().value(0), "p2a-1");
    }

    #[test]
    fn concat_preserves_order_and_alignment() {
        let a = sample(Region::Pha, &[1, 2]);
        let b = sample(Region::Kvk, &[3]);
        let both = Dataset::concat([&a, &b]).unwrap();
        assert_eq!(both.num_rows(), 3);
        assert_eq!(&both.u64_column(Column::P1).unwrap().values()[..], &[1, 2, 3]);
        let regions: Vec<_> = both.regions().iter().flatten().collect();
        assert_eq!(regions, vec!["PHA", "PHA", "KVK"]);
        assert_eq!(both.distinct_regions(), vec!["KVK", "PHA"]);
    }

    #[test]
    fn try_new_rejects_a_foreign_schema() {
        let batch = RecordBatch::try_from_iter(vec![(
            "p1",
            Arc::new(UInt64Array::from(vec![1u64])) as ArrayRef,
        )])
        .unwrap();
        assert!(Dataset::try_new(batch).is_err());
    }
}
