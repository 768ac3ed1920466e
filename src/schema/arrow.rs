// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, SchemaRef};
use std::sync::{Arc, OnceLock};

use super::columns::{Column, ColumnType, REGION_COLUMN};

/// Map a schema column type into an Arrow DataType.
///
/// - UInt8/16/32/64 → UInt8/16/32/64
/// - Float64        → Float64 (missing values are nulls)
/// - Utf8           → Utf8
pub fn map_to_arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::UInt8 => DataType::UInt8,
        ColumnType::UInt16 => DataType::UInt16,
        ColumnType::UInt32 => DataType::UInt32,
        ColumnType::UInt64 => DataType::UInt64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Utf8 => DataType::Utf8,
    }
}

/// Only float columns may hold a missing value.
fn field_for(column: Column) -> ArrowField {
    let ty = column.ty();
    ArrowField::new(
        column.name(),
        map_to_arrow_type(ty),
        ty == ColumnType::Float64,
    )
}

/// The dataset schema: every [`Column`] in order, then the `region` column.
pub fn dataset_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            let mut fields: Vec<ArrowField> = Column::ALL.iter().map(|&c| field_for(c)).collect();
            fields.push(ArrowField::new(REGION_COLUMN, DataType::Utf8, false));
            Arc::new(ArrowSchema::new(fields))
        })
        .clone()
}

/// Index of the `region` column in [`dataset_schema`].
pub fn region_index() -> usize {
    Column::ALL.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_appends_region_last() {
        let schema = dataset_schema();
        assert_eq!(schema.fields().len(), 65);
        assert_eq!(schema.field(region_index()).name(), REGION_COLUMN);
        assert_eq!(schema.field(Column::P1.index()).data_type(), &DataType::UInt64);
        assert!(schema.field(Column::D.index()).is_nullable());
        assert!(!schema.field(Column::P13a.index()).is_nullable());
    }
}
