pub mod arrow;
pub mod columns;
pub mod region;

pub use arrow::{dataset_schema, map_to_arrow_type, region_index};
pub use columns::{Column, ColumnType, REGION_COLUMN};
pub use region::Region;
