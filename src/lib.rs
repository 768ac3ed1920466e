//! Ingestion of the national traffic-accident archives into typed,
//! region-queryable Arrow datasets with a per-region Parquet cache.

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod process;
pub mod schema;

pub use cache::RegionCache;
pub use config::Config;
pub use dataset::Dataset;
pub use error::{CacheError, DecodeError, FetchError, IndexError, LookupError, RegionError};
pub use fetch::{ArchiveIndex, ArchiveRef, FetchReport, Fetcher, HtmlIndex, StaticIndex};
pub use pipeline::{Assembled, FetchState, Pipeline};
pub use process::decode_region;
pub use schema::{Column, ColumnType, Region};
