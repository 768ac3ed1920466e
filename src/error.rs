// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::{Column, Region};

/// Failure to resolve the list of archives from the index provider.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("GET {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("index {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid index url {0}")]
    Url(#[from] url::ParseError),
}

/// Failure to fetch one archive. Never aborts sibling fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetch of {url} exceeded {secs}s deadline")]
    Timeout { url: String, secs: u64 },

    #[error("fetch worker for {url} panicked or was cancelled")]
    Worker { url: String },
}

/// Failure to decode one region. Fatal for that region only.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("archive {0} is not available locally")]
    ArchiveUnavailable(PathBuf),

    #[error("archive {archive} has no member {member}")]
    MissingMember { archive: PathBuf, member: String },

    #[error("{member} in {archive}: {source}")]
    Archive {
        archive: PathBuf,
        member: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("reading {member} in {archive}: {source}")]
    Io {
        archive: PathBuf,
        member: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{member} in {archive}, record {record}: {source}")]
    Csv {
        archive: PathBuf,
        member: String,
        record: usize,
        #[source]
        source: csv::Error,
    },

    #[error("{member} in {archive}, record {record}: expected {expected} fields, found {found}")]
    ShortRow {
        archive: PathBuf,
        member: String,
        record: usize,
        expected: usize,
        found: usize,
    },

    #[error("{member} in {archive}, record {record}: value {value:?} overflows column {column}")]
    Overflow {
        archive: PathBuf,
        member: String,
        record: usize,
        column: Column,
        value: String,
    },

    #[error("{member} in {archive}, record {record}: value {value:?} is not valid for column {column}")]
    InvalidValue {
        archive: PathBuf,
        member: String,
        record: usize,
        column: Column,
        value: String,
    },

    #[error("column {column} has {found} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("building record batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Failure reading or writing one cache entry.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("cache io on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Why one requested region is missing from an assembled dataset.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("archives unavailable for {region}: {reason}")]
    ArchivesUnavailable { region: Region, reason: String },

    #[error("decoding {region}: {source}")]
    Decode {
        region: Region,
        #[source]
        source: DecodeError,
    },

    #[error("decode task for {region} failed: {reason}")]
    Task { region: Region, reason: String },
}

impl RegionError {
    pub fn region(&self) -> Region {
        match self {
            RegionError::ArchivesUnavailable { region, .. }
            | RegionError::Decode { region, .. }
            | RegionError::Task { region, .. } => *region,
        }
    }
}

/// Error for a bad region code or column name supplied as text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown region code {0:?}")]
    Region(String),

    #[error("unknown column {0:?}")]
    Column(String),
}
