// src/cache.rs

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression};
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

use crate::dataset::Dataset;
use crate::error::CacheError;
use crate::schema::Region;

/// On-disk cache of decoded regions, one Parquet file per region.
///
/// Entries are written once and never invalidated here; deleting the file
/// forces a re-decode on the next run.
#[derive(Debug, Clone)]
pub struct RegionCache {
    dir: PathBuf,
    template: String,
}

impl RegionCache {
    /// `template` names each entry; `{}` is replaced by the region code.
    pub fn new(dir: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            template: template.into(),
        }
    }

    pub fn path(&self, region: Region) -> PathBuf {
        self.dir.join(self.template.replace("{}", region.code()))
    }

    /// Read a region's entry. `Ok(None)` when no entry exists; a file that
    /// exists but cannot be read back as a dataset is `CacheError::Corrupt`.
    #[instrument(level = "debug", skip(self), fields(region = %region))]
    pub fn load(&self, region: Region) -> Result<Option<Dataset>, CacheError> {
        let path = self.path(region);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "cache miss");
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let corrupt = |reason: String| CacheError::Corrupt {
            path: path.clone(),
            reason,
        };

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| corrupt(e.to_string()))?;
        let schema = builder.schema().clone();
        let reader = builder
            .with_batch_size(64 * 1024)
            .build()
            .map_err(|e| corrupt(e.to_string()))?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt(e.to_string()))?;
        let batch = concat_batches(&schema, &batches).map_err(|e| corrupt(e.to_string()))?;
        let dataset = Dataset::try_new(batch).map_err(|e| corrupt(e.to_string()))?;

        debug!(path = %path.display(), rows = dataset.num_rows(), "cache hit");
        Ok(Some(dataset))
    }

    /// Persist a region's dataset, replacing any previous entry atomically.
    #[instrument(level = "debug", skip(self, dataset), fields(region = %region, rows = dataset.num_rows()))]
    pub fn save(&self, region: Region, dataset: &Dataset) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        write_parquet_atomic(dataset.batch(), &self.path(region))
    }
}

/// Write `batch` to a uniquely named temp file beside `path`, then rename it
/// over `path`, so readers see either the old file or the complete new one.
/// Concurrent writers each get their own temp file; the last rename wins.
pub(crate) fn write_parquet_atomic(batch: &RecordBatch, path: &Path) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset.parquet".to_string());

    let io_err = |source: io::Error| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    let tmp = tempfile::Builder::new()
        .prefix(&format!("{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_err)?;

    write_parquet(batch, tmp.as_file(), tmp.path())?;
    tmp.as_file().sync_all().map_err(io_err)?;
    // Dropping an unpersisted temp file removes it.
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn write_parquet(batch: &RecordBatch, file: &File, path: &Path) -> Result<(), CacheError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .set_dictionary_enabled(true)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))?;
    writer.write(batch)?;
    let mut out = writer.into_inner()?;
    out.flush().map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
