// src/pipeline.rs

use arrow::error::ArrowError;
use reqwest::Client;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::cache::RegionCache;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::RegionError;
use crate::fetch::{ArchiveIndex, Fetcher, HtmlIndex};
use crate::process::decode_region;
use crate::schema::Region;

/// Where the session is in making archives available locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    NotFetched,
    /// Seen on entry only if a previous attempt was cancelled; it is retried.
    Fetching,
    /// Local archive paths in index order, including any that failed to
    /// download, so regions relying on them fail at decode time.
    Fetched(Arc<Vec<PathBuf>>),
    Failed(String),
}

/// A unified dataset plus the regions that could not be produced.
#[derive(Debug)]
pub struct Assembled {
    pub dataset: Dataset,
    pub failures: Vec<RegionError>,
}

impl Assembled {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The dataset if every requested region was produced, otherwise the
    /// first failure.
    pub fn into_complete(self) -> Result<Dataset, RegionError> {
        match self.failures.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(self.dataset),
        }
    }
}

/// One ingestion session: fetches archives at most once, decodes each
/// region at most once, and reads/writes the region cache.
pub struct Pipeline<I: ArchiveIndex = HtmlIndex> {
    config: Config,
    index: I,
    fetcher: Fetcher,
    cache: RegionCache,
    memo: HashMap<Region, Dataset>,
    fetch_state: FetchState,
}

impl Pipeline<HtmlIndex> {
    /// Session that discovers archives by scraping `config.index_url`.
    pub fn new(config: Config) -> Self {
        let client = Client::new();
        let index = HtmlIndex::new(
            client.clone(),
            config.index_url.clone(),
            config.index_folder.clone(),
        );
        Self::with_index(config, index, client)
    }
}

impl<I: ArchiveIndex> Pipeline<I> {
    pub fn with_index(config: Config, index: I, client: Client) -> Self {
        let fetcher = Fetcher::new(client, config.folder.clone())
            .with_workers(config.workers)
            .with_timeout(config.fetch_timeout());
        let cache = RegionCache::new(config.folder.clone(), config.cache_template.clone());
        Self {
            config,
            index,
            fetcher,
            cache,
            memo: HashMap::new(),
            fetch_state: FetchState::NotFetched,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &RegionCache {
        &self.cache
    }

    pub fn fetch_state(&self) -> &FetchState {
        &self.fetch_state
    }

    /// Assemble the requested regions, in order, into one dataset. An empty
    /// request means the configured default regions.
    ///
    /// A region that fails is left out of the dataset and reported in
    /// `failures`; it never shows up as zero rows.
    #[instrument(level = "info", skip(self, regions), fields(requested = regions.len()))]
    pub async fn get_dataset(&mut self, regions: &[Region]) -> Result<Assembled, ArrowError> {
        let requested = if regions.is_empty() {
            self.config.regions.clone()
        } else {
            regions.to_vec()
        };

        let mut parts = Vec::with_capacity(requested.len());
        let mut failures = Vec::new();
        for region in requested {
            info!(region = %region, "parsing data");
            match self.region_dataset(region).await {
                Ok(data) => {
                    info!(region = %region, rows = data.num_rows(), "done parsing data");
                    parts.push(data);
                }
                Err(e) => {
                    error!(region = %region, "region failed: {}", e);
                    failures.push(e);
                }
            }
        }

        let dataset = Dataset::concat(&parts)?;
        Ok(Assembled { dataset, failures })
    }

    /// One region's dataset: memo, then cache, then a full decode that is
    /// persisted to the cache.
    pub async fn region_dataset(&mut self, region: Region) -> Result<Dataset, RegionError> {
        if let Some(data) = self.memo.get(&region) {
            return Ok(data.clone());
        }

        match self.cache.load(region) {
            Ok(Some(data)) => {
                self.memo.insert(region, data.clone());
                return Ok(data);
            }
            Ok(None) => {}
            Err(e) => warn!(region = %region, "ignoring unreadable cache entry: {}", e),
        }

        let archives = self
            .ensure_fetched()
            .await
            .map_err(|reason| RegionError::ArchivesUnavailable { region, reason })?;

        let start = Instant::now();
        let data = tokio::task::spawn_blocking(move || decode_region(region, &archives[..]))
            .await
            .map_err(|e| RegionError::Task {
                region,
                reason: e.to_string(),
            })?
            .map_err(|source| RegionError::Decode { region, source })?;
        info!(region = %region, rows = data.num_rows(), elapsed = ?start.elapsed(), "decoded");

        if let Err(e) = self.cache.save(region, &data) {
            warn!(region = %region, "could not persist cache entry: {}", e);
        }
        self.memo.insert(region, data.clone());
        Ok(data)
    }

    /// Resolve and download archives on first use. The outcome, success or
    /// failure, is kept for the rest of the session.
    async fn ensure_fetched(&mut self) -> Result<Arc<Vec<PathBuf>>, String> {
        match &self.fetch_state {
            FetchState::Fetched(archives) => return Ok(Arc::clone(archives)),
            FetchState::Failed(reason) => return Err(reason.clone()),
            FetchState::NotFetched | FetchState::Fetching => {}
        }

        self.fetch_state = FetchState::Fetching;
        let outcome = self.fetch().await.map(Arc::new);
        self.fetch_state = match &outcome {
            Ok(archives) => FetchState::Fetched(Arc::clone(archives)),
            Err(reason) => FetchState::Failed(reason.clone()),
        };
        outcome
    }

    async fn fetch(&self) -> Result<Vec<PathBuf>, String> {
        let archives = self
            .index
            .resolve()
            .await
            .map_err(|e| format!("resolving archive index: {e}"))?;
        if archives.is_empty() {
            return Err("archive index lists no archives".to_string());
        }

        let report = self
            .fetcher
            .fetch_all(&archives)
            .await
            .map_err(|e| format!("preparing archive folder: {e}"))?;
        for (archive, e) in &report.failed {
            warn!(archive = %archive.name, "archive unavailable: {}", e);
        }

        Ok(archives.iter().map(|a| self.fetcher.local_path(a)).collect())
    }
}
