// src/fetch/mod.rs
pub mod urls;
pub mod zips;

use reqwest::Client;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    fs,
    sync::{Mutex, Semaphore},
    task::JoinHandle,
    time::{timeout, Instant},
};
use tracing::{error, info, instrument};

use crate::error::FetchError;
pub use urls::{ArchiveIndex, ArchiveRef, HtmlIndex, StaticIndex};
pub use zips::{download_archive, Fetched};

/// Outcome of one `fetch_all` run.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Archives present locally after the run, in completion order.
    pub available: Vec<PathBuf>,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<(ArchiveRef, FetchError)>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Downloads archives into one folder with a bounded number of concurrent
/// requests.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    dest_dir: PathBuf,
    workers: usize,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: Client, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dest_dir: dest_dir.into(),
            workers: num_cpus::get(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Deadline for each archive, covering request and body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dest_dir(&self) -> &PathBuf {
        &self.dest_dir
    }

    /// Where `archive` lives once fetched.
    pub fn local_path(&self, archive: &ArchiveRef) -> PathBuf {
        self.dest_dir.join(&archive.name)
    }

    /// Make every archive present under the destination folder.
    ///
    /// Existing files are skipped. One archive failing does not stop the
    /// others; failures are listed in the report. Dropping the returned
    /// future aborts in-flight downloads, leaving only `.part` files.
    #[instrument(level = "info", skip(self, archives), fields(dest = %self.dest_dir.display(), archives = archives.len()))]
    pub async fn fetch_all(&self, archives: &[ArchiveRef]) -> Result<FetchReport, FetchError> {
        fs::create_dir_all(&self.dest_dir)
            .await
            .map_err(|source| FetchError::Io {
                path: self.dest_dir.clone(),
                source,
            })?;

        let start = Instant::now();
        let sem = Arc::new(Semaphore::new(self.workers));
        let available = Arc::new(Mutex::new(Vec::with_capacity(archives.len())));
        let mut handles = Vec::with_capacity(archives.len());

        for archive in archives {
            let client = self.client.clone();
            let dest_dir = self.dest_dir.clone();
            let sem = Arc::clone(&sem);
            let available = Arc::clone(&available);
            let deadline = self.timeout;
            let task_archive = archive.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.map_err(|_| FetchError::Worker {
                    url: task_archive.url.clone(),
                })?;
                let fetched = timeout(
                    deadline,
                    download_archive(&client, &task_archive, &dest_dir),
                )
                .await
                .map_err(|_| FetchError::Timeout {
                    url: task_archive.url.clone(),
                    secs: deadline.as_secs(),
                })??;
                available.lock().await.push(fetched.path().to_path_buf());
                Ok::<_, FetchError>(fetched)
            });
            handles.push((archive.clone(), AbortOnDrop(handle)));
        }

        let mut report = FetchReport::default();
        for (archive, mut handle) in handles {
            match (&mut handle.0).await {
                Ok(Ok(Fetched::Downloaded { .. })) => report.downloaded += 1,
                Ok(Ok(Fetched::Skipped(_))) => report.skipped += 1,
                Ok(Err(e)) => {
                    error!(url = %archive.url, "fetch failed: {}", e);
                    report.failed.push((archive, e));
                }
                Err(join) => {
                    error!(url = %archive.url, "fetch task failed: {}", join);
                    let url = archive.url.clone();
                    report.failed.push((archive, FetchError::Worker { url }));
                }
            }
        }

        report.available = std::mem::take(&mut *available.lock().await);
        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed.len(),
            elapsed = ?start.elapsed(),
            "fetch finished"
        );
        Ok(report)
    }
}

/// Aborts the task when dropped, so cancelling `fetch_all` cancels its
/// downloads too.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
