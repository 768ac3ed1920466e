// src/fetch/zips.rs
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};

use super::urls::ArchiveRef;
use crate::error::FetchError;

/// What happened to one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// The file already existed and was not touched.
    Skipped(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

impl Fetched {
    pub fn path(&self) -> &Path {
        match self {
            Fetched::Skipped(path) => path,
            Fetched::Downloaded { path, .. } => path,
        }
    }
}

/// Suffix of an archive still being written. Never trusted as complete.
pub const PARTIAL_SUFFIX: &str = "part";

/// Download `archive` into `dest_dir` unless a file of that name is already
/// there. The body is streamed into `<name>.part` and renamed into place
/// once complete, so an interrupted download is never mistaken for a
/// finished one.
pub async fn download_archive(
    client: &Client,
    archive: &ArchiveRef,
    dest_dir: &Path,
) -> Result<Fetched, FetchError> {
    let dest = dest_dir.join(&archive.name);
    if fs::try_exists(&dest).await.map_err(io_error(&dest))? {
        debug!(name = %archive.name, "already present, skipping");
        return Ok(Fetched::Skipped(dest));
    }

    info!(url = %archive.url, "downloading");
    let resp = client
        .get(&archive.url)
        .send()
        .await
        .map_err(|source| FetchError::Http {
            url: archive.url.clone(),
            source,
        })?;
    if !resp.status().is_success() {
        return Err(FetchError::Status {
            url: archive.url.clone(),
            status: resp.status().as_u16(),
        });
    }

    let partial = dest.with_file_name(format!("{}.{PARTIAL_SUFFIX}", archive.name));
    let mut file = fs::File::create(&partial).await.map_err(io_error(&partial))?;
    let mut stream = resp.bytes_stream();
    let mut bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| FetchError::Http {
            url: archive.url.clone(),
            source,
        })?;
        file.write_all(&chunk).await.map_err(io_error(&partial))?;
        bytes += chunk.len() as u64;
    }
    file.flush().await.map_err(io_error(&partial))?;
    file.sync_all().await.map_err(io_error(&partial))?;
    drop(file);

    fs::rename(&partial, &dest).await.map_err(io_error(&dest))?;
    info!(url = %archive.url, bytes, "done downloading");
    Ok(Fetched::Downloaded { path: dest, bytes })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError {
    let path = path.to_path_buf();
    move |source| FetchError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn streams_body_to_disk() {
        let server = MockServer::start().await;
        let body = vec![7u8; 256 * 1024];
        Mock::given(method("GET"))
            .and(path("/data/a.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let archive = ArchiveRef::new("a.zip", format!("{}/data/a.zip", server.uri()));
        let fetched = download_archive(&Client::new(), &archive, dir.path())
            .await
            .unwrap();

        assert_eq!(
            fetched,
            Fetched::Downloaded {
                path: dir.path().join("a.zip"),
                bytes: body.len() as u64
            }
        );
        assert_eq!(std::fs::read(dir.path().join("a.zip")).unwrap(), body);
        assert!(!dir.path().join("a.zip.part").exists());
    }

    #[tokio::test]
    async fn existing_file_is_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.zip"), b"old").unwrap();
        let archive = ArchiveRef::new("b.zip", format!("{}/data/b.zip", server.uri()));
        let fetched = download_archive(&Client::new(), &archive, dir.path())
            .await
            .unwrap();

        assert_eq!(fetched, Fetched::Skipped(dir.path().join("b.zip")));
        assert_eq!(std::fs::read(dir.path().join("b.zip")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn stale_partial_file_is_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("c.zip.part"), b"truncated garbage").unwrap();
        let archive = ArchiveRef::new("c.zip", format!("{}/data/c.zip", server.uri()));
        download_archive(&Client::new(), &archive, dir.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("c.zip")).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn http_error_leaves_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let archive = ArchiveRef::new("d.zip", format!("{}/data/d.zip", server.uri()));
        let err = download_archive(&Client::new(), &archive, dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(!dir.path().join("d.zip").exists());
    }
}
