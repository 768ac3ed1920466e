// src/fetch/urls.rs
use reqwest::Client;
use scraper::{Html, Selector};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::IndexError;

/// One remote archive: its file name and absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveRef {
    /// File name under the local archive folder, e.g. `datagis2016.zip`.
    pub name: String,
    pub url: String,
}

impl ArchiveRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Source of the ordered archive list.
pub trait ArchiveIndex {
    fn resolve(&self) -> impl Future<Output = Result<Vec<ArchiveRef>, IndexError>> + Send;
}

/// A fixed archive list.
#[derive(Debug, Clone, Default)]
pub struct StaticIndex {
    archives: Vec<ArchiveRef>,
}

impl StaticIndex {
    pub fn new(archives: Vec<ArchiveRef>) -> Self {
        Self { archives }
    }
}

impl ArchiveIndex for StaticIndex {
    fn resolve(&self) -> impl Future<Output = Result<Vec<ArchiveRef>, IndexError>> + Send {
        let archives = self.archives.clone();
        async move { Ok(archives) }
    }
}

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Scrapes the index page for download buttons of the form
/// `onclick="download('<folder>/<name>.zip')"`.
#[derive(Debug, Clone)]
pub struct HtmlIndex {
    client: Client,
    index_url: String,
    folder: String,
}

impl HtmlIndex {
    pub fn new(client: Client, index_url: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            client,
            index_url: index_url.into(),
            folder: folder.into(),
        }
    }

    async fn fetch_page(&self) -> Result<String, IndexError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let resp = self.client.get(&self.index_url).send().await;
            let err = match resp {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(html) => return Ok(html),
                    Err(e) => IndexError::Http {
                        url: self.index_url.clone(),
                        source: e,
                    },
                },
                Ok(resp) => IndexError::Status {
                    url: self.index_url.clone(),
                    status: resp.status().as_u16(),
                },
                Err(e) => IndexError::Http {
                    url: self.index_url.clone(),
                    source: e,
                },
            };
            if attempt >= MAX_RETRIES {
                return Err(err);
            }
            warn!(attempt, "index fetch failed, retrying: {}", err);
            sleep(RETRY_DELAY).await;
        }
    }
}

impl ArchiveIndex for HtmlIndex {
    fn resolve(&self) -> impl Future<Output = Result<Vec<ArchiveRef>, IndexError>> + Send {
        async move {
            let base = Url::parse(&self.index_url)?;
            let html = self.fetch_page().await?;
            let archives = parse_index(&html, &base, &self.folder);
            debug!(count = archives.len(), "resolved archives");
            Ok(archives)
        }
    }
}

/// Extract archive references in document order.
pub fn parse_index(html: &str, base: &Url, folder: &str) -> Vec<ArchiveRef> {
    let selector = Selector::parse("button[onclick]").expect("selector should parse");
    let prefix = format!("{}/", folder.trim_end_matches('/'));

    Html::parse_document(html)
        .select(&selector)
        .filter_map(|e| e.value().attr("onclick"))
        .filter_map(|onclick| {
            let path = onclick
                .trim()
                .strip_prefix("download('")?
                .strip_suffix("')")?;
            if !path.ends_with(".zip") {
                return None;
            }
            let name = path.strip_prefix(&prefix)?;
            let url = base.join(path).ok()?;
            Some(ArchiveRef::new(name, url.to_string()))
        })
        .collect()
}
