// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::schema::Region;

fn default_index_url() -> String {
    "https://ehw.fit.vutbr.cz/izv/".to_string()
}

fn default_folder() -> PathBuf {
    PathBuf::from("data")
}

fn default_index_folder() -> String {
    "data".to_string()
}

fn default_cache_template() -> String {
    "data_{}.parquet".to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

fn default_regions() -> Vec<Region> {
    Region::ALL.to_vec()
}

/// Pipeline configuration. Every field has a default, so an empty YAML
/// document is a valid config.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Page listing the yearly archives; archive URLs are relative to it.
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Local folder for archives and cache files.
    #[serde(default = "default_folder")]
    pub folder: PathBuf,

    /// Folder prefix of archive paths on the index page.
    #[serde(default = "default_index_folder")]
    pub index_folder: String,

    /// Cache file name; `{}` is replaced by the region code.
    #[serde(default = "default_cache_template")]
    pub cache_template: String,

    /// Concurrent archive downloads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Regions assembled when a request names none.
    #[serde(default = "default_regions")]
    pub regions: Vec<Region>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            folder: default_folder(),
            index_folder: default_index_folder(),
            cache_template: default_cache_template(),
            workers: default_workers(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            regions: default_regions(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text).context("parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("loading config {}", path.display()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.workers > 0, "workers must be at least 1");
        anyhow::ensure!(
            self.cache_template.contains("{}"),
            "cache_template {:?} has no {{}} placeholder",
            self.cache_template
        );
        Ok(())
    }
}
