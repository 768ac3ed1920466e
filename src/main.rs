use anyhow::{Context, Result};
use nehody::{Config, Pipeline};
use std::{env, path::PathBuf};
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,nehody=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config = match env::var_os("NEHODY_CONFIG") {
        Some(path) => Config::load(PathBuf::from(path))?,
        None => Config::default(),
    };
    info!(
        index = %config.index_url,
        folder = %config.folder.display(),
        regions = config.regions.len(),
        "config loaded"
    );

    // ─── 3) assemble configured regions ──────────────────────────────
    let start = Instant::now();
    let mut pipeline = Pipeline::new(config);
    let assembled = pipeline
        .get_dataset(&[])
        .await
        .context("assembling dataset")?;
    let data = &assembled.dataset;

    // ─── 4) summary ──────────────────────────────────────────────────
    info!("data processed in {:.2} seconds", start.elapsed().as_secs_f64());
    info!("data contains {} rows", data.num_rows());
    info!("data contains {} columns", data.num_columns());
    info!("regions: {}", data.distinct_regions().join(", "));

    // ─── 5) optional export ──────────────────────────────────────────
    if let Some(out) = env::var_os("NEHODY_EXPORT") {
        let out = PathBuf::from(out);
        data.write_parquet(&out)
            .with_context(|| format!("exporting dataset to {}", out.display()))?;
        info!("exported dataset to {}", out.display());
    }

    for failure in &assembled.failures {
        error!(region = %failure.region(), "{}", failure);
    }
    anyhow::ensure!(
        assembled.is_complete(),
        "{} region(s) failed",
        assembled.failures.len()
    );

    info!("all done");
    Ok(())
}
