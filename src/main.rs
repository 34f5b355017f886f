use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

use service_event_extractor::extractor::{self, ExtractionOptions};
use service_event_extractor::metrics::Metrics;
use service_event_extractor::storage::{ChainStore, OutputStore};
use service_event_extractor::utils::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    println!();
    info!("=========================== INITIALIZING ===========================");

    // Load config, path overridable as the first argument
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_owned());
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Err(anyhow!(e));
        }
    };

    ensure!(config.workers > 0, "workers must be positive");
    ensure!(config.chunk_size > 0, "chunk_size must be positive");

    // Initialize optional metrics
    let metrics = if config.metrics.enabled {
        Some(Metrics::new()?)
    } else {
        info!("Metrics are disabled");
        None
    };

    // Start metrics server if metrics are enabled
    if let Some(metrics_instance) = &metrics {
        metrics_instance
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
    }

    let store = Arc::new(ChainStore::open(&config.store_dir)?);
    info!("Chain store opened: {}", config.store_dir.display());
    let output = OutputStore::new(&config.output_dir)?;
    info!("Output directory ready: {}", config.output_dir.display());

    println!();
    info!("========================= STARTING EXTRACTION =========================");

    match (config.start_height, config.end_height) {
        (Some(start), Some(end)) => {
            ensure!(
                start <= end,
                "start_height {} exceeds end_height {}",
                start,
                end
            );
            extractor::extract_range(
                store,
                output,
                start..end,
                ExtractionOptions {
                    chunk_size: config.chunk_size,
                    workers: config.workers,
                },
                metrics,
            )
            .await?;
        }
        (None, None) => {
            extractor::extract_scan(store, output, config.channel_capacity, metrics).await?;
        }
        _ => {
            return Err(anyhow!(
                "start_height and end_height must be set together (or both omitted for a full scan)"
            ));
        }
    }

    info!("Extraction complete");
    Ok(())
}
