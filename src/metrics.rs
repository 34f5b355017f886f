use std::sync::Arc;
use tracing::info;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
use opentelemetry_sdk::metrics::{MetricError, SdkMeterProvider};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<prometheus::Registry>,
    _provider: SdkMeterProvider,

    // Extraction progress metrics
    pub heights_processed: Counter<u64>,
    pub heights_skipped: Counter<u64>,
    pub events_extracted: Counter<u64>,
    pub files_written: Counter<u64>,
    pub chunks_completed: Counter<u64>,

    // Store metrics
    pub store_read_latency: Histogram<f64>,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricError> {
        // Create a new prometheus registry
        let registry = prometheus::Registry::new();

        // Configure OpenTelemetry to use this registry
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        // Set up a meter to create instruments
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("extractor_metrics");

        let heights_processed = meter
            .u64_counter("extractor_heights_processed")
            .with_description("Total number of block heights read from the store")
            .build();

        let heights_skipped = meter
            .u64_counter("extractor_heights_skipped")
            .with_description("Heights skipped because they carried no service events")
            .build();

        let events_extracted = meter
            .u64_counter("extractor_events_extracted")
            .with_description("Service events materialized into output records")
            .build();

        let files_written = meter
            .u64_counter("extractor_files_written")
            .with_description("Per-height output files created")
            .build();

        let chunks_completed = meter
            .u64_counter("extractor_chunks_completed")
            .with_description("Height chunks fully processed by the worker pool")
            .build();

        let store_read_latency = meter
            .f64_histogram("extractor_store_read_latency")
            .with_description("Per-height block and event read latency")
            .with_boundaries(vec![
                0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ])
            .with_unit("s")
            .build();

        Ok(Self {
            registry: Arc::new(registry),
            _provider: provider,
            heights_processed,
            heights_skipped,
            events_extracted,
            files_written,
            chunks_completed,
            store_read_latency,
        })
    }

    pub async fn start_metrics_server(&self, addr: &str, port: u16) -> Result<()> {
        let addr = format!("{addr}:{port}")
            .parse::<SocketAddr>()
            .context("invalid metrics listen address")?;
        let registry = self.registry.clone();

        let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

        // Determine the access URL based on the binding address. Only used for logging.
        let access_url = if addr.ip().to_string() == "0.0.0.0" {
            format!("http://localhost:{port}/metrics")
        } else {
            format!("http://{}:{port}/metrics", addr.ip())
        };

        info!(
            "Starting metrics server - binding to {} (accessible at {})",
            addr, access_url
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind metrics listener")?;

        // Spawn the server in a separate task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });

        Ok(())
    }
}

async fn metrics_handler(registry: Arc<prometheus::Registry>) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
