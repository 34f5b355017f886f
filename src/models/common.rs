use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0".to_owned(),
            port: 9100,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Existing chain database directory, opened read-only.
    pub store_dir: PathBuf,
    /// Directory receiving one `<height>.json` per extracted block.
    pub output_dir: PathBuf,
    /// With `end_height`, selects range mode over `[start_height, end_height)`.
    /// Leave both unset to stream the whole event column instead.
    pub start_height: Option<u64>,
    pub end_height: Option<u64>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_chunk_size() -> usize {
    250
}

fn default_workers() -> usize {
    30
}

fn default_channel_capacity() -> usize {
    64
}
