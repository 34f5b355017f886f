use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::info;

use crate::models::common::Config;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    info!("Config path: {}", path.to_string_lossy());

    // Read the file contents to a string
    let contents = fs::read_to_string(path).context("failed to read config file")?;

    // Parse the YAML into our Config struct
    let config: Config =
        serde_yaml::from_str(&contents).context("failed to parse config YAML")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "store_dir: ./chain-data\noutput_dir: ./extracted\nstart_height: 10\nend_height: 20\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.start_height, Some(10));
        assert_eq!(config.end_height, Some(20));
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.workers, 30);
        assert_eq!(config.channel_capacity, 64);
        assert!(!config.metrics.enabled);
    }
}
