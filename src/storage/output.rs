use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::events::OutputEvent;

/// One-file-per-height JSON writer. Writes are idempotent: a height whose
/// file already exists is never overwritten, so reruns are safe but a schema
/// change requires clearing the directory by hand.
#[derive(Debug, Clone)]
pub struct OutputStore {
    base_dir: PathBuf,
}

impl OutputStore {
    pub fn new(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir)
            .with_context(|| format!("failed to create output directory {}", base_dir.display()))?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Serializes the batch as indented JSON under `<height>.json`. Returns
    /// whether a file was written. Serialization and IO failures are fatal to
    /// the run; there is no retry path for them.
    pub fn write_if_absent(&self, height: u64, events: &[OutputEvent]) -> Result<bool> {
        let path = self.base_dir.join(format!("{height}.json"));
        if path.exists() {
            debug!("output for height {} already present, skipping", height);
            return Ok(false);
        }
        let bytes = serde_json::to_vec_pretty(events)
            .with_context(|| format!("failed to serialize events for height {height}"))?;
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(true)
    }
}
