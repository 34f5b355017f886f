//! Read-only access to the chain's embedded key-value store.
//!
//! Keys are a one-byte role prefix followed by big-endian fixed-width
//! components, so per-role iteration is a contiguous prefix scan. Rows are
//! bincode-encoded through serde.

use std::path::Path;

use anyhow::{Context, Result};
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options};
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::errors::StoreError;
use crate::models::events::{Block, BlockHeader, BlockId, RawEvent};

/// height:u64be -> block id
const BLOCK_ID_PREFIX: u8 = 0x68;
/// block_id -> header row
const HEADER_PREFIX: u8 = 0x69;
/// block_id ++ tx_index:u32be ++ event_index:u32be -> event row
const EVENT_PREFIX: u8 = 0x6a;

pub fn block_id_key(height: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = BLOCK_ID_PREFIX;
    key[1..].copy_from_slice(&height.to_be_bytes());
    key
}

pub fn header_key(block_id: &BlockId) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = HEADER_PREFIX;
    key[1..].copy_from_slice(&block_id.0);
    key
}

pub fn event_key(block_id: &BlockId, transaction_index: u32, event_index: u32) -> [u8; 41] {
    let mut key = [0u8; 41];
    key[0] = EVENT_PREFIX;
    key[1..33].copy_from_slice(&block_id.0);
    key[33..37].copy_from_slice(&transaction_index.to_be_bytes());
    key[37..].copy_from_slice(&event_index.to_be_bytes());
    key
}

/// All event rows belonging to one block, in key order.
#[derive(Debug)]
pub struct EventBatch {
    pub block_id: BlockId,
    pub events: Vec<RawEvent>,
}

pub struct ChainStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl ChainStore {
    /// Opens an existing, finalized database read-only. Workers share one
    /// handle; RocksDB read paths are safe to use concurrently.
    pub fn open(path: &Path) -> Result<Self> {
        let opts = Options::default();
        let db = DBWithThreadMode::<MultiThreaded>::open_for_read_only(&opts, path, false)
            .with_context(|| format!("failed to open chain store at {}", path.display()))?;
        Ok(Self { db })
    }

    pub fn block_by_height(&self, height: u64) -> Result<Block, StoreError> {
        let id_bytes = self
            .db
            .get(block_id_key(height))?
            .ok_or(StoreError::UnknownHeight { height })?;
        let id = BlockId::from_slice(&id_bytes).ok_or(StoreError::MalformedKey {
            role: "block id",
        })?;
        let header = self.header_by_id(&id)?;
        Ok(Block { id, header })
    }

    pub fn header_by_id(&self, block_id: &BlockId) -> Result<BlockHeader, StoreError> {
        let row = self
            .db
            .get(header_key(block_id))?
            .ok_or_else(|| StoreError::UnknownBlock {
                block_id: block_id.to_string(),
            })?;
        decode_row(&row, "header")
    }

    /// Returns the block's event rows in (transaction index, event index)
    /// order, which the key encoding guarantees for a forward scan.
    pub fn events_by_block_id(&self, block_id: &BlockId) -> Result<Vec<RawEvent>, StoreError> {
        let mut prefix = Vec::with_capacity(33);
        prefix.push(EVENT_PREFIX);
        prefix.extend_from_slice(&block_id.0);

        let mut events = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            events.push(decode_row(&value, "event")?);
        }
        Ok(events)
    }

    /// Streams every event row in the store, grouped into per-block batches,
    /// through a bounded channel. Each batch is handed off as soon as the
    /// scan leaves its block, so memory use stays proportional to one block.
    pub fn stream_event_batches(&self, sender: mpsc::Sender<EventBatch>) -> Result<()> {
        let prefix = [EVENT_PREFIX];
        let mut current: Option<EventBatch> = None;
        let mut batches = 0usize;

        for item in self
            .db
            .iterator(IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item.context("event scan failed")?;
            if !key.starts_with(&prefix) {
                break;
            }
            let block_id =
                BlockId::from_slice(key.get(1..33).unwrap_or_default()).ok_or_else(|| {
                    StoreError::MalformedKey { role: "event" }
                })?;
            let event: RawEvent = decode_row(&value, "event")?;

            match &mut current {
                Some(batch) if batch.block_id == block_id => batch.events.push(event),
                _ => {
                    if let Some(done) = current.take() {
                        batches += 1;
                        sender
                            .blocking_send(done)
                            .map_err(|_| anyhow::anyhow!("event batch consumer closed"))?;
                    }
                    current = Some(EventBatch {
                        block_id,
                        events: vec![event],
                    });
                }
            }
        }

        if let Some(done) = current.take() {
            batches += 1;
            sender
                .blocking_send(done)
                .map_err(|_| anyhow::anyhow!("event batch consumer closed"))?;
        }
        debug!("event scan finished after {} batches", batches);
        Ok(())
    }
}

fn decode_row<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
    role: &'static str,
) -> Result<T, StoreError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(row, _)| row)
        .map_err(|source| StoreError::MalformedRow { role, source })
}
