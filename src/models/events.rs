use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 32-byte block identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub [u8; 32]);

impl BlockId {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// 32-byte transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub [u8; 32]);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// One stored event row, exactly as the chain persisted it. The payload is
/// the opaque wire encoding of the event's structured value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub type_name: String,
    pub transaction_id: TransactionId,
    pub transaction_index: u32,
    pub event_index: u32,
    pub payload: Vec<u8>,
}

/// The block context attached to extracted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
}

/// A block as resolved from the store: its identifier plus header.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub header: BlockHeader,
}

/// The persisted output record, one per surviving event, grouped into one
/// JSON array per block height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEvent {
    pub id: String,
    pub fields: Map<String, Value>,
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
    pub name: String,
    #[serde(rename = "transactionIndex")]
    pub transaction_index: u32,
    #[serde(rename = "eventIndex")]
    pub event_index: u32,
    #[serde(rename = "blockHeight", skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Addresses found beneath each field, keyed by field name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<BTreeMap<String, Vec<String>>>,
}
