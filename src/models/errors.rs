use thiserror::Error;

/// Failures turning a stored event row's payload into an `OutputEvent`.
/// These are per-event: the owning block's batch continues without the event.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed payload encoding: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("payload node of kind {kind} has an invalid value")]
    InvalidNode { kind: String },
    #[error("invalid integer literal: {text}")]
    InvalidInteger { text: String },
    #[error("invalid fixed-point literal: {text}")]
    InvalidFixedPoint { text: String },
    #[error("invalid address literal: {text}")]
    InvalidAddress { text: String },
    #[error("decoded payload is not an event")]
    NotAnEvent,
    #[error("field name/value count mismatch: {names} names, {values} values")]
    FieldCountMismatch { names: usize, values: usize },
}

/// Failures reading or decoding rows from the chain store. These are
/// per-height: the worker logs and moves on to the next height.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no block mapping for height {height}")]
    UnknownHeight { height: u64 },
    #[error("no header for block {block_id}")]
    UnknownBlock { block_id: String },
    #[error("malformed {role} row: {source}")]
    MalformedRow {
        role: &'static str,
        #[source]
        source: bincode::error::DecodeError,
    },
    #[error("malformed {role} key")]
    MalformedKey { role: &'static str },
    #[error(transparent)]
    Db(#[from] rocksdb::Error),
}
