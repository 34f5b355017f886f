use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use rocksdb::{Options, DB};
use serde_json::{json, Value};
use tempfile::TempDir;

use service_event_extractor::extractor::{self, ExtractionOptions};
use service_event_extractor::models::events::{BlockHeader, BlockId, RawEvent, TransactionId};
use service_event_extractor::storage::chain::{block_id_key, event_key, header_key};
use service_event_extractor::storage::{ChainStore, OutputStore};

const GOOD_BLOCK_HEIGHT: u64 = 1000;
const EMPTY_BLOCK_HEIGHT: u64 = 2000;
const GOOD_BLOCK_ID: BlockId = BlockId([0xB1; 32]);
const EMPTY_BLOCK_ID: BlockId = BlockId([0xB2; 32]);
const TX_ID: TransactionId = TransactionId([0xAA; 32]);

fn encode_row<T: serde::Serialize>(row: &T) -> Vec<u8> {
    bincode::serde::encode_to_vec(row, bincode::config::standard()).unwrap()
}

fn deposit_payload() -> Vec<u8> {
    json!({
        "type": "Event",
        "value": {
            "id": "A.0000000000000001.Example.Deposit",
            "fields": [
                {"name": "amount", "value": {"type": "UFix64", "value": "1.00000000"}},
                {"name": "to", "value": {"type": "Address", "value": "0xab"}},
            ],
        },
    })
    .to_string()
    .into_bytes()
}

/// Height 1000 carries one decodable and one undecodable event; height 2000
/// exists but has no events at all.
fn seed_store(dir: &Path) {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    let db = DB::open(&opts, dir).unwrap();

    let good_header = BlockHeader {
        height: GOOD_BLOCK_HEIGHT,
        timestamp: Utc.timestamp_opt(1_696_000_000, 0).unwrap(),
    };
    db.put(block_id_key(GOOD_BLOCK_HEIGHT), GOOD_BLOCK_ID.0).unwrap();
    db.put(header_key(&GOOD_BLOCK_ID), encode_row(&good_header))
        .unwrap();

    let decodable = RawEvent {
        type_name: "A.0000000000000001.Example.Deposit".to_owned(),
        transaction_id: TX_ID,
        transaction_index: 0,
        event_index: 0,
        payload: deposit_payload(),
    };
    db.put(event_key(&GOOD_BLOCK_ID, 0, 0), encode_row(&decodable))
        .unwrap();

    let undecodable = RawEvent {
        type_name: "A.0000000000000001.Example.Broken".to_owned(),
        transaction_id: TX_ID,
        transaction_index: 0,
        event_index: 1,
        payload: b"this is not a payload".to_vec(),
    };
    db.put(event_key(&GOOD_BLOCK_ID, 0, 1), encode_row(&undecodable))
        .unwrap();

    let empty_header = BlockHeader {
        height: EMPTY_BLOCK_HEIGHT,
        timestamp: Utc.timestamp_opt(1_696_000_100, 0).unwrap(),
    };
    db.put(block_id_key(EMPTY_BLOCK_HEIGHT), EMPTY_BLOCK_ID.0)
        .unwrap();
    db.put(header_key(&EMPTY_BLOCK_ID), encode_row(&empty_header))
        .unwrap();
}

fn assert_good_block_output(output_dir: &Path) {
    let content = fs::read_to_string(output_dir.join("1000.json")).unwrap();
    let parsed: Value = serde_json::from_str(&content).unwrap();
    let events = parsed.as_array().unwrap();

    // Only the decodable event survives; its broken sibling is dropped.
    assert_eq!(events.len(), 1);
    let event = &events[0];
    let tx = "aa".repeat(32);
    assert_eq!(event["id"], json!(format!("1000-{tx}-0")));
    assert_eq!(event["transactionID"], json!(tx));
    assert_eq!(event["name"], json!("A.0000000000000001.Example.Deposit"));
    assert_eq!(event["transactionIndex"], json!(0));
    assert_eq!(event["eventIndex"], json!(0));
    assert_eq!(event["blockHeight"], json!(1000));
    assert_eq!(event["fields"]["amount"], json!(1.0));
    assert_eq!(event["fields"]["to"], json!("0xab"));
    assert_eq!(event["types"]["to"], json!(["0xab"]));
    assert!(event["timestamp"].is_string());
}

#[tokio::test]
async fn range_extraction_is_idempotent_and_skips_failures() -> Result<()> {
    let store_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    seed_store(store_dir.path());

    let store = Arc::new(ChainStore::open(store_dir.path())?);
    let output = OutputStore::new(output_dir.path())?;
    let options = ExtractionOptions {
        chunk_size: 250,
        workers: 4,
    };

    // The range also covers heights with no block mapping at all; those are
    // logged and skipped without failing the run.
    extractor::extract_range(
        store.clone(),
        output.clone(),
        GOOD_BLOCK_HEIGHT..EMPTY_BLOCK_HEIGHT + 1,
        options,
        None,
    )
    .await?;

    assert_good_block_output(output_dir.path());

    // Zero events: no file at all, not an empty array.
    assert!(!output_dir.path().join("2000.json").exists());

    // A second run over the same range must not touch existing output.
    let first_run = fs::read(output_dir.path().join("1000.json"))?;
    extractor::extract_range(
        store,
        output,
        GOOD_BLOCK_HEIGHT..EMPTY_BLOCK_HEIGHT + 1,
        options,
        None,
    )
    .await?;
    assert_eq!(fs::read(output_dir.path().join("1000.json"))?, first_run);

    Ok(())
}

#[tokio::test]
async fn scan_extraction_streams_per_block_batches() -> Result<()> {
    let store_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    seed_store(store_dir.path());

    let store = Arc::new(ChainStore::open(store_dir.path())?);
    let output = OutputStore::new(output_dir.path())?;

    extractor::extract_scan(store, output, 8, None).await?;

    assert_good_block_output(output_dir.path());
    assert!(!output_dir.path().join("2000.json").exists());

    Ok(())
}

#[tokio::test]
async fn empty_range_produces_no_output() -> Result<()> {
    let store_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    seed_store(store_dir.path());

    let store = Arc::new(ChainStore::open(store_dir.path())?);
    let output = OutputStore::new(output_dir.path())?;

    extractor::extract_range(
        store,
        output,
        0..0,
        ExtractionOptions {
            chunk_size: 250,
            workers: 2,
        },
        None,
    )
    .await?;

    assert_eq!(fs::read_dir(output_dir.path())?.count(), 0);
    Ok(())
}
