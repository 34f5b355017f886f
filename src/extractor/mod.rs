pub mod decode;
pub mod transformations;

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::extractor::transformations::events::EventTransformer;
use crate::metrics::Metrics;
use crate::models::events::{Block, OutputEvent, RawEvent};
use crate::storage::{ChainStore, EventBatch, OutputStore};

#[derive(Debug, Clone, Copy)]
pub struct ExtractionOptions {
    pub chunk_size: usize,
    pub workers: usize,
}

struct ChunkStats {
    read: Duration,
    wall: Duration,
}

/// Walks `[start, end)` with a fixed pool of blocking workers. Each worker
/// repeatedly claims the next chunk and processes its heights strictly in
/// ascending order; chunk completion order across workers is unspecified.
/// The first worker error (a write failure) aborts the whole run.
pub async fn extract_range(
    store: Arc<ChainStore>,
    output: OutputStore,
    range: Range<u64>,
    options: ExtractionOptions,
    metrics: Option<Metrics>,
) -> Result<()> {
    let heights: Vec<u64> = range.collect();
    let chunks: VecDeque<Vec<u64>> = heights
        .chunks(options.chunk_size)
        .map(<[u64]>::to_vec)
        .collect();
    let total_chunks = chunks.len();
    info!(
        "extracting {} heights in {} chunks with {} workers",
        heights.len(),
        total_chunks,
        options.workers
    );

    let queue = Arc::new(Mutex::new(chunks));
    let completed = Arc::new(AtomicUsize::new(0));

    let mut pool = JoinSet::new();
    for worker_id in 0..options.workers {
        let queue = queue.clone();
        let completed = completed.clone();
        let store = store.clone();
        let output = output.clone();
        let metrics = metrics.clone();
        pool.spawn_blocking(move || {
            worker_loop(
                worker_id,
                queue,
                completed,
                total_chunks,
                store,
                output,
                metrics,
            )
        });
    }

    while let Some(joined) = pool.join_next().await {
        joined.context("extraction worker panicked")??;
    }
    Ok(())
}

fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<VecDeque<Vec<u64>>>>,
    completed: Arc<AtomicUsize>,
    total_chunks: usize,
    store: Arc<ChainStore>,
    output: OutputStore,
    metrics: Option<Metrics>,
) -> Result<()> {
    loop {
        let chunk = queue.lock().pop_front();
        let Some(chunk) = chunk else {
            break;
        };
        let stats = process_chunk(&chunk, &store, &output, metrics.as_ref())?;
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "{:02} - {:>5}/{:<5} chunks done heights={}..={} readTime={:.2?} writeTime={:.2?}",
            worker_id,
            done,
            total_chunks,
            chunk[0],
            chunk[chunk.len() - 1],
            stats.read,
            stats.wall.saturating_sub(stats.read),
        );
        if let Some(m) = &metrics {
            m.chunks_completed.add(1, &[]);
        }
    }
    Ok(())
}

fn process_chunk(
    heights: &[u64],
    store: &ChainStore,
    output: &OutputStore,
    metrics: Option<&Metrics>,
) -> Result<ChunkStats> {
    let chunk_start = Instant::now();
    let mut total_read = Duration::ZERO;

    for &height in heights {
        let read_start = Instant::now();
        let block = match store.block_by_height(height) {
            Ok(block) => block,
            Err(e) => {
                error!("block lookup failed for height {}: {}", height, e);
                continue;
            }
        };
        let events = match store.events_by_block_id(&block.id) {
            Ok(events) => events,
            Err(e) => {
                error!("event lookup failed for height {}: {}", height, e);
                continue;
            }
        };
        let read_time = read_start.elapsed();
        total_read += read_time;
        if let Some(m) = metrics {
            m.store_read_latency.record(read_time.as_secs_f64(), &[]);
            m.heights_processed.add(1, &[]);
        }

        if events.is_empty() {
            info!("no service events at height {}", height);
            if let Some(m) = metrics {
                m.heights_skipped.add(1, &[]);
            }
            continue;
        }

        let batch = materialize_batch(&events, &block);
        if batch.is_empty() {
            continue;
        }
        if output.write_if_absent(height, &batch)? {
            if let Some(m) = metrics {
                m.files_written.add(1, &[]);
                m.events_extracted.add(batch.len() as u64, &[]);
            }
        }
    }

    Ok(ChunkStats {
        read: total_read,
        wall: chunk_start.elapsed(),
    })
}

/// Materializes a block's surviving events. Per-event decode failures are
/// logged and dropped; siblings still make it into the batch.
fn materialize_batch(events: &[RawEvent], block: &Block) -> Vec<OutputEvent> {
    let mut batch = Vec::with_capacity(events.len());
    for event in events {
        match event.transform_event(Some(&block.header)) {
            Ok(out) => batch.push(out),
            Err(e) => error!(
                "skipping event {} of transaction {} at height {}: {}",
                event.event_index, event.transaction_id, block.header.height, e
            ),
        }
    }
    batch
}

/// Streams the whole event column instead of walking a height range: one
/// producer scans the event prefix and groups rows into per-block batches,
/// one consumer resolves each block's header, materializes, and writes. The
/// bounded channel keeps memory proportional to a handful of blocks.
pub async fn extract_scan(
    store: Arc<ChainStore>,
    output: OutputStore,
    channel_capacity: usize,
    metrics: Option<Metrics>,
) -> Result<()> {
    info!("streaming all event batches from the store");
    let (sender, mut receiver) = mpsc::channel::<EventBatch>(channel_capacity);

    let producer_store = store.clone();
    let producer =
        tokio::task::spawn_blocking(move || producer_store.stream_event_batches(sender));

    let consumer = tokio::task::spawn_blocking(move || -> Result<()> {
        while let Some(batch) = receiver.blocking_recv() {
            let header = match store.header_by_id(&batch.block_id) {
                Ok(header) => header,
                Err(e) => {
                    error!("header lookup failed for block {}: {}", batch.block_id, e);
                    continue;
                }
            };
            let block = Block {
                id: batch.block_id,
                header,
            };
            let out = materialize_batch(&batch.events, &block);
            if out.is_empty() {
                continue;
            }
            if output.write_if_absent(block.header.height, &out)? {
                if let Some(m) = &metrics {
                    m.files_written.add(1, &[]);
                    m.events_extracted.add(out.len() as u64, &[]);
                }
            }
        }
        Ok(())
    });

    // A consumer failure drops the receiver and unblocks the producer's next
    // send, so the consumer result carries the root cause and is checked first.
    let consumer_result = consumer.await.context("event consumer panicked")?;
    let producer_result = producer.await.context("event scan panicked")?;
    consumer_result?;
    producer_result?;
    Ok(())
}
