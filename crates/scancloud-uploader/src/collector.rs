// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

//! Reads newline-delimited result records off a byte stream and forwards
//! them onto the scheduler's bounded queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Capacity of the record queue between the collector and the scheduler.
///
/// A full queue suspends the collector, which in turn suspends the stream
/// producer while an upload is in flight.
pub const RECORD_QUEUE_CAPACITY: usize = 4;

/// Spawns the collector task for `reader`.
///
/// The task exits on end of stream or on the first read error, dropping `tx`
/// so the scheduler sees the queue close. Every forwarded record bumps
/// `counter`; the count is only used for the end-of-run summary.
pub fn spawn_collector<R>(
    reader: R,
    tx: mpsc::Sender<String>,
    counter: Arc<AtomicU64>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(collect(reader, tx, counter))
}

async fn collect<R>(reader: R, tx: mpsc::Sender<String>, counter: Arc<AtomicU64>)
where
    R: AsyncRead + Unpin + Send,
{
    let mut reader = BufReader::new(reader);
    loop {
        let mut record = String::new();
        match reader.read_line(&mut record).await {
            Ok(0) => break,
            Ok(_) => {
                if !record.ends_with('\n') {
                    // Unterminated fragment at end of stream. Records are
                    // never reassembled across reads, so it is dropped.
                    debug!(
                        "Dropping unterminated trailing fragment of {} bytes",
                        record.len()
                    );
                    break;
                }
                counter.fetch_add(1, Ordering::Relaxed);
                if tx.send(record).await.is_err() {
                    // Scheduler is gone, nothing left to feed.
                    break;
                }
            }
            Err(e) => {
                debug!("Record stream closed: {e}");
                break;
            }
        }
    }
}
