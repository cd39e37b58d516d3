// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

//! The coordinating event loop.
//!
//! The scheduler is the sole owner of the chunk buffer. It multiplexes
//! cancellation, the periodic flush timer and the record queue, and decides
//! when the buffer is handed to the sink. Uploads are strictly sequential:
//! while one is in flight nothing is drained from the queue, so backpressure
//! reaches the producer through the bounded queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::UploaderConfig;
use crate::uploader::ChunkSink;

pub struct Scheduler<S: ChunkSink> {
    sink: S,
    config: Arc<UploaderConfig>,
    rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
    done: oneshot::Sender<()>,
    records: Arc<AtomicU64>,
    buffer: Vec<u8>,
}

impl<S: ChunkSink> Scheduler<S> {
    pub fn new(
        sink: S,
        config: Arc<UploaderConfig>,
        rx: mpsc::Receiver<String>,
        cancel: CancellationToken,
        done: oneshot::Sender<()>,
        records: Arc<AtomicU64>,
    ) -> Scheduler<S> {
        Scheduler {
            sink,
            config,
            rx,
            cancel,
            done,
            records,
            buffer: Vec::new(),
        }
    }

    /// Runs until cancellation or until the record queue closes, then drains:
    /// one final flush attempt if the buffer is non-empty, one summary line,
    /// one completion signal.
    pub async fn run(mut self) {
        let mut ticker = interval(self.config.flush_interval);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.buffer.is_empty() {
                        self.try_flush().await;
                    }
                }
                record = self.rx.recv() => match record {
                    Some(record) => {
                        if self.buffer.len() + record.len() > self.config.max_chunk_size {
                            // Ship what we have before admitting the record.
                            // On failure the chunk is retained, so the buffer
                            // keeps growing until an upload goes through.
                            self.try_flush().await;
                        }
                        self.buffer.extend_from_slice(record.as_bytes());
                    }
                    None => break,
                }
            }
        }

        // One draining flush, however the loop ended.
        if !self.buffer.is_empty() {
            self.try_flush().await;
        }
        self.summarize();
        let _ = self.done.send(());
    }

    async fn try_flush(&mut self) {
        match self.sink.upload(&self.buffer).await {
            Ok(()) => {
                self.buffer.clear();
                match self.sink.scan_id() {
                    Some(id) => debug!(
                        "Uploaded results chunk, scan results at {}",
                        self.config.dashboard_url(id)
                    ),
                    None => debug!("Uploaded results chunk"),
                }
            }
            Err(e) => warn!("Failed to upload scan results chunk, will retry: {e}"),
        }
    }

    // No scan id means nothing was ever accepted by the intake.
    fn summarize(&self) {
        match self.sink.scan_id() {
            None => info!("Scan results upload to cloud skipped, no results uploaded"),
            Some(id) => info!(
                "{} scan results uploaded to cloud, view them at {}",
                self.records.load(Ordering::Relaxed),
                self.config.dashboard_url(id)
            ),
        }
    }
}
