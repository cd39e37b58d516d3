// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

//! Public entry point tying collector, scheduler, and uploader together, and
//! the cooperative shutdown handshake.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::collector::{self, RECORD_QUEUE_CAPACITY};
use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::scheduler::Scheduler;
use crate::uploader::Uploader;

/// Producer side of the record queue, for callers that serialize their own
/// records instead of handing over a byte stream.
#[derive(Clone)]
pub struct RecordSender {
    tx: mpsc::Sender<String>,
    records: Arc<AtomicU64>,
}

impl RecordSender {
    /// Queues one serialized record, adding the trailing newline when the
    /// caller left it off. Suspends while the queue is full; errors once the
    /// writer has been closed.
    pub async fn send(&self, mut record: String) -> Result<(), UploadError> {
        if !record.ends_with('\n') {
            record.push('\n');
        }
        self.tx
            .send(record)
            .await
            .map_err(|_| UploadError::Closed)?;
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Handle owning the upload pipeline.
///
/// Dropping the handle without calling [`UploadWriter::close`] abandons the
/// scheduler mid-run; callers that care about the final flush must close.
pub struct UploadWriter {
    cancel: CancellationToken,
    // Taken on first receipt; a oneshot receiver must not be polled again
    // once it has yielded.
    done: Option<oneshot::Receiver<()>>,
    records: Arc<AtomicU64>,
}

impl UploadWriter {
    /// Spawns the pipeline against `reader`, which must yield complete
    /// newline-terminated records. Configuration problems (no API key, bad
    /// server URL) surface here, before any task is spawned.
    pub fn from_stream<R>(config: UploaderConfig, reader: R) -> Result<UploadWriter, UploadError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (writer, tx) = UploadWriter::spawn(config)?;
        collector::spawn_collector(reader, tx, Arc::clone(&writer.records));
        Ok(writer)
    }

    /// Variant exposing the bounded record queue directly, decoupling record
    /// serialization from batching and shipping.
    pub fn channel(config: UploaderConfig) -> Result<(UploadWriter, RecordSender), UploadError> {
        let (writer, tx) = UploadWriter::spawn(config)?;
        let sender = RecordSender {
            tx,
            records: Arc::clone(&writer.records),
        };
        Ok((writer, sender))
    }

    fn spawn(config: UploaderConfig) -> Result<(UploadWriter, mpsc::Sender<String>), UploadError> {
        let config = Arc::new(config);
        let uploader = Uploader::new(Arc::clone(&config))?;

        let (tx, rx) = mpsc::channel(RECORD_QUEUE_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let records = Arc::new(AtomicU64::new(0));

        let scheduler = Scheduler::new(
            uploader,
            config,
            rx,
            cancel.clone(),
            done_tx,
            Arc::clone(&records),
        );
        tokio::spawn(scheduler.run());

        Ok((
            UploadWriter {
                cancel,
                done: Some(done_rx),
                records,
            },
            tx,
        ))
    }

    /// Records consumed so far; used for the end-of-run summary only.
    pub fn record_count(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Resolves once the scheduler has closed on its own (stream end).
    pub async fn finished(&mut self) {
        if let Some(done) = &mut self.done {
            let _ = done.await;
            self.done = None;
        }
    }

    /// Cooperative shutdown: asks the scheduler to drain, then waits until
    /// the final flush has been attempted. An upload already in flight is
    /// allowed to finish; the caller never observes "closed" while a flush
    /// may still be pending. Only after this returns should the caller
    /// release the stream writer the collector was reading from.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(done) = self.done.take() {
            let _ = done.await;
        }
    }
}
