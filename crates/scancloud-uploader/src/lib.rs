// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

//! Streaming upload of newline-delimited scan results to the ScanCloud
//! dashboard.
//!
//! Results are read off a byte stream, batched into size- and time-bounded
//! chunks, and shipped sequentially to the cloud intake. The first accepted
//! chunk creates a remote scan session; every later chunk is appended to the
//! same session, so an interrupted run still leaves a resumable scan behind.
//!
//! The pipeline is two tasks joined by a small bounded queue:
//!
//! ```text
//!  byte stream ──> Collector ──> queue(4) ──> Scheduler ──> Uploader ──> intake
//!                                                │                        │
//!                                                └──── scan session id ◄──┘
//! ```
//!
//! The bounded queue is the backpressure mechanism: while an upload is in
//! flight the scheduler drains nothing, the queue fills, and the collector
//! (and transitively the stream producer) suspends on enqueue.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod collector;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod uploader;
pub mod writer;

pub use config::{RetryStrategy, UploaderConfig};
pub use error::UploadError;
pub use writer::{RecordSender, UploadWriter};
