// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors produced while constructing the uploader or shipping a chunk.
///
/// Only [`UploadError::Config`] is fatal, and only at construction time.
/// Every upload-path error is absorbed by the scheduler: the chunk is
/// retained and re-offered at the next flush trigger.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not reach upload endpoint: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upload rejected with status {status} on {url}")]
    Status { status: StatusCode, url: String },

    #[error("could not parse upload response, got {body}")]
    MalformedResponse { body: String },

    #[error("upload writer already closed")]
    Closed,
}

impl UploadError {
    /// Transport failures and server-side statuses are worth another attempt
    /// within the same flush; everything else is not.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            UploadError::Network(_) => true,
            UploadError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}
