// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

//! Turns a buffered chunk into a single create-or-append request against the
//! cloud intake and learns the scan session id from the first response.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

use crate::config::UploaderConfig;
use crate::error::UploadError;

/// Intake path that creates a new scan session.
pub const CREATE_ENDPOINT: &str = "/v1/scans/import";

/// Header carrying the API key credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

// Client identity metadata attached to every request.
const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sink for buffered chunks.
///
/// The scheduler only ever talks to this trait, so it can be exercised
/// against a scripted sink in tests.
#[async_trait]
pub trait ChunkSink: Send {
    /// Ships one chunk. Only on success may the caller discard the chunk.
    async fn upload(&mut self, chunk: &[u8]) -> Result<(), UploadError>;

    /// Session id of the remote scan, once one has been established.
    fn scan_id(&self) -> Option<&str>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: String,
}

/// Ships chunks to the ScanCloud intake.
///
/// Holds the single mutable piece of session state: the scan id assigned by
/// the first successful response. Its absent-to-present transition happens
/// exactly once; afterwards every request appends to the same scan.
pub struct Uploader {
    client: Client,
    config: Arc<UploaderConfig>,
    scan_id: Option<String>,
}

impl Uploader {
    pub fn new(config: Arc<UploaderConfig>) -> Result<Uploader, UploadError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(UploadError::Network)?;
        Ok(Uploader {
            client,
            config,
            scan_id: None,
        })
    }

    /// Method and endpoint depend on whether a session id is known: the
    /// first accepted chunk creates the scan, later ones are appended to it.
    fn build_request(&self, chunk: &[u8]) -> Result<RequestBuilder, UploadError> {
        let (method, path) = match &self.scan_id {
            None => (Method::POST, CREATE_ENDPOINT.to_string()),
            Some(id) => (Method::PATCH, format!("/v1/scans/{id}/import")),
        };
        let url = self
            .config
            .server
            .join(&path)
            .map_err(|e| UploadError::Config(format!("could not build upload url: {e}")))?;

        Ok(self
            .client
            .request(method, url)
            .query(&[("client", CLIENT_NAME), ("version", CLIENT_VERSION)])
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("Content-Type", "application/octet-stream")
            .header("Accept", "application/json")
            .body(chunk.to_vec()))
    }

    /// Sends the chunk, honoring the configured retry strategy for transport
    /// failures and server-side statuses. Returns the raw response body.
    async fn send(&self, chunk: &[u8]) -> Result<String, UploadError> {
        let max_attempts = self.config.retry.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self.build_request(chunk)?;
            match dispatch(request).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    debug!("Upload attempt {attempt} failed, retrying: {e}");
                    let delay = self.config.retry.delay(attempt);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn dispatch(request: RequestBuilder) -> Result<String, UploadError> {
    let response = request.send().await?;
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(UploadError::Status { status, url });
    }
    Ok(body)
}

#[async_trait]
impl ChunkSink for Uploader {
    async fn upload(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let body = self.send(chunk).await?;
        let parsed: UploadResponse =
            serde_json::from_str(&body).map_err(|_| UploadError::MalformedResponse { body })?;
        // The id is adopted exactly once; later responses never change it.
        if !parsed.id.is_empty() && self.scan_id.is_none() {
            self.scan_id = Some(parsed.id);
        }
        Ok(())
    }

    fn scan_id(&self) -> Option<&str> {
        self.scan_id.as_deref()
    }
}
