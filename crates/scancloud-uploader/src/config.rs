// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::error::UploadError;

/// Largest chunk handed to the intake in a single request. A record whose
/// admission would push the buffer past this triggers a flush first.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// How often a non-empty buffer is flushed even when it stays under
/// [`MAX_CHUNK_SIZE`].
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Generous per-request upper bound; chunks can be multiple MiB on slow links.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Base of the human-readable scan link shown in logs.
pub const DEFAULT_DASHBOARD_URL: &str = "https://cloud.scancloud.io";

const SERVER_URL_VAR: &str = "SCANCLOUD_SERVER_URL";
const API_KEY_VAR: &str = "SCANCLOUD_API_KEY";
const DASHBOARD_URL_VAR: &str = "SCANCLOUD_DASHBOARD_URL";

/// Retry policy applied within a single flush attempt.
///
/// This only covers back-to-back attempts against the intake; retry across
/// flushes comes from the scheduler retaining a failed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Up to `n` attempts with no delay between them.
    Immediate(u32),
    /// Up to `n` attempts, adding `base` seconds of delay per attempt.
    LinearBackoff(u32, u64),
}

impl RetryStrategy {
    pub(crate) fn max_attempts(&self) -> u32 {
        match self {
            RetryStrategy::Immediate(n) | RetryStrategy::LinearBackoff(n, _) => (*n).max(1),
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::LinearBackoff(_, base) => {
                Duration::from_secs(base.saturating_mul(u64::from(attempt)))
            }
        }
    }
}

/// Configuration for the upload pipeline.
///
/// `server` and `api_key` are required; everything else defaults to the
/// values the intake was sized for.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub server: Url,
    pub api_key: String,
    pub max_chunk_size: usize,
    pub flush_interval: Duration,
    pub request_timeout: Duration,
    pub retry: RetryStrategy,
    pub dashboard_base: Url,
}

impl UploaderConfig {
    pub fn new(server: &str, api_key: &str) -> Result<UploaderConfig, UploadError> {
        if api_key.trim().is_empty() {
            return Err(UploadError::Config("no API key provided".to_string()));
        }
        let server = Url::parse(server)
            .map_err(|e| UploadError::Config(format!("could not parse server url: {e}")))?;
        let dashboard_base = Url::parse(DEFAULT_DASHBOARD_URL)
            .map_err(|e| UploadError::Config(format!("could not parse dashboard url: {e}")))?;

        Ok(UploaderConfig {
            server,
            api_key: api_key.to_string(),
            max_chunk_size: MAX_CHUNK_SIZE,
            flush_interval: FLUSH_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
            retry: RetryStrategy::Immediate(1),
            dashboard_base,
        })
    }

    /// Builds a configuration from `SCANCLOUD_*` environment variables.
    /// Missing credentials surface here, before any task is spawned.
    pub fn from_env() -> Result<UploaderConfig, UploadError> {
        let server = env::var(SERVER_URL_VAR).map_err(|_| {
            UploadError::Config(format!("{SERVER_URL_VAR} environment variable is not set"))
        })?;
        let api_key = env::var(API_KEY_VAR).map_err(|_| {
            UploadError::Config(format!("{API_KEY_VAR} environment variable is not set"))
        })?;

        let mut config = UploaderConfig::new(&server, &api_key)?;
        if let Ok(dashboard) = env::var(DASHBOARD_URL_VAR) {
            config.dashboard_base = Url::parse(&dashboard)
                .map_err(|e| UploadError::Config(format!("could not parse dashboard url: {e}")))?;
        }
        Ok(config)
    }

    /// Link to the scan on the web dashboard.
    pub fn dashboard_url(&self, scan_id: &str) -> String {
        format!(
            "{}/scans/{}",
            self.dashboard_base.as_str().trim_end_matches('/'),
            scan_id
        )
    }
}
