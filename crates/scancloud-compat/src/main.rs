// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use scancloud_uploader::{UploadWriter, UploaderConfig};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("SCANCLOUD_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match UploaderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error creating upload configuration: {e}");
            return;
        }
    };

    let mut writer = match UploadWriter::from_stream(config, tokio::io::stdin()) {
        Ok(writer) => writer,
        Err(e) => {
            error!("Error starting the upload pipeline: {e}");
            return;
        }
    };

    debug!("Streaming scan results from stdin");

    // Stream end drains the pipeline on its own; an interrupt asks for the
    // cooperative shutdown early. Either way close() returns only after the
    // final flush has been attempted.
    tokio::select! {
        _ = writer.finished() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, flushing buffered results");
        }
    }
    writer.close().await;
}
