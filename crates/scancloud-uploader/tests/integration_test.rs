// Copyright 2025-Present ScanCloud, Inc. https://scancloud.io/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use mockito::{Matcher, Server};
use scancloud_uploader::uploader::{API_KEY_HEADER, CREATE_ENDPOINT};
use scancloud_uploader::{UploadWriter, UploaderConfig};
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout};

fn test_config(server_url: &str) -> UploaderConfig {
    let mut config = UploaderConfig::new(server_url, "mock-api-key").unwrap();
    // Scaled-down limits so the scenario runs in milliseconds: the size cap
    // is 4 KiB instead of 4 MiB, the timer fires every 200 ms.
    config.max_chunk_size = 4096;
    config.flush_interval = Duration::from_millis(200);
    config
}

fn record(fill: u8, len: usize) -> Vec<u8> {
    let mut record = vec![fill; len - 1];
    record.push(b'\n');
    record
}

/// Full pipeline run: three records under the size cap are shipped by the
/// timer as one create request; a fourth record followed by close becomes a
/// single append request to the session the create response established.
#[tokio::test]
async fn streamed_records_create_then_append() {
    let mut server = Server::new_async().await;

    let first = record(b'a', 1024);
    let second = record(b'b', 1024);
    let third = record(b'c', 512);
    let fourth = record(b'd', 1024);

    let mut create_body = first.clone();
    create_body.extend_from_slice(&second);
    create_body.extend_from_slice(&third);

    let create = server
        .mock("POST", CREATE_ENDPOINT)
        .match_query(Matcher::Any)
        .match_header(API_KEY_HEADER, "mock-api-key")
        .match_header("Content-Type", "application/octet-stream")
        .match_header("Accept", "application/json")
        .match_body(String::from_utf8(create_body).unwrap().as_str())
        .with_status(200)
        .with_body(r#"{"id":"s1"}"#)
        .create_async()
        .await;

    let append = server
        .mock("PATCH", "/v1/scans/s1/import")
        .match_query(Matcher::Any)
        .match_header(API_KEY_HEADER, "mock-api-key")
        .match_body(String::from_utf8(fourth.clone()).unwrap().as_str())
        .with_status(200)
        .with_body(r#"{"id":"s1"}"#)
        .create_async()
        .await;

    let (mut stream, sink) = tokio::io::duplex(64 * 1024);
    let writer = UploadWriter::from_stream(test_config(&server.url()), sink).unwrap();

    stream.write_all(&first).await.unwrap();
    stream.write_all(&second).await.unwrap();
    stream.write_all(&third).await.unwrap();

    // Wait for the periodic timer to ship the first chunk.
    let created = async {
        while !create.matched_async().await {
            sleep(Duration::from_millis(20)).await;
        }
    };
    timeout(Duration::from_secs(2), created)
        .await
        .expect("timed out before the create request was seen");

    stream.write_all(&fourth).await.unwrap();
    sleep(Duration::from_millis(50)).await; // let the record reach the buffer

    writer.close().await;

    create.assert_async().await;
    append.assert_async().await;
}

/// A failing intake never costs data: the first chunk is retained across the
/// failure and ships together with later records once the intake recovers.
#[tokio::test]
async fn failed_chunk_is_retried_with_new_content() {
    let mut server = Server::new_async().await;

    let failing = server
        .mock("POST", CREATE_ENDPOINT)
        .match_query(Matcher::Any)
        .with_status(502)
        .expect(1)
        .create_async()
        .await;

    let (writer, sender) = UploadWriter::channel(test_config(&server.url())).unwrap();
    sender.send("first\n".to_string()).await.unwrap();

    let failed = async {
        while !failing.matched_async().await {
            sleep(Duration::from_millis(20)).await;
        }
    };
    timeout(Duration::from_secs(2), failed)
        .await
        .expect("timed out before the failing flush was seen");
    failing.remove_async().await;

    let recovered = server
        .mock("POST", CREATE_ENDPOINT)
        .match_query(Matcher::Any)
        .match_body("first\nsecond\n")
        .with_status(200)
        .with_body(r#"{"id":"s9"}"#)
        .create_async()
        .await;

    sender.send("second\n".to_string()).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    drop(sender);
    writer.close().await;

    recovered.assert_async().await;
}

/// Stream end with nothing buffered: the run completes without a single
/// request hitting the intake.
#[tokio::test]
async fn empty_stream_uploads_nothing() {
    let mut server = Server::new_async().await;
    let intake = server
        .mock("POST", CREATE_ENDPOINT)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (stream, sink) = tokio::io::duplex(1024);
    let mut writer = UploadWriter::from_stream(test_config(&server.url()), sink).unwrap();

    drop(stream); // end of stream, queue closes
    writer.finished().await;
    assert_eq!(writer.record_count(), 0);
    writer.close().await;

    intake.assert_async().await;
}
