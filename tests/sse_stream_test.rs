// ABOUTME: Integration tests for upstream SSE reframing over arbitrary transport chunkings
// ABOUTME: Verifies chunk-boundary invariance, malformed-frame tolerance, and read-error handling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs
)]

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use scout_relay::errors::AppError;
use scout_relay::llm::sse_parser::create_sse_stream;
use scout_relay::llm::StreamChunk;

/// Upstream body with three text frames, a malformed frame, a non-data
/// field, and the OpenAI-style terminator token
const UPSTREAM_BODY: &str = "data: {\"text\": \"Hallo\"}\n\n\
                             event: ping\n\
                             data: {\"text\": \"broken\n\
                             data: {\"text\": \" Max\"}\n\n\
                             data: {\"text\": \"!\"}\n\n\
                             data: [DONE]\n";

/// Parse one `data:` payload the way the Gemini adapter does: JSON with a
/// `text` field becomes a delta, anything else is skipped
fn parse_text_payload(payload: &str) -> Option<Result<StreamChunk, AppError>> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let delta = value.get("text")?.as_str()?.to_owned();
    Some(Ok(StreamChunk {
        delta,
        is_final: false,
        finish_reason: None,
        total_tokens: None,
    }))
}

/// Split `body` into chunks of `size` bytes and run it through the reframer
async fn deltas_with_chunk_size(body: &str, size: usize) -> Vec<String> {
    let chunks: Vec<Result<Bytes, String>> = body
        .as_bytes()
        .chunks(size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let mut stream = create_sse_stream(stream::iter(chunks), parse_text_payload, "test");
    let mut deltas = Vec::new();
    while let Some(item) = stream.next().await {
        deltas.push(item.unwrap().delta);
    }
    deltas
}

#[tokio::test]
async fn test_emitted_deltas_are_invariant_to_transport_chunking() {
    let expected = vec!["Hallo".to_owned(), " Max".to_owned(), "!".to_owned()];

    // One byte at a time, mid-line splits, and the whole body at once
    // must all produce the identical delta sequence
    for size in [1, 2, 3, 7, 16, 64, UPSTREAM_BODY.len()] {
        assert_eq!(
            deltas_with_chunk_size(UPSTREAM_BODY, size).await,
            expected,
            "chunk size {size} changed the emitted sequence"
        );
    }
}

#[tokio::test]
async fn test_malformed_frames_are_skipped_not_fatal() {
    // The "broken" frame never closes its JSON; later frames still arrive
    let deltas = deltas_with_chunk_size(UPSTREAM_BODY, 10).await;
    assert!(!deltas.iter().any(|d| d.contains("broken")));
    assert_eq!(deltas.len(), 3);
}

#[tokio::test]
async fn test_trailing_frame_without_newline_is_flushed() {
    let body = "data: {\"text\": \"first\"}\ndata: {\"text\": \"tail\"}";
    let deltas = deltas_with_chunk_size(body, 5).await;
    assert_eq!(deltas, vec!["first".to_owned(), "tail".to_owned()]);
}

#[tokio::test]
async fn test_read_error_surfaces_after_parsed_events() {
    let chunks: Vec<Result<Bytes, String>> = vec![
        Ok(Bytes::from_static(b"data: {\"text\": \"before\"}\n")),
        Err("connection reset".to_owned()),
    ];

    let mut stream = create_sse_stream(stream::iter(chunks), parse_text_payload, "test");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.delta, "before");

    let second = stream.next().await.unwrap();
    let error = second.unwrap_err();
    assert_eq!(error.http_status(), 502);

    // The error is terminal
    assert!(stream.next().await.is_none());
}
