// ABOUTME: Line-oriented SSE reframing for upstream provider event streams
// ABOUTME: Buffers partial lines across TCP boundaries and adapts byte streams to chunk streams
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! # SSE Stream Parser
//!
//! Incremental parsing of upstream `text/event-stream` bodies. The body
//! arrives as arbitrary byte chunks with no alignment to SSE frames: a
//! chunk can end mid-line, mid-JSON, or mid-UTF-8 sequence. This module
//! solves the resulting correctness issues once, for any provider:
//!
//! 1. **Multiple events per TCP chunk**: all complete lines in a chunk
//!    are emitted, not just the first.
//! 2. **Partial lines across TCP boundaries**: incomplete trailing bytes
//!    are held until the closing newline arrives, so the emitted event
//!    sequence is identical no matter how the transport splits the body.
//!
//! Bytes are buffered raw and decoded per complete line, which keeps a
//! chunk boundary inside a multi-byte character from mangling the text.
//!
//! Provider-specific JSON interpretation is injected into
//! [`create_sse_stream`] as a closure; payloads the closure cannot parse
//! are skipped without aborting the stream.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{Stream, StreamExt};
use tracing::warn;

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The literal `[DONE]` termination token (OpenAI convention)
    Done,
}

/// Line-buffering SSE parser that handles partial lines across TCP
/// chunk boundaries.
///
/// SSE streams are newline-delimited; TCP guarantees no alignment
/// between network chunks and event boundaries. This parser buffers
/// incomplete lines and emits events only when a full line (terminated
/// by `\n`) is available.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Accumulated bytes not yet terminated by a newline
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed raw bytes from a TCP chunk, returning any complete events.
    ///
    /// Complete lines are extracted and parsed; a trailing partial line
    /// stays buffered for the next `feed` call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&line_bytes) {
                events.push(event);
            }
        }
        events
    }

    /// Flush any remaining buffered content as a final event.
    ///
    /// Called when the byte stream ends with a partial line (no trailing
    /// newline) still in the buffer.
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        if remaining.is_empty() {
            return Vec::new();
        }
        parse_line(&remaining).into_iter().collect()
    }
}

/// Interpret one raw line. Blank lines (frame separators) and non-data
/// SSE fields (`event:`, `id:`, `retry:`, comments) yield nothing.
fn parse_line(line_bytes: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(line_bytes);
    let trimmed = text.trim_end_matches(['\n', '\r']).trim();

    if trimmed.is_empty() {
        return None;
    }
    if trimmed == "data: [DONE]" {
        return Some(SseEvent::Done);
    }
    let payload = trimmed.strip_prefix("data: ")?;
    if payload.trim().is_empty() {
        None
    } else {
        Some(SseEvent::Data(payload.to_owned()))
    }
}

struct SseStreamState<E, F> {
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    parser: SseLineBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    stream_ended: bool,
    parse_data: F,
    provider: String,
}

impl<E, F> SseStreamState<E, F>
where
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
{
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Data(payload) => {
                    if let Some(item) = (self.parse_data)(&payload) {
                        self.pending.push_back(item);
                    }
                    // None means the frame was malformed or carried
                    // nothing forwardable; skip it and keep reading
                }
                // The terminator token is a no-op, not data
                SseEvent::Done => {}
            }
        }
    }
}

/// Create a properly-buffered chunk stream from a raw byte stream.
///
/// `parse_data` converts one `data:` payload into `None` (skip),
/// `Some(Ok(chunk))` (forward a delta), or `Some(Err(_))` (fatal). A
/// transport read error becomes the stream's final item; events parsed
/// before it are still delivered first.
pub fn create_sse_stream<S, E, F>(byte_stream: S, parse_data: F, provider_name: &str) -> ChatStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = SseStreamState {
        byte_stream: Box::pin(byte_stream),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        stream_ended: false,
        parse_data,
        provider: provider_name.to_owned(),
    };

    // unfold keeps parser state across async iterations: each turn either
    // drains a pending event or reads the next TCP chunk
    Box::pin(unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.stream_ended {
                return None;
            }

            match state.byte_stream.next().await {
                Some(Ok(bytes)) => {
                    let events = state.parser.feed(&bytes);
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    warn!(provider = %state.provider, error = %e, "upstream stream read failed");
                    state.stream_ended = true;
                    state
                        .pending
                        .push_back(Err(AppError::upstream(format!("Stream read error: {e}"))));
                }
                None => {
                    state.stream_ended = true;
                    let events = state.parser.flush();
                    state.absorb(events);
                }
            }
        }
    }))
}
