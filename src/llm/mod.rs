// ABOUTME: Provider-agnostic types for upstream LLM calls
// ABOUTME: Chat messages, request builders, streaming chunk types, and the provider trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! # Upstream LLM Integration
//!
//! Provider-agnostic request/response types plus the [`LlmProvider`]
//! trait the relay endpoints call through. The one production
//! implementation is [`gemini::GeminiProvider`]; tests substitute mock
//! providers behind the same trait.
//!
//! Streaming responses surface as a [`ChatStream`]: a lazy, finite,
//! non-restartable sequence of [`StreamChunk`] text deltas terminated by
//! a final chunk or an error item.

use crate::errors::AppError;
use async_trait::async_trait;
use futures_util::Stream;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::OnceLock;

/// Gemini provider implementation
pub mod gemini;
/// Line-oriented SSE reframing for upstream event streams
pub mod sse_parser;

pub use gemini::GeminiProvider;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Binary content attached to a message, sent base64-encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineData {
    /// MIME type of the payload (e.g. `application/pdf`)
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
    /// Optional binary attachment (document extraction)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<InlineData>,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachment: None,
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Attach a base64-encoded binary payload to this message
    #[must_use]
    pub fn with_attachment(
        mut self,
        mime_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        self.attachment = Some(InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        });
        self
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Configuration for a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Model identifier (provider-specific)
    pub model: Option<String>,
    /// Temperature for response randomness (0.0 - 2.0)
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold
    pub top_p: Option<f64>,
    /// Whether to stream the response
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new chat request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stream: false,
        }
    }

    /// Set the model to use
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the nucleus sampling threshold
    #[must_use]
    pub const fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Enable streaming
    #[must_use]
    pub const fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Response from a chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated message content
    pub content: String,
    /// Model used for generation
    pub model: String,
    /// Token usage statistics
    pub usage: Option<TokenUsage>,
    /// Finish reason (stop, length, etc.)
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// A chunk of a streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Content delta for this chunk
    pub delta: String,
    /// Whether this is the final chunk
    pub is_final: bool,
    /// Finish reason if final
    pub finish_reason: Option<String>,
    /// Latest cumulative token count reported upstream, if any.
    /// Captured for persistence; never forwarded to the caller.
    pub total_tokens: Option<u32>,
}

/// Stream type for chat completion responses
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

// ============================================================================
// Provider Trait
// ============================================================================

/// LLM provider trait for chat completion.
///
/// The relay endpoints depend on this trait rather than a concrete
/// provider so the upstream can be swapped or mocked without touching
/// request handling.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (e.g., "gemini")
    fn name(&self) -> &'static str;

    /// Default model when a request does not specify one
    fn default_model(&self) -> &str;

    /// Perform a one-shot (non-streaming) chat completion
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable or returns a
    /// non-success status.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;

    /// Perform a streaming chat completion
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable or rejects the
    /// request before the stream opens.
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError>;

    /// Check provider availability
    ///
    /// # Errors
    ///
    /// Returns an error if the health probe itself fails to execute.
    async fn health_check(&self) -> Result<bool, AppError>;
}

// ============================================================================
// Model Output Helpers
// ============================================================================

static JSON_SPAN: OnceLock<Option<Regex>> = OnceLock::new();

/// Extract the first structured JSON object from free-form model text.
///
/// Models asked for "only JSON" still wrap the object in markdown fences
/// or prose often enough that strict parsing would lose real results. This
/// takes the greedy span from the first `{` to the last `}` and parses it
/// leniently; `None` means no parsable object was present.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let regex = JSON_SPAN
        .get_or_init(|| Regex::new(r"\{[\s\S]*\}").ok())
        .as_ref()?;
    let span = regex.find(text)?;
    serde_json::from_str(span.as_str()).ok()
}
