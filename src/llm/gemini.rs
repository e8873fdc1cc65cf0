// ABOUTME: Google Gemini provider for one-shot and streaming chat completions
// ABOUTME: Converts relay requests to the Gemini wire format and reframes its SSE responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! # Gemini Provider
//!
//! Upstream integration with the Google Generative Language API. Both
//! call modes POST to a model-scoped endpoint with the API key as a
//! query parameter:
//!
//! - one-shot: `models/{model}:generateContent`
//! - streaming: `models/{model}:streamGenerateContent?alt=sse`
//!
//! Gemini has no separate system role, so system instructions travel as
//! a leading `user` content block; assistant turns map to the `model`
//! role. Upstream error bodies are logged for diagnostics but never
//! forwarded to callers.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, InlineData, LlmProvider, MessageRole,
    StreamChunk, TokenUsage,
};
use crate::config::environment::GeminiConfig;
use crate::errors::{AppError, AppResult};

/// Default model for open-ended coaching chat
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Faster model for deterministic classification tasks
pub const CLASSIFIER_MODEL: &str = "gemini-2.0-flash";

/// Wall-clock ceiling for one-shot completions
pub const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum silence between streamed chunks before the read aborts
pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Google Gemini LLM provider
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: Client,
    default_model: String,
}

impl GeminiProvider {
    /// Create a provider with an explicit API key and base URL
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: Client::new(),
            default_model: DEFAULT_MODEL.to_owned(),
        }
    }

    /// Create a provider from server configuration. Returns `None` when
    /// no API key is configured; each endpoint degrades on its own terms.
    #[must_use]
    pub fn from_config(config: &GeminiConfig) -> Option<Self> {
        config
            .api_key
            .as_ref()
            .map(|key| Self::new(key, &config.base_url))
    }

    /// Override the default model
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn build_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{model}:{method}?key={}",
            self.base_url, self.api_key
        )
    }

    /// Gemini speaks `user`/`model`; system instructions ride as a
    /// leading user turn
    const fn convert_role(role: MessageRole) -> &'static str {
        match role {
            MessageRole::System | MessageRole::User => "user",
            MessageRole::Assistant => "model",
        }
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<GeminiContent> {
        messages
            .iter()
            .map(|message| {
                let mut parts = Vec::new();
                // Inline data goes first so the instruction text refers back
                // to an already-seen document.
                if let Some(attachment) = &message.attachment {
                    parts.push(GeminiPart::from_inline(attachment));
                }
                if !message.content.is_empty() {
                    parts.push(GeminiPart::from_text(&message.content));
                }
                GeminiContent {
                    role: Self::convert_role(message.role).to_owned(),
                    parts,
                }
            })
            .collect()
    }

    fn convert_request(request: &ChatRequest) -> GeminiRequest {
        let generation_config = if request.temperature.is_none()
            && request.max_tokens.is_none()
            && request.top_p.is_none()
        {
            None
        } else {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                top_p: request.top_p,
            })
        };

        GeminiRequest {
            contents: Self::convert_messages(&request.messages),
            generation_config,
        }
    }

    /// Classify a non-2xx upstream response. The body is logged here and
    /// deliberately absent from the caller-visible message.
    fn map_api_error(status: u16, body: &str) -> AppError {
        let detail = serde_json::from_str::<GeminiErrorResponse>(body)
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message);
        error!(
            status = status,
            detail = detail.as_deref().unwrap_or(body),
            "gemini API returned an error"
        );

        AppError::upstream(format!("AI provider returned status {status}"))
            .with_details(serde_json::json!({ "status": status }))
    }

    fn extract_content(response: &GeminiResponse) -> AppResult<String> {
        let content: String = response
            .candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if content.is_empty() {
            return Err(AppError::upstream("AI provider returned no content"));
        }
        Ok(content)
    }

    fn convert_usage(usage: Option<&GeminiUsage>) -> Option<TokenUsage> {
        usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        })
    }

    /// Interpret one streamed `data:` payload. Malformed JSON yields
    /// `None` (skip, keep reading); so do frames carrying nothing to
    /// forward or capture.
    fn parse_stream_frame(payload: &str) -> Option<Result<StreamChunk, AppError>> {
        let frame: GeminiResponse = serde_json::from_str(payload).ok()?;

        let first_candidate = frame
            .candidates
            .as_ref()
            .and_then(|candidates| candidates.first());
        let delta: String = first_candidate
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();
        let finish_reason = first_candidate.and_then(|c| c.finish_reason.clone());
        let total_tokens = frame
            .usage_metadata
            .as_ref()
            .and_then(|usage| usage.total_token_count);

        if delta.is_empty() && finish_reason.is_none() && total_tokens.is_none() {
            return None;
        }

        Some(Ok(StreamChunk {
            delta,
            is_final: finish_reason.is_some(),
            finish_reason,
            total_tokens,
        }))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    #[instrument(skip(self, request), fields(model = ?request.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let url = self.build_url(model, "generateContent");
        let body = Self::convert_request(request);

        let response = self
            .client
            .post(&url)
            .timeout(ONE_SHOT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::upstream(format!("Failed to reach AI provider: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            // Error bodies are not guaranteed JSON; read as text
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::map_api_error(status.as_u16(), &error_body));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            AppError::upstream(format!("Invalid AI provider response: {}", e.without_url()))
        })?;

        let content = Self::extract_content(&gemini_response)?;
        let usage = Self::convert_usage(gemini_response.usage_metadata.as_ref());
        let finish_reason = gemini_response
            .candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.finish_reason.clone());

        Ok(ChatResponse {
            content,
            model: model.to_owned(),
            usage,
            finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = ?request.model))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let url = self.build_url(model, "streamGenerateContent");
        let body = Self::convert_request(request);

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::upstream(format!("Failed to reach AI provider: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::map_api_error(status.as_u16(), &error_body));
        }

        // Guard against an upstream that stops sending without closing
        let byte_stream =
            tokio_stream::StreamExt::timeout(response.bytes_stream(), STREAM_IDLE_TIMEOUT).map(
                |item| match item {
                    Ok(Ok(bytes)) => Ok(bytes),
                    Ok(Err(e)) => Err(format!("transport error: {}", e.without_url())),
                    Err(_) => Err(format!(
                        "no data received for {}s",
                        STREAM_IDLE_TIMEOUT.as_secs()
                    )),
                },
            );

        Ok(create_sse_stream(
            byte_stream,
            Self::parse_stream_frame,
            "gemini",
        ))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        match self.client.get(&url).timeout(ONE_SHOT_TIMEOUT).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                warn!(error = %e.without_url(), "gemini health check failed");
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Gemini API request structure
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

/// Role-tagged content block
#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

/// Part of a content block: text or inline binary data
#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

impl GeminiPart {
    fn from_text(content: &str) -> Self {
        Self {
            text: Some(content.to_owned()),
            inline_data: None,
        }
    }

    fn from_inline(attachment: &InlineData) -> Self {
        Self {
            text: None,
            inline_data: Some(GeminiInlineData {
                mime_type: attachment.mime_type.clone(),
                data: attachment.data.clone(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: Option<String>,
}
