// ABOUTME: Coach chat route handlers including the streaming AI relay
// ABOUTME: Conversation management endpoints plus the SSE coach-chat stream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Coach chat routes.
//!
//! `POST /api/coach-chat` is the streaming relay: authenticate, rate-limit,
//! validate, assemble context, persist the user turn, open the upstream
//! stream, and re-emit deltas as application SSE frames. The surrounding
//! endpoints manage the active conversation and expose starter prompts.
//!
//! Every failure before the response is committed returns ordinary JSON
//! with the mapped status; once the stream has started, failures surface
//! as a terminal `error` frame instead of a truncated connection. If the
//! client disconnects mid-stream, axum drops the response stream and with
//! it the upstream read, so no orphaned provider connection survives.

use crate::coach::{
    assemble_chat_messages, starters_for, validate_message, Starter, CHAT_MESSAGE_MAX_CHARS,
    MAX_HISTORY_TURNS,
};
use crate::database::ConversationRecord;
use crate::errors::AppError;
use crate::llm::gemini::DEFAULT_MODEL;
use crate::llm::ChatRequest;
use crate::models::StreamEnvelope;
use crate::server::ServerResources;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::StreamExt;
use tracing::{error, info};

/// Temperature for open-ended coaching chat
const CHAT_TEMPERATURE: f64 = 0.7;
/// Output token ceiling for a single coach reply
const CHAT_MAX_TOKENS: u32 = 1024;
/// Nucleus sampling threshold for coaching chat
const CHAT_TOP_P: f64 = 0.9;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the streaming chat endpoint.
///
/// Deliberately has no history or facts fields: conversational context is
/// server-authoritative and re-derived per request.
#[derive(Debug, Deserialize)]
pub struct CoachChatRequest {
    /// The new user message
    pub message: String,
    /// Explicit conversation to append to; the active one is used when absent
    #[serde(rename = "conversationId", default)]
    pub conversation_id: Option<String>,
}

/// Conversation shape returned by the management endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationView {
    /// Conversation ID
    pub id: String,
    /// User-visible title when set
    pub title: Option<String>,
    /// Whether this is the scout's current conversation
    #[serde(rename = "isActive")]
    pub is_active: bool,
    /// Total tokens accumulated across assistant turns
    #[serde(rename = "totalTokens")]
    pub total_tokens: i64,
    /// Creation timestamp (RFC 3339)
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl From<ConversationRecord> for ConversationView {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            is_active: record.is_active,
            total_tokens: record.total_tokens,
            created_at: record.created_at,
        }
    }
}

/// Wrapper for endpoints returning a single (possibly absent) conversation
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    /// The conversation, or `null` when the scout has none active
    pub conversation: Option<ConversationView>,
}

/// One message of a conversation transcript
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    /// Message ID
    pub id: String,
    /// Sender role (`user` or `assistant`)
    pub role: String,
    /// Message text
    pub content: String,
    /// Upstream token count for assistant turns, when reported
    #[serde(rename = "tokensUsed", skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i64>,
    /// Upstream latency for assistant turns
    #[serde(rename = "latencyMs", skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
    /// Creation timestamp (RFC 3339)
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Response for the transcript endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Messages in chronological order
    pub messages: Vec<MessageView>,
}

/// Response for the starter prompts endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct StartersResponse {
    /// Three suggested opening prompts
    pub starters: Vec<Starter>,
}

// ============================================================================
// Coach Routes
// ============================================================================

/// Coach chat routes handler
pub struct CoachRoutes;

impl CoachRoutes {
    /// Create all coach routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/coach-chat", post(Self::coach_chat))
            .route("/api/coach/conversations", post(Self::reset_conversation))
            .route(
                "/api/coach/conversations/active",
                get(Self::active_conversation),
            )
            .route(
                "/api/coach/conversations/:conversation_id/messages",
                get(Self::list_messages),
            )
            .route("/api/coach/starters", get(Self::starters))
            .with_state(resources)
    }

    /// Stream a coach reply over SSE.
    ///
    /// Frame order on the wire: `meta` (resolved conversation id), then
    /// zero or more `text` deltas, then exactly one of `done`/`error`.
    async fn coach_chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CoachChatRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let identity = resources.authenticator.verify_bearer(&headers)?;
        let scout_id = identity.scout_id;
        resources.limits.chat.require(&scout_id)?;

        let message = validate_message(&request.message, CHAT_MESSAGE_MAX_CHARS)?.to_owned();

        let provider = resources
            .provider
            .as_ref()
            .ok_or_else(|| AppError::misconfigured("GEMINI_API_KEY is not configured"))?;

        // The facts queries and the conversation lookup are independent
        let store = resources.database.conversations();
        let scouts = resources.database.scouts();
        let (facts, conversation_id) = tokio::try_join!(
            scouts.scout_facts(&scout_id),
            store.ensure_active_conversation(&scout_id, request.conversation_id.as_deref())
        )?;

        let history = store
            .recent_messages(
                &conversation_id,
                &scout_id,
                i64::try_from(MAX_HISTORY_TURNS).unwrap_or(20),
            )
            .await?;

        // The user turn is durable before any upstream spend; failure here
        // aborts the request.
        store
            .append_user_turn(&conversation_id, &scout_id, &message)
            .await?;

        let llm_request = ChatRequest::new(assemble_chat_messages(&facts, &history, &message))
            .with_model(DEFAULT_MODEL)
            .with_temperature(CHAT_TEMPERATURE)
            .with_max_tokens(CHAT_MAX_TOKENS)
            .with_top_p(CHAT_TOP_P)
            .with_streaming();

        let started = Instant::now();
        let mut llm_stream = provider.complete_stream(&llm_request).await?;

        info!(scout_id = %scout_id, conversation_id = %conversation_id, "coach chat stream opened");

        let stream = async_stream::stream! {
            yield sse_frame(&StreamEnvelope::Meta {
                conversation_id: conversation_id.clone(),
            });

            let mut full_text = String::new();
            let mut total_tokens: Option<u32> = None;

            while let Some(chunk_result) = llm_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        if let Some(tokens) = chunk.total_tokens {
                            total_tokens = Some(tokens);
                        }
                        if !chunk.delta.is_empty() {
                            full_text.push_str(&chunk.delta);
                            yield sse_frame(&StreamEnvelope::Text {
                                content: chunk.delta,
                            });
                        }
                    }
                    Err(e) => {
                        error!(conversation_id = %conversation_id, error = %e, "coach chat stream failed mid-flight");
                        yield sse_frame(&StreamEnvelope::Error {
                            message: "The AI service interrupted the response".to_owned(),
                        });
                        return;
                    }
                }
            }

            // Persist the assistant turn unless upstream produced nothing.
            // The reply is already delivered, so a persistence failure is
            // logged rather than surfaced.
            if !full_text.is_empty() {
                let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                if let Err(e) = store
                    .append_assistant_turn(
                        &conversation_id,
                        &scout_id,
                        &full_text,
                        total_tokens,
                        latency_ms,
                    )
                    .await
                {
                    error!(conversation_id = %conversation_id, error = %e, "failed to persist assistant turn");
                }
            }

            yield sse_frame(&StreamEnvelope::Done);
        };

        Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
    }

    /// Reset to a fresh active conversation
    async fn reset_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<ConversationResponse>, AppError> {
        let identity = resources.authenticator.verify_bearer(&headers)?;

        let record = resources
            .database
            .conversations()
            .start_new_conversation(&identity.scout_id)
            .await?;

        info!(scout_id = %identity.scout_id, conversation_id = %record.id, "conversation reset");

        Ok(Json(ConversationResponse {
            conversation: Some(record.into()),
        }))
    }

    /// Look up the scout's active conversation
    async fn active_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<ConversationResponse>, AppError> {
        let identity = resources.authenticator.verify_bearer(&headers)?;

        let record = resources
            .database
            .conversations()
            .active_conversation(&identity.scout_id)
            .await?;

        Ok(Json(ConversationResponse {
            conversation: record.map(Into::into),
        }))
    }

    /// List a conversation's full transcript, scout-scoped
    async fn list_messages(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Json<MessagesResponse>, AppError> {
        let identity = resources.authenticator.verify_bearer(&headers)?;

        let messages = resources
            .database
            .conversations()
            .list_messages(&conversation_id, &identity.scout_id)
            .await?;

        Ok(Json(MessagesResponse {
            messages: messages
                .into_iter()
                .map(|m| MessageView {
                    id: m.id,
                    role: m.role,
                    content: m.content,
                    tokens_used: m.tokens_used,
                    latency_ms: m.latency_ms,
                    created_at: m.created_at,
                })
                .collect(),
        }))
    }

    /// Suggested opening prompts from the scout's pipeline state
    async fn starters(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<StartersResponse>, AppError> {
        let identity = resources.authenticator.verify_bearer(&headers)?;

        let facts = resources
            .database
            .scouts()
            .scout_facts(&identity.scout_id)
            .await?;

        Ok(Json(StartersResponse {
            starters: starters_for(&facts),
        }))
    }
}

/// Serialize an envelope as one SSE `data:` frame
fn sse_frame(envelope: &StreamEnvelope) -> Result<Event, Infallible> {
    Ok(Event::default().data(envelope.to_frame_json()))
}
