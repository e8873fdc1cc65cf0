// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides resource builders, token helpers, and mock LLM providers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `scout_relay` integration tests.

use async_trait::async_trait;
use futures_util::stream;
use scout_relay::config::environment::{
    AuthConfig, CorsConfig, DatabaseUrl, GeminiConfig, LogLevel, ServerConfig, WebhookConfig,
};
use scout_relay::database::Database;
use scout_relay::errors::AppError;
use scout_relay::llm::{ChatRequest, ChatResponse, ChatStream, LlmProvider, StreamChunk};
use scout_relay::server::ServerResources;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

/// JWT secret shared by every test resource set
pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
/// Webhook secret shared by every test resource set
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test configuration with both secrets set and no AI key
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        log_level: LogLevel::Warn,
        database_url: DatabaseUrl::Memory,
        gemini: GeminiConfig {
            api_key: None,
            base_url: "https://gemini.invalid/v1beta".to_owned(),
        },
        auth: AuthConfig {
            jwt_secret: Some(TEST_JWT_SECRET.to_owned()),
        },
        webhook: WebhookConfig {
            shared_secret: Some(TEST_WEBHOOK_SECRET.to_owned()),
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".to_owned()],
        },
    }
}

/// In-memory database with migrations applied
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::new("sqlite::memory:")
        .await
        .expect("in-memory database")
}

/// Server resources over an in-memory database, without an AI provider
pub async fn create_test_resources() -> Arc<ServerResources> {
    let database = create_test_database().await;
    Arc::new(ServerResources::new(test_config(), database))
}

/// Server resources with an injected mock AI provider
pub async fn create_test_resources_with_provider(
    provider: Arc<dyn LlmProvider>,
) -> Arc<ServerResources> {
    let database = create_test_database().await;
    Arc::new(ServerResources::new(test_config(), database).with_provider(Some(provider)))
}

/// Issue a bearer header value for a scout id
pub fn bearer_token(resources: &ServerResources, scout_id: &str) -> String {
    let token = resources
        .authenticator
        .issue_token(scout_id, Some("scout@example.com"), 24)
        .expect("token issuance");
    format!("Bearer {token}")
}

// ============================================================================
// Mock LLM providers
// ============================================================================

/// What a [`MockProvider`] stream should produce
#[derive(Clone)]
pub enum MockStreamScript {
    /// Deltas followed by a final chunk carrying the token count
    Deltas(Vec<String>, Option<u32>),
    /// Deltas, then a mid-stream failure
    FailAfter(Vec<String>),
}

/// Scriptable in-memory provider for route tests
pub struct MockProvider {
    /// One-shot response text, or `Err` to simulate upstream failure
    pub completion: Result<String, String>,
    /// Streaming script
    pub stream: MockStreamScript,
    calls: AtomicUsize,
    captured: std::sync::Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn completing(text: &str) -> Arc<Self> {
        Arc::new(Self {
            completion: Ok(text.to_owned()),
            stream: MockStreamScript::Deltas(vec![text.to_owned()], None),
            calls: AtomicUsize::new(0),
            captured: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            completion: Err("simulated upstream outage".to_owned()),
            stream: MockStreamScript::FailAfter(Vec::new()),
            calls: AtomicUsize::new(0),
            captured: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn streaming(deltas: &[&str], total_tokens: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            completion: Ok(deltas.concat()),
            stream: MockStreamScript::Deltas(
                deltas.iter().map(|d| (*d).to_owned()).collect(),
                total_tokens,
            ),
            calls: AtomicUsize::new(0),
            captured: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn stream_failing_after(deltas: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            completion: Err("simulated upstream outage".to_owned()),
            stream: MockStreamScript::FailAfter(deltas.iter().map(|d| (*d).to_owned()).collect()),
            calls: AtomicUsize::new(0),
            captured: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Number of upstream calls made through this provider
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests captured from upstream calls, in order
    pub fn captured_requests(&self) -> Vec<ChatRequest> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.captured.lock().unwrap().push(request.clone());
        match &self.completion {
            Ok(content) => Ok(ChatResponse {
                content: content.clone(),
                model: "mock-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            Err(message) => Err(AppError::upstream(message.clone())),
        }
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.captured.lock().unwrap().push(request.clone());

        let items: Vec<Result<StreamChunk, AppError>> = match &self.stream {
            MockStreamScript::Deltas(deltas, total_tokens) => {
                let last = deltas.len().saturating_sub(1);
                deltas
                    .iter()
                    .enumerate()
                    .map(|(i, delta)| {
                        Ok(StreamChunk {
                            delta: delta.clone(),
                            is_final: i == last,
                            finish_reason: (i == last).then(|| "STOP".to_owned()),
                            total_tokens: if i == last { *total_tokens } else { None },
                        })
                    })
                    .collect()
            }
            MockStreamScript::FailAfter(deltas) => deltas
                .iter()
                .map(|delta| {
                    Ok(StreamChunk {
                        delta: delta.clone(),
                        is_final: false,
                        finish_reason: None,
                        total_tokens: None,
                    })
                })
                .chain(std::iter::once(Err(AppError::upstream(
                    "simulated mid-stream failure",
                ))))
                .collect(),
        };

        Ok(Box::pin(stream::iter(items)))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

// ============================================================================
// SSE frame helpers
// ============================================================================

/// Parse the relay's outbound SSE body into the JSON envelopes it carried
pub fn parse_sse_envelopes(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter_map(|payload| serde_json::from_str(payload).ok())
        .collect()
}
