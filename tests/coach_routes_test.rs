// ABOUTME: Integration tests for the streaming coach chat endpoint and conversation management
// ABOUTME: Exercises the SSE envelope protocol, persistence, context continuity, and error paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs
)]

mod common;
mod helpers;

use common::{
    bearer_token, create_test_resources, create_test_resources_with_provider, parse_sse_envelopes,
    MockProvider,
};
use helpers::axum_test::AxumTestRequest;
use scout_relay::server::{router, ServerResources};
use serde_json::json;
use sqlx::Row;

const SCOUT: &str = "scout-1";

async fn message_count(resources: &ServerResources, role: Option<&str>) -> i64 {
    let row = match role {
        Some(role) => {
            sqlx::query("SELECT COUNT(*) AS n FROM coach_messages WHERE role = $1").bind(role)
        }
        None => sqlx::query("SELECT COUNT(*) AS n FROM coach_messages"),
    }
    .fetch_one(resources.database.pool())
    .await
    .unwrap();
    row.get("n")
}

// ============================================================================
// Authentication and validation
// ============================================================================

#[tokio::test]
async fn test_chat_requires_bearer_token() {
    let resources = create_test_resources().await;

    let response = AxumTestRequest::post("/api/coach-chat")
        .json(&json!({ "message": "hello" }))
        .send(router(resources))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(response.json_value()["error"]["code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_chat_rejects_garbage_token() {
    let resources = create_test_resources().await;

    let response = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", "Bearer not-a-jwt")
        .json(&json!({ "message": "hello" }))
        .send(router(resources))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(response.json_value()["error"]["code"], "AUTH_INVALID");
}

#[tokio::test]
async fn test_chat_rejects_invalid_messages_before_any_side_effect() {
    let provider = MockProvider::streaming(&["unused"], None);
    let resources = create_test_resources_with_provider(provider.clone()).await;
    let token = bearer_token(&resources, SCOUT);

    for bad in [String::new(), "   ".to_owned(), "x".repeat(2001)] {
        let response = AxumTestRequest::post("/api/coach-chat")
            .header("authorization", &token)
            .json(&json!({ "message": bad }))
            .send(router(resources.clone()))
            .await;

        assert_eq!(response.status_code(), 400);
        assert_eq!(response.json_value()["error"]["code"], "INVALID_INPUT");
    }

    // Nothing reached the provider and nothing was persisted
    assert_eq!(provider.call_count(), 0);
    assert_eq!(message_count(&resources, None).await, 0);
}

#[tokio::test]
async fn test_chat_without_provider_is_a_server_error() {
    let resources = create_test_resources().await;
    let token = bearer_token(&resources, SCOUT);

    let response = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "hello" }))
        .send(router(resources))
        .await;

    assert_eq!(response.status_code(), 500);
    assert_eq!(
        response.json_value()["error"]["code"],
        "SERVER_MISCONFIGURED"
    );
}

// ============================================================================
// Streaming envelope protocol
// ============================================================================

#[tokio::test]
async fn test_chat_streams_meta_then_text_then_done() {
    let provider = MockProvider::streaming(&["Hallo", " Max", "!"], Some(42));
    let resources = create_test_resources_with_provider(provider).await;
    let token = bearer_token(&resources, SCOUT);

    let response = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "Wie starte ich?" }))
        .send(router(resources.clone()))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/event-stream"));

    let envelopes = parse_sse_envelopes(&response.text());
    assert_eq!(envelopes.len(), 5);
    assert_eq!(envelopes[0]["type"], "meta");
    assert!(envelopes[0]["conversationId"].as_str().is_some());
    assert_eq!(envelopes[1], json!({ "type": "text", "content": "Hallo" }));
    assert_eq!(envelopes[2], json!({ "type": "text", "content": " Max" }));
    assert_eq!(envelopes[3], json!({ "type": "text", "content": "!" }));
    assert_eq!(envelopes[4], json!({ "type": "done" }));
}

#[tokio::test]
async fn test_chat_persists_both_turns_with_usage() {
    let provider = MockProvider::streaming(&["Sure, ", "here's how."], Some(42));
    let resources = create_test_resources_with_provider(provider).await;
    let token = bearer_token(&resources, SCOUT);

    let response = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "How do I refer an athlete?" }))
        .send(router(resources.clone()))
        .await;
    assert_eq!(response.status_code(), 200);

    let envelopes = parse_sse_envelopes(&response.text());
    let conversation_id = envelopes[0]["conversationId"].as_str().unwrap().to_owned();

    let messages = resources
        .database
        .conversations()
        .list_messages(&conversation_id, SCOUT)
        .await
        .unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].content, "How do I refer an athlete?");
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].content, "Sure, here's how.");
    assert_eq!(messages[1].tokens_used, Some(42));
    assert!(messages[1].latency_ms.is_some());

    // Token usage rolls up onto the conversation
    let conversation = resources
        .database
        .conversations()
        .active_conversation(SCOUT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.id, conversation_id);
    assert_eq!(conversation.total_tokens, 42);
}

#[tokio::test]
async fn test_chat_mid_stream_failure_ends_with_error_frame() {
    let provider = MockProvider::stream_failing_after(&["partial reply"]);
    let resources = create_test_resources_with_provider(provider).await;
    let token = bearer_token(&resources, SCOUT);

    let response = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "hello" }))
        .send(router(resources.clone()))
        .await;

    // Headers were already committed, so the failure is in-band
    assert_eq!(response.status_code(), 200);

    let envelopes = parse_sse_envelopes(&response.text());
    assert_eq!(envelopes[0]["type"], "meta");
    assert_eq!(
        envelopes[1],
        json!({ "type": "text", "content": "partial reply" })
    );
    assert_eq!(envelopes.last().unwrap()["type"], "error");
    assert!(!envelopes.iter().any(|e| e["type"] == "done"));

    // The interrupted reply is not persisted; the user turn is
    assert_eq!(message_count(&resources, Some("assistant")).await, 0);
    assert_eq!(message_count(&resources, Some("user")).await, 1);
}

#[tokio::test]
async fn test_chat_empty_stream_skips_assistant_persistence() {
    let provider = MockProvider::streaming(&[], None);
    let resources = create_test_resources_with_provider(provider).await;
    let token = bearer_token(&resources, SCOUT);

    let response = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "hello" }))
        .send(router(resources.clone()))
        .await;

    let envelopes = parse_sse_envelopes(&response.text());
    assert_eq!(envelopes[0]["type"], "meta");
    assert_eq!(envelopes.last().unwrap()["type"], "done");

    assert_eq!(message_count(&resources, Some("assistant")).await, 0);
    assert_eq!(message_count(&resources, Some("user")).await, 1);
}

// ============================================================================
// Context continuity
// ============================================================================

#[tokio::test]
async fn test_second_turn_carries_first_exchange_upstream() {
    let provider = MockProvider::streaming(&["First reply"], None);
    let resources = create_test_resources_with_provider(provider.clone()).await;
    let token = bearer_token(&resources, SCOUT);

    let first = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "first question" }))
        .send(router(resources.clone()))
        .await;
    let first_meta = parse_sse_envelopes(&first.text())[0].clone();

    let second = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "second question" }))
        .send(router(resources.clone()))
        .await;
    let second_meta = parse_sse_envelopes(&second.text())[0].clone();

    // Same active conversation on both turns
    assert_eq!(first_meta["conversationId"], second_meta["conversationId"]);

    let captured = provider.captured_requests();
    assert_eq!(captured.len(), 2);

    let contents: Vec<&str> = captured[1]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert!(contents.contains(&"first question"));
    assert!(contents.contains(&"First reply"));
    assert_eq!(*contents.last().unwrap(), "second question");

    // The system instruction carries the server-computed facts block
    assert!(captured[1].messages[0].content.contains("SCOUT CONTEXT:"));
}

#[tokio::test]
async fn test_explicit_conversation_id_is_honored() {
    let provider = MockProvider::streaming(&["ok"], None);
    let resources = create_test_resources_with_provider(provider).await;
    let token = bearer_token(&resources, SCOUT);

    let conversation = resources
        .database
        .conversations()
        .create_conversation(SCOUT)
        .await
        .unwrap();

    let response = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "hello", "conversationId": conversation.id }))
        .send(router(resources))
        .await;

    let envelopes = parse_sse_envelopes(&response.text());
    assert_eq!(
        envelopes[0]["conversationId"].as_str().unwrap(),
        conversation.id
    );
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_chat_rate_limit_admits_ten_per_scout() {
    let resources = create_test_resources().await;
    let token = bearer_token(&resources, SCOUT);

    // The window is consumed before validation, so cheap invalid bodies
    // exhaust it without touching the provider
    for _ in 0..10 {
        let response = AxumTestRequest::post("/api/coach-chat")
            .header("authorization", &token)
            .json(&json!({ "message": "" }))
            .send(router(resources.clone()))
            .await;
        assert_eq!(response.status_code(), 400);
    }

    let eleventh = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "" }))
        .send(router(resources.clone()))
        .await;
    assert_eq!(eleventh.status_code(), 429);
    assert_eq!(eleventh.header("x-ratelimit-limit").as_deref(), Some("10"));
    assert!(eleventh.header("retry-after").is_some());

    // A different scout still has a full window
    let other_token = bearer_token(&resources, "scout-2");
    let other = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &other_token)
        .json(&json!({ "message": "" }))
        .send(router(resources))
        .await;
    assert_eq!(other.status_code(), 400);
}

// ============================================================================
// Conversation management endpoints
// ============================================================================

#[tokio::test]
async fn test_active_conversation_lifecycle() {
    let resources = create_test_resources().await;
    let token = bearer_token(&resources, SCOUT);

    let before = AxumTestRequest::get("/api/coach/conversations/active")
        .header("authorization", &token)
        .send(router(resources.clone()))
        .await;
    assert_eq!(before.status_code(), 200);
    assert!(before.json_value()["conversation"].is_null());

    let reset = AxumTestRequest::post("/api/coach/conversations")
        .header("authorization", &token)
        .send(router(resources.clone()))
        .await;
    assert_eq!(reset.status_code(), 200);
    let created = reset.json_value()["conversation"].clone();
    assert_eq!(created["isActive"], true);
    assert_eq!(created["totalTokens"], 0);

    let after = AxumTestRequest::get("/api/coach/conversations/active")
        .header("authorization", &token)
        .send(router(resources.clone()))
        .await;
    assert_eq!(after.json_value()["conversation"]["id"], created["id"]);

    // A second reset supersedes the first conversation
    let second_reset = AxumTestRequest::post("/api/coach/conversations")
        .header("authorization", &token)
        .send(router(resources.clone()))
        .await;
    let replacement = second_reset.json_value()["conversation"]["id"].clone();
    assert_ne!(replacement, created["id"]);

    let current = AxumTestRequest::get("/api/coach/conversations/active")
        .header("authorization", &token)
        .send(router(resources))
        .await;
    assert_eq!(current.json_value()["conversation"]["id"], replacement);
}

#[tokio::test]
async fn test_transcript_is_scoped_to_the_requesting_scout() {
    let provider = MockProvider::streaming(&["reply"], None);
    let resources = create_test_resources_with_provider(provider).await;
    let token = bearer_token(&resources, SCOUT);

    let chat = AxumTestRequest::post("/api/coach-chat")
        .header("authorization", &token)
        .json(&json!({ "message": "hello" }))
        .send(router(resources.clone()))
        .await;
    let conversation_id = parse_sse_envelopes(&chat.text())[0]["conversationId"]
        .as_str()
        .unwrap()
        .to_owned();

    let transcript = AxumTestRequest::get(&format!(
        "/api/coach/conversations/{conversation_id}/messages"
    ))
    .header("authorization", &token)
    .send(router(resources.clone()))
    .await;
    assert_eq!(transcript.status_code(), 200);
    let messages = transcript.json_value()["messages"].clone();
    assert_eq!(messages.as_array().unwrap().len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");

    // Another scout sees an empty transcript, not this one
    let intruder_token = bearer_token(&resources, "scout-2");
    let foreign = AxumTestRequest::get(&format!(
        "/api/coach/conversations/{conversation_id}/messages"
    ))
    .header("authorization", &intruder_token)
    .send(router(resources))
    .await;
    assert_eq!(foreign.status_code(), 200);
    assert!(foreign.json_value()["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_starters_returns_three_prompts() {
    let resources = create_test_resources().await;
    let token = bearer_token(&resources, SCOUT);

    let response = AxumTestRequest::get("/api/coach/starters")
        .header("authorization", &token)
        .send(router(resources))
        .await;

    assert_eq!(response.status_code(), 200);
    let starters = response.json_value()["starters"].clone();
    assert_eq!(starters.as_array().unwrap().len(), 3);
    for starter in starters.as_array().unwrap() {
        assert!(!starter["text"].as_str().unwrap().is_empty());
        assert!(!starter["emoji"].as_str().unwrap().is_empty());
    }
}
