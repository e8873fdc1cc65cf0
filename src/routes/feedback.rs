// ABOUTME: Feedback analysis route for anonymous portal feedback triage
// ABOUTME: One-shot AI classification that degrades to a truncation summary on any upstream trouble
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Feedback triage route.
//!
//! This path is advisory, not correctness-critical: whatever happens
//! upstream (no API key, provider down, unusable model output), the caller
//! still gets a `200` with a deterministic degraded classification. Only
//! rate limiting and input validation reject the request.

use crate::coach::{feedback_prompt, validate_message, FEEDBACK_MESSAGE_MAX_CHARS};
use crate::errors::AppError;
use crate::llm::gemini::CLASSIFIER_MODEL;
use crate::llm::{extract_json_object, ChatMessage, ChatRequest, LlmProvider};
use crate::models::{FeedbackAnalysis, FeedbackType};
use crate::server::ServerResources;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Temperature for the deterministic classification task
const FEEDBACK_TEMPERATURE: f64 = 0.3;
/// Output token ceiling for the one-line triage result
const FEEDBACK_MAX_TOKENS: u32 = 200;

/// Request body for feedback analysis
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// The feedback text
    pub message: String,
    /// Portal page the feedback was submitted from
    #[serde(default)]
    pub page: Option<String>,
}

/// Feedback routes handler
pub struct FeedbackRoutes;

impl FeedbackRoutes {
    /// Create the feedback analysis route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/feedback-analyze", post(Self::analyze))
            .with_state(resources)
    }

    async fn analyze(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<FeedbackRequest>,
    ) -> Result<Json<FeedbackAnalysis>, AppError> {
        let ip = crate::auth::client_ip(&headers);
        resources.limits.feedback.require(&ip)?;

        let message = validate_message(&request.message, FEEDBACK_MESSAGE_MAX_CHARS)?;

        let Some(provider) = resources.provider.as_ref() else {
            warn!("feedback analysis running degraded: no AI provider configured");
            return Ok(Json(FeedbackAnalysis::degraded(message)));
        };

        let analysis = match Self::classify(provider.as_ref(), message, request.page.as_deref())
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "feedback classification failed; returning degraded summary");
                FeedbackAnalysis::degraded(message)
            }
        };

        info!(feedback_type = ?analysis.feedback_type, "feedback analyzed");
        Ok(Json(analysis))
    }

    /// Run the one-shot classification and parse the model's JSON.
    ///
    /// Any missing or unusable piece of the model output is an error here;
    /// the handler converts every error into the degraded result.
    async fn classify(
        provider: &dyn LlmProvider,
        message: &str,
        page: Option<&str>,
    ) -> Result<FeedbackAnalysis, AppError> {
        let request = ChatRequest::new(vec![ChatMessage::user(feedback_prompt(message, page))])
            .with_model(CLASSIFIER_MODEL)
            .with_temperature(FEEDBACK_TEMPERATURE)
            .with_max_tokens(FEEDBACK_MAX_TOKENS);

        let response = provider.complete(&request).await?;

        let parsed = extract_json_object(&response.content)
            .ok_or_else(|| AppError::upstream("Model returned no parsable JSON"))?;

        let summary = parsed
            .get("summary")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::upstream("Model returned no summary"))?
            .to_owned();

        let feedback_type = parsed
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map_or(FeedbackType::Other, FeedbackType::from_label);

        let clarifying_question = parsed
            .get("clarifyingQuestion")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Ok(FeedbackAnalysis {
            summary,
            feedback_type,
            clarifying_question,
        })
    }
}
