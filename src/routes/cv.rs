// ABOUTME: CV extraction route turning an uploaded PDF into whitelisted profile fields
// ABOUTME: Validates the base64 payload and sanitizes whatever the model returns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! CV extraction route.
//!
//! Anonymous and tightly rate-limited (3/min per IP) because each call
//! ships a multi-megabyte document upstream. The model's JSON is never
//! trusted: [`ExtractedProfile::from_untrusted`] keeps only the six
//! whitelisted fields, trimmed and truncated.

use crate::coach::CV_EXTRACTION_PROMPT;
use crate::errors::AppError;
use crate::llm::gemini::DEFAULT_MODEL;
use crate::llm::{extract_json_object, ChatMessage, ChatRequest};
use crate::models::ExtractedProfile;
use crate::server::ServerResources;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Ceiling on the base64 payload, ~5MB of binary PDF
pub const PDF_BASE64_MAX_CHARS: usize = 7_000_000;

/// Temperature for the deterministic extraction task
const CV_TEMPERATURE: f64 = 0.1;
/// Output token ceiling for the extracted profile JSON
const CV_MAX_TOKENS: u32 = 1024;

/// Message returned when the model finds nothing usable in the document
const NO_DATA_MESSAGE: &str = "No profile data found in CV";

/// Request body for CV extraction
#[derive(Debug, Deserialize)]
pub struct ExtractCvRequest {
    /// Base64-encoded PDF bytes
    #[serde(rename = "pdfBase64")]
    pub pdf_base64: String,
}

/// Response body for CV extraction
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractCvResponse {
    /// Sanitized profile fields; empty object when nothing was found
    pub extracted: ExtractedProfile,
    /// Present only when extraction yielded nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// CV extraction routes handler
pub struct CvRoutes;

impl CvRoutes {
    /// Create the CV extraction route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/extract-cv", post(Self::extract))
            .with_state(resources)
    }

    async fn extract(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<ExtractCvRequest>,
    ) -> Result<Json<ExtractCvResponse>, AppError> {
        let ip = crate::auth::client_ip(&headers);
        resources.limits.cv.require(&ip)?;

        validate_pdf_payload(&request.pdf_base64)?;

        let provider = resources
            .provider
            .as_ref()
            .ok_or_else(|| AppError::misconfigured("GEMINI_API_KEY is not configured"))?;

        let llm_request = ChatRequest::new(vec![ChatMessage::user(CV_EXTRACTION_PROMPT)
            .with_attachment("application/pdf", request.pdf_base64)])
        .with_model(DEFAULT_MODEL)
        .with_temperature(CV_TEMPERATURE)
        .with_max_tokens(CV_MAX_TOKENS);

        let response = provider.complete(&llm_request).await?;

        let extracted = extract_json_object(&response.content)
            .map(|value| ExtractedProfile::from_untrusted(&value))
            .unwrap_or_default();

        if extracted.is_empty() {
            info!("cv extraction found no usable profile data");
            return Ok(Json(ExtractCvResponse {
                extracted: ExtractedProfile::default(),
                message: Some(NO_DATA_MESSAGE.to_owned()),
            }));
        }

        info!("cv extraction succeeded");
        Ok(Json(ExtractCvResponse {
            extracted,
            message: None,
        }))
    }
}

/// Reject empty, oversized, or non-base64 payloads before the upstream call
fn validate_pdf_payload(pdf_base64: &str) -> Result<(), AppError> {
    if pdf_base64.is_empty() {
        return Err(AppError::invalid_input("pdfBase64 must not be empty"));
    }
    if pdf_base64.len() > PDF_BASE64_MAX_CHARS {
        return Err(AppError::invalid_input(
            "PDF exceeds the 5MB size limit",
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(pdf_base64)
        .map_err(|_| AppError::invalid_input("pdfBase64 is not valid base64"))?;
    Ok(())
}
