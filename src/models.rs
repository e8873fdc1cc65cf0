// ABOUTME: Core domain models shared across relay endpoints
// ABOUTME: Outbound SSE envelopes, scout facts, feedback triage, and CV extraction shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Domain models shared by the relay's endpoints and tests.

use serde::{Deserialize, Serialize};

/// Ceiling applied to every extracted CV string field
pub const CV_FIELD_MAX_CHARS: usize = 500;
/// Ceiling for the degraded feedback summary
pub const FEEDBACK_SUMMARY_MAX_CHARS: usize = 100;

// ============================================================================
// Outbound SSE envelope
// ============================================================================

/// One frame of the relay's outbound SSE protocol.
///
/// A stream is `meta` once, `text` zero or more times, then exactly one
/// terminal frame: `done` on success or `error` when the upstream read
/// fails after headers were already committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEnvelope {
    /// Resolved conversation id, sent before the terminal frame
    Meta {
        /// Conversation the exchange is persisted under
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    /// Incremental content fragment
    Text {
        /// Delta text exactly as produced upstream
        content: String,
    },
    /// Normal completion marker
    Done,
    /// Visible failure marker for mid-stream errors
    Error {
        /// Caller-safe description of the failure
        message: String,
    },
}

impl StreamEnvelope {
    /// Serialize for an SSE `data:` line. Envelope serialization has no
    /// failing inputs; the fallback frame exists so a handler never has
    /// to propagate an error from here.
    #[must_use]
    pub fn to_frame_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"internal serialization error"}"#.to_owned()
        })
    }
}

// ============================================================================
// Scout facts for the coach system prompt
// ============================================================================

/// Aggregated profile and pipeline facts interpolated into the coach
/// system instruction. Computed server-side from the data store; a
/// caller-supplied variant is deliberately not accepted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoutFacts {
    /// Display name; empty means the profile has no name yet
    pub display_name: String,
    /// Days since the scout joined
    pub tenure_days: i64,
    /// Athletes the scout has referred
    pub referred_athletes: i64,
    /// Referred athletes who reached a placement
    pub placed_athletes: i64,
    /// Referred athletes with a signed agreement
    pub signed_athletes: i64,
    /// Commission total in euros
    pub total_commission_eur: f64,
    /// Commission already paid out in euros
    pub paid_commission_eur: f64,
    /// Whether the public profile has all recommended fields filled
    pub profile_complete: bool,
    /// Whether the scout passed identity verification
    pub verified: bool,
}

// ============================================================================
// Feedback triage
// ============================================================================

/// Classification labels for feedback triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackType {
    Bug,
    Feature,
    Question,
    Other,
    Unclear,
}

impl FeedbackType {
    /// Parse a model-produced label; anything unrecognized becomes `Other`
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Bug" => Self::Bug,
            "Feature" => Self::Feature,
            "Question" => Self::Question,
            "Unclear" => Self::Unclear,
            _ => Self::Other,
        }
    }
}

/// Result of the feedback triage endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    /// One-line summary of the feedback
    pub summary: String,
    /// Triage classification
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    /// Follow-up question when the feedback is unclear
    #[serde(rename = "clarifyingQuestion", skip_serializing_if = "Option::is_none")]
    pub clarifying_question: Option<String>,
}

impl FeedbackAnalysis {
    /// Deterministic fallback when the upstream AI is unavailable or its
    /// output is unusable: echo the input truncated to the summary cap,
    /// classified `Other`.
    #[must_use]
    pub fn degraded(message: &str) -> Self {
        Self {
            summary: truncate_with_ellipsis(message, FEEDBACK_SUMMARY_MAX_CHARS),
            feedback_type: FeedbackType::Other,
            clarifying_question: None,
        }
    }
}

// ============================================================================
// CV extraction
// ============================================================================

/// Whitelisted profile fields extracted from an uploaded CV.
///
/// This is a sanitization boundary: whatever JSON the model produces,
/// only these six fields survive, each trimmed and truncated to
/// [`CV_FIELD_MAX_CHARS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_url: Option<String>,
}

impl ExtractedProfile {
    /// Build from an untrusted model-produced JSON object. Unknown keys
    /// are discarded, non-string and empty values are dropped, and every
    /// kept value is trimmed and truncated.
    #[must_use]
    pub fn from_untrusted(value: &serde_json::Value) -> Self {
        Self {
            bio: sanitized_field(value, "bio"),
            education: sanitized_field(value, "education"),
            achievements: sanitized_field(value, "achievements"),
            sport: sanitized_field(value, "sport"),
            linkedin_url: sanitized_field(value, "linkedin_url"),
            instagram_url: sanitized_field(value, "instagram_url"),
        }
    }

    /// True when no field survived sanitization
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bio.is_none()
            && self.education.is_none()
            && self.achievements.is_none()
            && self.sport.is_none()
            && self.linkedin_url.is_none()
            && self.instagram_url.is_none()
    }
}

fn sanitized_field(value: &serde_json::Value, key: &str) -> Option<String> {
    let raw = value.get(key)?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(truncate_chars(raw, CV_FIELD_MAX_CHARS))
}

// ============================================================================
// Text helpers
// ============================================================================

/// Truncate to at most `max` characters on a character boundary
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_owned(),
        None => s.to_owned(),
    }
}

/// Truncate to at most `max` characters, appending an ellipsis when
/// anything was cut
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_owned(),
    }
}
