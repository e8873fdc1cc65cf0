// ABOUTME: Context assembler for the Scout Coach chat relay
// ABOUTME: Validates inbound messages and builds the role-ordered upstream request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! # Coach Context Assembly
//!
//! Turns a validated chat message into the full ordered turn list sent
//! upstream: system instruction (persona + per-scout facts + knowledge
//! corpus), a fixed acknowledgement turn, the bounded conversation history,
//! and the new user message last.
//!
//! Validation happens here, before persistence or any upstream call, so a
//! rejected message has zero side effects.

pub mod prompts;
pub mod starters;

pub use prompts::{feedback_prompt, render_system_prompt, ACKNOWLEDGEMENT, CV_EXTRACTION_PROMPT};
pub use starters::{starters_for, Starter};

use crate::database::conversations::{MessageRecord, ROLE_USER};
use crate::errors::{AppError, AppResult};
use crate::llm::ChatMessage;
use crate::models::ScoutFacts;

/// Most recent persisted turns included in the upstream context
pub const MAX_HISTORY_TURNS: usize = 20;

/// Upper bound on a single chat message, in characters
pub const CHAT_MESSAGE_MAX_CHARS: usize = 2000;

/// Upper bound on a feedback submission, in characters
pub const FEEDBACK_MESSAGE_MAX_CHARS: usize = 5000;

/// Validate an inbound message against a character ceiling.
///
/// Returns the trimmed text; empty-after-trim and over-limit inputs are
/// rejected as `InvalidInput` before anything is persisted or sent upstream.
pub fn validate_message(message: &str, max_chars: usize) -> AppResult<&str> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("Message must not be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(AppError::invalid_input(format!(
            "Message exceeds the {max_chars} character limit"
        )));
    }
    Ok(trimmed)
}

/// Assemble the ordered turn list for a coach chat request.
///
/// Order is fixed: system instruction, acknowledgement, history (oldest
/// first, roles mapped), then the new user message. History records with a
/// role other than `user` are mapped to the assistant side.
#[must_use]
pub fn assemble_chat_messages(
    facts: &ScoutFacts,
    history: &[MessageRecord],
    new_message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::system(render_system_prompt(facts)));
    messages.push(ChatMessage::assistant(ACKNOWLEDGEMENT));

    for record in history {
        if record.role == ROLE_USER {
            messages.push(ChatMessage::user(&record.content));
        } else {
            messages.push(ChatMessage::assistant(&record.content));
        }
    }

    messages.push(ChatMessage::user(new_message));
    messages
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::errors::ErrorCode;
    use crate::llm::MessageRole;

    fn record(role: &str, content: &str) -> MessageRecord {
        MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: "conv-1".to_owned(),
            scout_id: "scout-1".to_owned(),
            role: role.to_owned(),
            content: content.to_owned(),
            tokens_used: None,
            latency_ms: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_validate_accepts_at_limit() {
        let message = "a".repeat(CHAT_MESSAGE_MAX_CHARS);
        assert!(validate_message(&message, CHAT_MESSAGE_MAX_CHARS).is_ok());
    }

    #[test]
    fn test_validate_rejects_over_limit() {
        let message = "a".repeat(CHAT_MESSAGE_MAX_CHARS + 1);
        let err = validate_message(&message, CHAT_MESSAGE_MAX_CHARS).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_validate_rejects_empty_and_whitespace() {
        assert!(validate_message("", CHAT_MESSAGE_MAX_CHARS).is_err());
        assert!(validate_message("   \n\t ", CHAT_MESSAGE_MAX_CHARS).is_err());
    }

    #[test]
    fn test_validate_counts_chars_not_bytes() {
        // Multibyte characters count once each.
        let message = "ü".repeat(CHAT_MESSAGE_MAX_CHARS);
        assert!(validate_message(&message, CHAT_MESSAGE_MAX_CHARS).is_ok());
    }

    #[test]
    fn test_validate_returns_trimmed_text() {
        let trimmed = validate_message("  hello coach  ", CHAT_MESSAGE_MAX_CHARS).unwrap();
        assert_eq!(trimmed, "hello coach");
    }

    #[test]
    fn test_assembly_order_and_roles() {
        let history = vec![
            record("user", "How do showcases work?"),
            record("assistant", "Showcases are evaluation events."),
        ];
        let messages =
            assemble_chat_messages(&ScoutFacts::default(), &history, "And what do they cost?");

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, ACKNOWLEDGEMENT);
        assert_eq!(messages[2].role, MessageRole::User);
        assert_eq!(messages[2].content, "How do showcases work?");
        assert_eq!(messages[3].role, MessageRole::Assistant);
        assert_eq!(messages[4].role, MessageRole::User);
        assert_eq!(messages[4].content, "And what do they cost?");
    }

    #[test]
    fn test_assembly_maps_unknown_roles_to_assistant() {
        let history = vec![record("system", "legacy row")];
        let messages = assemble_chat_messages(&ScoutFacts::default(), &history, "hi");

        assert_eq!(messages[2].role, MessageRole::Assistant);
    }

    #[test]
    fn test_assembly_interpolates_facts_into_system_turn() {
        let facts = ScoutFacts {
            display_name: "Jonas".to_owned(),
            referred_athletes: 4,
            ..ScoutFacts::default()
        };
        let messages = assemble_chat_messages(&facts, &[], "hello");

        assert!(messages[0].content.contains("- Name: Jonas"));
        assert!(messages[0].content.contains("- Total leads referred: 4"));
    }
}
