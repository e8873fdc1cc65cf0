// ABOUTME: Database operations for coach conversations and messages
// ABOUTME: Owns the active-conversation lifecycle and the bounded history reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

use crate::errors::{AppError, AppResult};
use crate::llm::MessageRole;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Stored role string for user turns
pub const ROLE_USER: &str = "user";
/// Stored role string for assistant turns
pub const ROLE_ASSISTANT: &str = "assistant";

// ============================================================================
// Database Record Types
// ============================================================================

/// Database representation of a coach conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: String,
    /// Scout who owns the conversation
    pub scout_id: String,
    /// Optional user-visible title
    pub title: Option<String>,
    /// Whether this is the scout's current conversation
    pub is_active: bool,
    /// Total tokens accumulated across assistant turns
    pub total_tokens: i64,
    /// When the conversation was created (RFC 3339)
    pub created_at: String,
    /// When the conversation last changed (RFC 3339)
    pub updated_at: String,
}

/// Database representation of a single chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Scout who owns the conversation
    pub scout_id: String,
    /// Role of the sender (user, assistant)
    pub role: String,
    /// Message text
    pub content: String,
    /// Upstream token count for assistant turns, when reported
    pub tokens_used: Option<i64>,
    /// Wall-clock upstream latency for assistant turns
    pub latency_ms: Option<i64>,
    /// When the message was created (RFC 3339)
    pub created_at: String,
}

// ============================================================================
// Conversation Store
// ============================================================================

/// Conversation and message persistence
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    /// Create a new conversation store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the conversation tables
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub(crate) async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS coach_conversations (
                id TEXT PRIMARY KEY,
                scout_id TEXT NOT NULL,
                title TEXT,
                is_active BOOLEAN NOT NULL DEFAULT true,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversations table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS coach_messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES coach_conversations(id) ON DELETE CASCADE,
                scout_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tokens_used INTEGER,
                latency_ms INTEGER,
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_coach_conversations_scout_active
             ON coach_conversations(scout_id, is_active)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_coach_messages_conversation
             ON coach_messages(conversation_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create message index: {e}")))?;

        Ok(())
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a new active conversation for a scout
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn create_conversation(&self, scout_id: &str) -> AppResult<ConversationRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO coach_conversations (id, scout_id, title, is_active, total_tokens, created_at, updated_at)
            VALUES ($1, $2, NULL, true, 0, $3, $3)
            ",
        )
        .bind(&id)
        .bind(scout_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(ConversationRecord {
            id,
            scout_id: scout_id.to_owned(),
            title: None,
            is_active: true,
            total_tokens: 0,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get the scout's active conversation, newest first when several exist
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn active_conversation(
        &self,
        scout_id: &str,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, scout_id, title, is_active, total_tokens, created_at, updated_at
            FROM coach_conversations
            WHERE scout_id = $1 AND is_active = true
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(scout_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get active conversation: {e}")))?;

        Ok(row.map(|r| Self::conversation_from_row(&r)))
    }

    /// Resolve the conversation a chat request should append to.
    ///
    /// An explicit ID from the request wins; otherwise the active
    /// conversation is reused and a fresh one is created when none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn ensure_active_conversation(
        &self,
        scout_id: &str,
        explicit_id: Option<&str>,
    ) -> AppResult<String> {
        if let Some(id) = explicit_id {
            return Ok(id.to_owned());
        }

        if let Some(active) = self.active_conversation(scout_id).await? {
            return Ok(active.id);
        }

        let created = self.create_conversation(scout_id).await?;
        Ok(created.id)
    }

    /// Deactivate the scout's conversations and open a fresh one.
    ///
    /// Both writes run inside one transaction so a failure cannot leave the
    /// scout without any active conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn start_new_conversation(&self, scout_id: &str) -> AppResult<ConversationRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            UPDATE coach_conversations
            SET is_active = false, updated_at = $1
            WHERE scout_id = $2 AND is_active = true
            ",
        )
        .bind(&now)
        .bind(scout_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to deactivate conversations: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO coach_conversations (id, scout_id, title, is_active, total_tokens, created_at, updated_at)
            VALUES ($1, $2, NULL, true, 0, $3, $3)
            ",
        )
        .bind(&id)
        .bind(scout_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit conversation reset: {e}")))?;

        Ok(ConversationRecord {
            id,
            scout_id: scout_id.to_owned(),
            title: None,
            is_active: true,
            total_tokens: 0,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Persist a user turn before the upstream call
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn append_user_turn(
        &self,
        conversation_id: &str,
        scout_id: &str,
        content: &str,
    ) -> AppResult<MessageRecord> {
        self.add_message(conversation_id, scout_id, MessageRole::User, content, None, None)
            .await
    }

    /// Persist an assistant turn with its usage metadata
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn append_assistant_turn(
        &self,
        conversation_id: &str,
        scout_id: &str,
        content: &str,
        tokens_used: Option<u32>,
        latency_ms: u64,
    ) -> AppResult<MessageRecord> {
        self.add_message(
            conversation_id,
            scout_id,
            MessageRole::Assistant,
            content,
            tokens_used,
            Some(i64::try_from(latency_ms).unwrap_or(i64::MAX)),
        )
        .await
    }

    async fn add_message(
        &self,
        conversation_id: &str,
        scout_id: &str,
        role: MessageRole,
        content: &str,
        tokens_used: Option<u32>,
        latency_ms: Option<i64>,
    ) -> AppResult<MessageRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let role_str = role.as_str();

        sqlx::query(
            r"
            INSERT INTO coach_messages (id, conversation_id, scout_id, role, content, tokens_used, latency_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(scout_id)
        .bind(role_str)
        .bind(content)
        .bind(tokens_used.map(i64::from))
        .bind(latency_ms)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add message: {e}")))?;

        // Keep the conversation's recency and token totals current.
        if let Some(tokens) = tokens_used {
            sqlx::query(
                r"
                UPDATE coach_conversations
                SET updated_at = $1, total_tokens = total_tokens + $2
                WHERE id = $3
                ",
            )
            .bind(&now)
            .bind(i64::from(tokens))
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to update conversation tokens: {e}"))
            })?;
        } else {
            sqlx::query(
                r"
                UPDATE coach_conversations
                SET updated_at = $1
                WHERE id = $2
                ",
            )
            .bind(&now)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to update conversation timestamp: {e}"))
            })?;
        }

        Ok(MessageRecord {
            id,
            conversation_id: conversation_id.to_owned(),
            scout_id: scout_id.to_owned(),
            role: role_str.to_owned(),
            content: content.to_owned(),
            tokens_used: tokens_used.map(i64::from),
            latency_ms,
            created_at: now,
        })
    }

    /// Get the last N messages of a conversation in chronological order.
    ///
    /// Queries newest-first and reverses, so the window always holds the
    /// most recent turns. Scout-scoped, so a foreign conversation ID yields
    /// an empty history rather than another scout's turns.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        scout_id: &str,
        limit: i64,
    ) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, scout_id, role, content, tokens_used, latency_ms, created_at
            FROM coach_messages
            WHERE conversation_id = $1 AND scout_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            ",
        )
        .bind(conversation_id)
        .bind(scout_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get recent messages: {e}")))?;

        let mut messages: Vec<MessageRecord> =
            rows.iter().map(Self::message_from_row).collect();
        messages.reverse();

        Ok(messages)
    }

    /// Get every message of a conversation in chronological order
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        scout_id: &str,
    ) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, scout_id, role, content, tokens_used, latency_ms, created_at
            FROM coach_messages
            WHERE conversation_id = $1 AND scout_id = $2
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(conversation_id)
        .bind(scout_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages: {e}")))?;

        Ok(rows.iter().map(Self::message_from_row).collect())
    }

    fn conversation_from_row(row: &sqlx::sqlite::SqliteRow) -> ConversationRecord {
        ConversationRecord {
            id: row.get("id"),
            scout_id: row.get("scout_id"),
            title: row.get("title"),
            is_active: row.get("is_active"),
            total_tokens: row.get("total_tokens"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> MessageRecord {
        MessageRecord {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            scout_id: row.get("scout_id"),
            role: row.get("role"),
            content: row.get("content"),
            tokens_used: row.get("tokens_used"),
            latency_ms: row.get("latency_ms"),
            created_at: row.get("created_at"),
        }
    }
}
