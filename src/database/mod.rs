// ABOUTME: SQLite-backed persistence for the relay
// ABOUTME: Connection management, inline migrations, and the per-domain store handles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! # Database Management
//!
//! One shared connection pool with thin per-domain store handles:
//! [`conversations::ConversationStore`] for the chat transcript,
//! [`scouts::ScoutStore`] for the read models behind the dynamic facts,
//! and [`leads::LeadStore`] for webhook submissions. Migrations are inline
//! `CREATE TABLE IF NOT EXISTS` statements run at startup.

pub mod conversations;
pub mod leads;
pub mod scouts;

pub use conversations::{ConversationRecord, ConversationStore, MessageRecord};
pub use leads::{form_source_label, LeadStore, NewLead};
pub use scouts::ScoutStore;

use crate::errors::{AppError, AppResult};
use sqlx::SqlitePool;

/// Shared database handle
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and run migrations.
    ///
    /// File-backed SQLite URLs get `?mode=rwc` appended so the database
    /// file is created on first boot.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let connection_options =
            if database_url.starts_with("sqlite:") && !database_url.contains(":memory:") {
                format!("{database_url}?mode=rwc")
            } else {
                database_url.to_owned()
            };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run all migrations
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.conversations().migrate().await?;
        self.scouts().migrate().await?;
        self.leads().migrate().await?;
        Ok(())
    }

    /// Conversation and message operations
    #[must_use]
    pub fn conversations(&self) -> ConversationStore {
        ConversationStore::new(self.pool.clone())
    }

    /// Scout read-model operations
    #[must_use]
    pub fn scouts(&self) -> ScoutStore {
        ScoutStore::new(self.pool.clone())
    }

    /// Website lead operations
    #[must_use]
    pub fn leads(&self) -> LeadStore {
        LeadStore::new(self.pool.clone())
    }
}
