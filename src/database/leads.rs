// ABOUTME: Persistence for website leads received through the form webhook
// ABOUTME: Maps known form IDs to source labels and stores the raw submission
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Known form IDs and the source labels they map to
const FORM_SOURCES: [(&str, &str); 4] = [
    ("1260", "sportstipendium"),
    ("5187", "showcase"),
    ("3959", "advertising"),
    ("6861", "sportstipendium_en"),
];

/// Label a lead with the campaign its form belongs to.
///
/// Unknown form IDs are preserved as `form_<id>` so no submission is ever
/// dropped for missing the mapping.
#[must_use]
pub fn form_source_label(form_id: &str) -> String {
    FORM_SOURCES
        .iter()
        .find(|(id, _)| *id == form_id)
        .map_or_else(|| format!("form_{form_id}"), |(_, label)| (*label).to_owned())
}

/// A lead ready for insertion, extracted from a webhook submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    /// Campaign label derived from the form ID
    pub form_source: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub sport: Option<String>,
    /// Referring scout's tracking code, when the form carried one
    pub scout_ref: Option<String>,
    /// Full field map as submitted, for later re-processing
    pub raw_fields: serde_json::Value,
}

/// Website lead persistence
pub struct LeadStore {
    pool: SqlitePool,
}

impl LeadStore {
    /// Create a new lead store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the leads table
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub(crate) async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS website_leads (
                id TEXT PRIMARY KEY,
                form_source TEXT NOT NULL,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT,
                phone TEXT,
                sport TEXT,
                scout_ref TEXT,
                raw_fields TEXT NOT NULL DEFAULT '{}',
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create leads table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_website_leads_source ON website_leads(form_source)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create lead index: {e}")))?;

        Ok(())
    }

    /// Insert a lead and return its generated ID
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn insert_lead(&self, lead: &NewLead) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let raw_fields = serde_json::to_string(&lead.raw_fields)
            .map_err(|e| AppError::internal(format!("Failed to serialize lead fields: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO website_leads (id, form_source, first_name, last_name, email, phone, sport, scout_ref, raw_fields, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&id)
        .bind(&lead.form_source)
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(lead.email.as_deref())
        .bind(lead.phone.as_deref())
        .bind(lead.sport.as_deref())
        .bind(lead.scout_ref.as_deref())
        .bind(&raw_fields)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save lead: {e}")))?;

        Ok(id)
    }
}
