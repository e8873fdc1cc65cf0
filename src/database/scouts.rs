// ABOUTME: Read models for scout profiles, referred athletes, and commissions
// ABOUTME: Computes the dynamic facts block interpolated into the coach system prompt
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

use crate::errors::{AppError, AppResult};
use crate::models::ScoutFacts;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// Pipeline status marking a completed placement
const PLACED_STATUS: &str = "Placed";

/// Pipeline statuses counting as a signed athlete
const SIGNED_STATUSES: [&str; 3] = ["Signed", "In Process", "Placed"];

/// Commission status marking a paid-out amount
const PAID_COMMISSION_STATUS: &str = "paid";

struct ProfileRow {
    full_name: Option<String>,
    photo_url: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    is_verified: bool,
    created_at: String,
}

/// Read-only access to the portal's scout, athlete, and commission tables.
///
/// The portal application writes these tables; the relay only reads them to
/// interpolate per-scout facts, so every query here is a SELECT.
pub struct ScoutStore {
    pool: SqlitePool,
}

impl ScoutStore {
    /// Create a new scout store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the read-model tables when they do not exist yet.
    ///
    /// Deployments sharing a database with the portal already have them;
    /// standalone and test deployments get empty ones.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub(crate) async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS scouts (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                full_name TEXT,
                photo_url TEXT,
                bio TEXT,
                location TEXT,
                is_verified BOOLEAN NOT NULL DEFAULT false,
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create scouts table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS athletes (
                id TEXT PRIMARY KEY,
                referred_by_scout_id TEXT,
                process_status TEXT NOT NULL DEFAULT 'Lead Created',
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create athletes table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS scout_commissions (
                id TEXT PRIMARY KEY,
                scout_id TEXT NOT NULL,
                amount REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create commissions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_athletes_referrer ON athletes(referred_by_scout_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create athlete index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scout_commissions_scout ON scout_commissions(scout_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create commission index: {e}")))?;

        Ok(())
    }

    /// Compute the dynamic facts for a scout's system prompt.
    ///
    /// The profile, athlete, and commission reads are independent and fan
    /// out concurrently. An unknown scout id yields neutral facts rather
    /// than an error; the chat still works, just without personalization.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub async fn scout_facts(&self, scout_id: &str) -> AppResult<ScoutFacts> {
        let (profile, statuses, commissions) = tokio::try_join!(
            self.profile(scout_id),
            self.athlete_statuses(scout_id),
            self.commissions(scout_id)
        )?;

        let referred_athletes = i64::try_from(statuses.len()).unwrap_or(i64::MAX);
        let placed_athletes = statuses
            .iter()
            .filter(|s| s.as_str() == PLACED_STATUS)
            .count();
        let signed_athletes = statuses
            .iter()
            .filter(|s| SIGNED_STATUSES.contains(&s.as_str()))
            .count();

        let total_commission_eur: f64 = commissions.iter().map(|(amount, _)| amount).sum();
        let paid_commission_eur: f64 = commissions
            .iter()
            .filter(|(_, status)| status == PAID_COMMISSION_STATUS)
            .map(|(amount, _)| amount)
            .sum();

        let mut facts = ScoutFacts {
            referred_athletes,
            placed_athletes: i64::try_from(placed_athletes).unwrap_or(i64::MAX),
            signed_athletes: i64::try_from(signed_athletes).unwrap_or(i64::MAX),
            total_commission_eur,
            paid_commission_eur,
            ..ScoutFacts::default()
        };

        if let Some(row) = profile {
            facts.display_name = row.full_name.clone().unwrap_or_default();
            facts.tenure_days = tenure_days(&row.created_at);
            facts.profile_complete = present(&row.full_name)
                && present(&row.photo_url)
                && present(&row.bio)
                && present(&row.location);
            facts.verified = row.is_verified;
        }

        Ok(facts)
    }

    async fn profile(&self, scout_id: &str) -> AppResult<Option<ProfileRow>> {
        let row = sqlx::query(
            r"
            SELECT full_name, photo_url, bio, location, is_verified, created_at
            FROM scouts
            WHERE id = $1
            ",
        )
        .bind(scout_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get scout profile: {e}")))?;

        Ok(row.map(|r| ProfileRow {
            full_name: r.get("full_name"),
            photo_url: r.get("photo_url"),
            bio: r.get("bio"),
            location: r.get("location"),
            is_verified: r.get("is_verified"),
            created_at: r.get("created_at"),
        }))
    }

    async fn athlete_statuses(&self, scout_id: &str) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            r"
            SELECT process_status
            FROM athletes
            WHERE referred_by_scout_id = $1
            ",
        )
        .bind(scout_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get referred athletes: {e}")))?;

        Ok(rows.iter().map(|r| r.get("process_status")).collect())
    }

    async fn commissions(&self, scout_id: &str) -> AppResult<Vec<(f64, String)>> {
        let rows = sqlx::query(
            r"
            SELECT amount, status
            FROM scout_commissions
            WHERE scout_id = $1
            ",
        )
        .bind(scout_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get commissions: {e}")))?;

        Ok(rows
            .iter()
            .map(|r| (r.get("amount"), r.get("status")))
            .collect())
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn tenure_days(created_at: &str) -> i64 {
    DateTime::parse_from_rfc3339(created_at)
        .map(|dt| (Utc::now() - dt.with_timezone(&Utc)).num_days().max(0))
        .unwrap_or(0)
}
