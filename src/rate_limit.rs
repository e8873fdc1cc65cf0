// ABOUTME: Fixed-window rate limiting keyed by caller identity
// ABOUTME: In-memory DashMap counters gatekeep every relay entry point
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Fixed-window rate limiting for the relay endpoints.
//!
//! Each endpoint owns an injected [`FixedWindowLimiter`] keyed by caller
//! identity (scout id for authenticated endpoints, client IP for anonymous
//! ones). Counters live in process memory; multi-instance coordination is
//! out of scope. The window admits exactly `limit` requests: the decision
//! reads the counter *before* incrementing, so the `(limit + 1)`-th request
//! in a window is the first rejected one.

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Window length shared by every relay endpoint
pub const WINDOW_SECONDS: u64 = 60;
/// Coach chat ceiling per scout per window
pub const CHAT_LIMIT: u32 = 10;
/// CV extraction ceiling per client IP per window
pub const CV_LIMIT: u32 = 3;
/// Feedback analysis ceiling per client IP per window
pub const FEEDBACK_LIMIT: u32 = 10;
/// Lead intake webhook ceiling per client IP per window
pub const WEBHOOK_LIMIT: u32 = 30;

/// Trigger lazy cleanup of expired windows past this key count
const CLEANUP_THRESHOLD: usize = 1000;

/// Outcome of a rate-limit check
#[derive(Debug, Clone)]
pub struct RateDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured ceiling for this endpoint
    pub limit: u32,
    /// Requests left in the current window (0 when rejected)
    pub remaining: u32,
    /// Wall-clock time when the current window expires
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Convert a rejection into the caller-facing error
    #[must_use]
    pub fn into_error(self) -> AppError {
        AppError::rate_limit_exceeded(self.limit, self.reset_at)
    }
}

/// In-memory fixed-window counter keyed by caller identity.
///
/// Cloning shares the underlying counter table, so one limiter can be
/// handed to several route handlers.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    state: Arc<DashMap<String, (u32, Instant)>>,
}

impl FixedWindowLimiter {
    /// Create a limiter admitting `limit` requests per `window`
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Arc::new(DashMap::new()),
        }
    }

    /// Create a limiter with the standard sixty-second window
    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(WINDOW_SECONDS))
    }

    /// Check and record an attempt for `key` at the current instant
    #[must_use]
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Check and record an attempt for `key` at an explicit instant.
    ///
    /// The counter resets once a full window has elapsed since the window
    /// opened. The attempt is admitted when the pre-increment count is
    /// below the ceiling; only admitted attempts increment the counter, so
    /// rejected requests never extend or inflate the window.
    #[must_use]
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut entry = self.state.entry(key.to_owned()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) >= self.window {
            *count = 0;
            *window_start = now;
        }

        let is_limited = *count >= self.limit;
        if !is_limited {
            *count += 1;
        }

        let current = *count;
        let window_elapsed = now.duration_since(*window_start);
        drop(entry);

        if self.state.len() > CLEANUP_THRESHOLD {
            self.cleanup_expired(now);
        }

        if is_limited {
            debug!(key = %key, limit = self.limit, "rate limit exceeded");
        }

        let reset_in = self.window.saturating_sub(window_elapsed);
        let reset_at = Utc::now()
            + chrono::Duration::from_std(reset_in)
                .unwrap_or_else(|_| chrono::Duration::seconds(WINDOW_SECONDS as i64));

        RateDecision {
            allowed: !is_limited,
            limit: self.limit,
            remaining: self.limit.saturating_sub(current),
            reset_at,
        }
    }

    /// Check an attempt, converting a rejection into the standard error
    ///
    /// # Errors
    ///
    /// Returns [`AppError::rate_limit_exceeded`] when the window is full.
    pub fn require(&self, key: &str) -> Result<RateDecision, AppError> {
        let decision = self.check(key);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(decision.into_error())
        }
    }

    /// Number of caller keys currently tracked
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.state.len()
    }

    /// Drop entries whose window has fully expired. Removal only affects
    /// memory: an expired entry would reset to a fresh window on its next
    /// touch anyway, so admission decisions are unchanged. Entries touched
    /// concurrently with the sweep may survive one extra pass.
    fn cleanup_expired(&self, now: Instant) {
        let window = self.window;
        let before = self.state.len();
        self.state
            .retain(|_, (_, window_start)| now.duration_since(*window_start) < window);
        debug!(
            removed = before.saturating_sub(self.state.len()),
            "cleaned up expired rate limit windows"
        );
    }
}

impl std::fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("tracked_keys", &self.state.len())
            .finish()
    }
}

/// The relay's full set of per-endpoint limiters.
///
/// Built once at startup and shared through the server resources so
/// handlers never reach for global state.
#[derive(Debug, Clone)]
pub struct RelayLimits {
    /// Coach chat, keyed by scout id
    pub chat: FixedWindowLimiter,
    /// CV extraction, keyed by client IP
    pub cv: FixedWindowLimiter,
    /// Feedback analysis, keyed by client IP
    pub feedback: FixedWindowLimiter,
    /// Lead intake webhook, keyed by client IP
    pub webhook: FixedWindowLimiter,
}

impl RelayLimits {
    /// Create the standard per-endpoint ceilings
    #[must_use]
    pub fn new() -> Self {
        Self {
            chat: FixedWindowLimiter::per_minute(CHAT_LIMIT),
            cv: FixedWindowLimiter::per_minute(CV_LIMIT),
            feedback: FixedWindowLimiter::per_minute(FEEDBACK_LIMIT),
            webhook: FixedWindowLimiter::per_minute(WEBHOOK_LIMIT),
        }
    }
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self::new()
    }
}
