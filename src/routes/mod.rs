// ABOUTME: HTTP route handlers composing the relay's public surface
// ABOUTME: One module per endpoint family, each exposing a router over shared resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! HTTP routes for the relay.
//!
//! Each endpoint family gets its own module with a `Routes` struct whose
//! `routes(Arc<ServerResources>)` returns a ready-to-merge [`axum::Router`].
//! Handlers authenticate and rate-limit themselves; there is no shared auth
//! middleware layer because the endpoints use different identity modes
//! (verified scout token vs. anonymous client IP vs. webhook secret).

/// Coach chat: streaming relay plus conversation management
pub mod coach;
/// One-shot CV profile extraction
pub mod cv;
/// One-shot feedback triage
pub mod feedback;
/// Liveness and readiness probes
pub mod health;
/// Shared-secret lead intake from the public website forms
pub mod webhook;

pub use coach::CoachRoutes;
pub use cv::CvRoutes;
pub use feedback::FeedbackRoutes;
pub use health::HealthRoutes;
pub use webhook::WebhookRoutes;
