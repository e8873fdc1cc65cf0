// ABOUTME: Main library entry point for the scout portal AI relay
// ABOUTME: Streams coach chat over SSE and proxies feedback triage, CV extraction, and lead intake
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

#![deny(unsafe_code)]

//! # Scout Relay
//!
//! The AI-proxy relay behind the scout portal. Scouts sign up athletes, track
//! them through a placement pipeline, and earn commissions; this service gives
//! them an AI coach over streaming SSE plus a handful of one-shot AI helpers.
//!
//! ## Endpoints
//!
//! - **Coach chat**: authenticated, rate-limited streaming chat with
//!   server-assembled conversational context (knowledge corpus + live
//!   pipeline stats + bounded history)
//! - **Feedback analysis**: anonymous one-shot triage of portal feedback
//!   into Bug/Feature/Question classes, degrading gracefully when the AI
//!   provider is unavailable
//! - **CV extraction**: anonymous one-shot extraction of profile fields from
//!   an uploaded PDF, with a strict field whitelist
//! - **Lead intake webhook**: shared-secret form ingestion from the public
//!   website
//!
//! ## Architecture
//!
//! Request flow: rate limiter → identity resolver → context assembler
//! (conversation store) → upstream relay (Gemini, line-buffered SSE
//! reframing) → incremental re-emission downstream → persistence of the
//! completed exchange.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scout_relay::config::environment::ServerConfig;
//! use scout_relay::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Scout relay configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Bearer-token verification and client network identity extraction
pub mod auth;

/// Coach context assembly: knowledge corpus, dynamic facts, starters
pub mod coach;

/// Configuration management from environment variables
pub mod config;

/// SQLite-backed stores for conversations, scouts, and website leads
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// LLM provider abstraction and the Gemini streaming client
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// Domain row types and the outbound SSE envelope
pub mod models;

/// Fixed-window rate limiting keyed by caller identity
pub mod rate_limit;

/// HTTP routes for the relay surface
pub mod routes;

/// Shared server resources, router composition, and the serve loop
pub mod server;
