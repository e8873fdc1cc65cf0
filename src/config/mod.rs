// ABOUTME: Configuration management module for centralized server settings and parameters
// ABOUTME: Re-exports the environment-driven configuration consumed at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Configuration module for the scout relay server
//!
//! All runtime configuration comes from environment variables; there is no
//! config file. See [`environment::ServerConfig::from_env`] for the full
//! variable list and defaults.

/// Environment and server configuration
pub mod environment;

pub use environment::{AuthConfig, CorsConfig, GeminiConfig, ServerConfig, WebhookConfig};
