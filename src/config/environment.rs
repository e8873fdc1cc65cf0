// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, defaults, and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Environment-based configuration management for production deployment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default HTTP port when `HTTP_PORT` is unset
pub const DEFAULT_HTTP_PORT: u16 = 8081;
/// Default database location when `DATABASE_URL` is unset
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/scout-relay.db";
/// Default Gemini API base when `GEMINI_BASE_URL` is unset
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite { path: PathBuf },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from a `sqlite:` URL or bare file path
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path_str = s.strip_prefix("sqlite:").unwrap_or(s);
        if path_str == ":memory:" {
            Self::Memory
        } else {
            Self::SQLite {
                path: PathBuf::from(path_str),
            }
        }
    }

    /// Convert to a sqlx connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/scout-relay.db"),
        }
    }
}

impl std::fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Top-level server configuration assembled from environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Database location
    pub database_url: DatabaseUrl,
    /// Gemini upstream configuration
    pub gemini: GeminiConfig,
    /// Scout authentication configuration
    pub auth: AuthConfig,
    /// Form webhook configuration
    pub webhook: WebhookConfig,
    /// CORS settings
    pub cors: CorsConfig,
}

/// Gemini upstream provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. Absent means AI endpoints run in degraded mode.
    pub api_key: Option<String>,
    /// API base URL, overridable for tests
    pub base_url: String,
}

/// Scout authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for scout session tokens. Absent means every
    /// authenticated endpoint rejects with 500.
    pub jwt_secret: Option<String>,
}

/// Form webhook settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret the form provider sends in `X-Webhook-Secret`
    pub shared_secret: Option<String>,
}

/// CORS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` means any
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse (e.g. a
    /// non-numeric `HTTP_PORT`). Unset variables fall back to defaults
    /// or to `None` for secrets.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Self {
            http_port: env_var_or("HTTP_PORT", &DEFAULT_HTTP_PORT.to_string())?
                .parse()
                .context("Invalid HTTP_PORT value")?,
            log_level: LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info")?),
            database_url: DatabaseUrl::parse_url(&env_var_or(
                "DATABASE_URL",
                DEFAULT_DATABASE_URL,
            )?),
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
                base_url: env_var_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL)?,
            },
            auth: AuthConfig {
                jwt_secret: env::var("AUTH_JWT_SECRET").ok().filter(|s| !s.is_empty()),
            },
            webhook: WebhookConfig {
                shared_secret: env::var("WEBHOOK_SHARED_SECRET")
                    .ok()
                    .filter(|s| !s.is_empty()),
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")?),
            },
        };

        config.validate();
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Warn about missing secrets. None of these block startup; the
    /// affected endpoints report their own failures per request.
    fn validate(&self) {
        if self.gemini.api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; AI endpoints will run degraded");
        }
        if self.auth.jwt_secret.is_none() {
            warn!("AUTH_JWT_SECRET is not set; coach endpoints will reject all requests");
        }
        if self.webhook.shared_secret.is_none() {
            warn!("WEBHOOK_SHARED_SECRET is not set; the lead intake webhook is disabled");
        }
    }
}

/// Read an environment variable with a default fallback
fn env_var_or(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_owned()))
}

/// Parse a comma-separated origin list; `*` means any origin
fn parse_origins(origins: &str) -> Vec<String> {
    if origins.trim() == "*" {
        return vec!["*".to_owned()];
    }
    origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str_or_default("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::from_str_or_default("bogus"), LogLevel::Info);
    }

    #[test]
    fn test_database_url_parsing() {
        assert!(DatabaseUrl::parse_url("sqlite::memory:").is_memory());

        let file = DatabaseUrl::parse_url("sqlite:./data/relay.db");
        assert_eq!(file.to_connection_string(), "sqlite:./data/relay.db");

        // Bare paths are treated as SQLite files
        let bare = DatabaseUrl::parse_url("./relay.db");
        assert_eq!(bare.to_connection_string(), "sqlite:./relay.db");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("https://a.example, https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_origins(" , ").is_empty());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        for key in [
            "HTTP_PORT",
            "DATABASE_URL",
            "GEMINI_API_KEY",
            "GEMINI_BASE_URL",
            "AUTH_JWT_SECRET",
            "WEBHOOK_SHARED_SECRET",
            "CORS_ORIGINS",
            "LOG_LEVEL",
        ] {
            std::env::remove_var(key);
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.gemini.base_url, DEFAULT_GEMINI_BASE_URL);
        assert!(config.gemini.api_key.is_none());
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(config.cors.allowed_origins, vec!["*"]);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("HTTP_PORT", "9099");
        std::env::set_var("GEMINI_API_KEY", "test-key");
        std::env::set_var("DATABASE_URL", "sqlite::memory:");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.http_port, 9099);
        assert_eq!(config.gemini.api_key.as_deref(), Some("test-key"));
        assert!(config.database_url.is_memory());

        std::env::remove_var("HTTP_PORT");
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn test_empty_secret_treated_as_absent() {
        std::env::set_var("GEMINI_API_KEY", "");
        let config = ServerConfig::from_env().unwrap();
        assert!(config.gemini.api_key.is_none());
        std::env::remove_var("GEMINI_API_KEY");
    }
}
