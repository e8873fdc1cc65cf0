// ABOUTME: Shared server resources, router composition, and the serve loop
// ABOUTME: Bundles config, stores, limiters, and the AI provider behind one Arc
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Server composition.
//!
//! [`ServerResources`] is the single dependency-injection container handed
//! to every route handler; building it once at startup keeps expensive
//! objects (connection pool, HTTP client, limiter tables) shared instead
//! of recreated per request. [`router`] merges the per-domain routers and
//! applies the cross-cutting layers; [`serve`] binds and runs with
//! graceful shutdown.

use crate::auth::ScoutAuthenticator;
use crate::config::environment::ServerConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::{GeminiProvider, LlmProvider};
use crate::rate_limit::RelayLimits;
use crate::routes::{CoachRoutes, CvRoutes, FeedbackRoutes, HealthRoutes, WebhookRoutes};
use axum::Router;
use http::header::HeaderName;
use http::{HeaderValue, Method};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Request-id header set and propagated on every response
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Centralized resource container for dependency injection
pub struct ServerResources {
    /// Runtime configuration
    pub config: Arc<ServerConfig>,
    /// Shared connection pool and store handles
    pub database: Database,
    /// Scout session token verification
    pub authenticator: ScoutAuthenticator,
    /// Per-endpoint fixed-window limiters
    pub limits: RelayLimits,
    /// Upstream AI provider; `None` when no API key is configured
    pub provider: Option<Arc<dyn LlmProvider>>,
}

impl ServerResources {
    /// Assemble resources from configuration and a connected database.
    ///
    /// The Gemini provider is built from the configured API key; without
    /// one the AI endpoints run degraded (feedback) or refuse (chat, CV).
    #[must_use]
    pub fn new(config: ServerConfig, database: Database) -> Self {
        let authenticator = ScoutAuthenticator::from_config(&config.auth);
        let provider = GeminiProvider::from_config(&config.gemini)
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>);

        Self {
            config: Arc::new(config),
            database,
            authenticator,
            limits: RelayLimits::new(),
            provider,
        }
    }

    /// Swap the AI provider, used by tests to inject mocks
    #[must_use]
    pub fn with_provider(mut self, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        self.provider = provider;
        self
    }
}

/// Compose the full application router with cross-cutting layers
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    let cors = cors_layer(&resources.config);

    Router::new()
        .merge(CoachRoutes::routes(resources.clone()))
        .merge(FeedbackRoutes::routes(resources.clone()))
        .merge(CvRoutes::routes(resources.clone()))
        .merge(WebhookRoutes::routes(resources.clone()))
        .merge(HealthRoutes::routes(resources))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ))
        .layer(cors)
}

/// Bind the HTTP listener and serve until ctrl-c
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server loop fails.
pub async fn serve(resources: Arc<ServerResources>) -> AppResult<()> {
    let port = resources.config.http_port;
    let app = router(resources);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind port {port}: {e}")))?;

    info!(port = port, "scout relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler");
        return;
    }
    info!("shutdown signal received");
}

/// Build the CORS layer from the configured origin list; `*` allows any
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = &config.cors.allowed_origins;
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        if parsed.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-webhook-secret"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}
