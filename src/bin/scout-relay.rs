// ABOUTME: Binary entry point for the scout relay server
// ABOUTME: Loads configuration, initializes logging and the database, then serves

//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! # Scout Relay Server Binary
//!
//! Starts the AI-proxy relay behind the scout portal: streaming coach
//! chat, feedback triage, CV extraction, and the lead intake webhook.

use anyhow::Result;
use clap::Parser;
use scout_relay::config::environment::ServerConfig;
use scout_relay::database::Database;
use scout_relay::server::ServerResources;
use scout_relay::{logging, server};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "scout-relay")]
#[command(about = "Scout portal AI relay - streaming coach chat and one-shot AI helpers")]
#[command(version)]
struct Args {
    /// Override the HTTP port from the environment
    #[arg(long)]
    http_port: Option<u16>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    if args.show_config {
        // Secrets are Option<String>; print presence, not values
        println!("http_port: {}", config.http_port);
        println!("database_url: {}", config.database_url);
        println!("gemini_base_url: {}", config.gemini.base_url);
        println!("gemini_api_key: {}", config.gemini.api_key.is_some());
        println!("auth_jwt_secret: {}", config.auth.jwt_secret.is_some());
        println!(
            "webhook_shared_secret: {}",
            config.webhook.shared_secret.is_some()
        );
        println!("cors_origins: {}", config.cors.allowed_origins.join(","));
        return Ok(());
    }

    info!("Starting Scout Relay v{}", env!("CARGO_PKG_VERSION"));

    let database = Database::new(&config.database_url.to_connection_string()).await?;
    info!("Database ready at {}", config.database_url);

    let resources = Arc::new(ServerResources::new(config, database));
    server::serve(resources).await?;

    info!("Scout Relay stopped");
    Ok(())
}
