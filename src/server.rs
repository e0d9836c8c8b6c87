//! Server module for Parley
//!
//! Loads configuration, mounts the Slack connector and serves HTTP.

pub mod config;
pub mod echo;
pub mod loader;

use anyhow::{Context, Result};
use axum::Router;
use parley_channels::SlackInput;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

use self::config::AppConfig;
use self::echo::EchoEngine;

/// Command-line overrides for the server address
#[derive(Debug, Default, Clone)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Build the Slack connector from configuration, failing fast on bad credentials
pub fn build_slack_input(config: &AppConfig) -> Result<SlackInput> {
    let input = SlackInput::from_credentials(config.slack.clone())
        .context("Failed to configure the Slack connector")?;

    Ok(input.with_span(info_span!("slack", mount = %config.server.mount_path)))
}

/// Mount the connector routes under the configured path
pub fn build_router(config: &AppConfig, slack: &SlackInput) -> Router {
    let routes = slack.blueprint(EchoEngine);
    let mount = config.server.mount_path.trim_end_matches('/');

    let app = if mount.is_empty() {
        Router::new().merge(routes)
    } else {
        Router::new().nest(mount, routes)
    };

    app.layer(TraceLayer::new_for_http())
}

/// Run the server
pub async fn run(overrides: ServeOverrides) -> Result<()> {
    let mut config = loader::load_config()?;
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }

    let slack = build_slack_input(&config)?;
    info!(
        channel = ?slack.slack_channel(),
        mount = %config.server.mount_path,
        "Slack connector configured"
    );

    let app = build_router(&config, &slack);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Validate configuration without starting the server
pub fn check() -> Result<()> {
    let config = loader::load_config()?;
    let slack = build_slack_input(&config)?;
    info!(?slack, "Configuration is valid");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
