//! relay-gateway server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket upgrade endpoints and
//! one hub task per logical channel.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use relay_gateway::app_state::AppState;
use relay_gateway::auth::Hs256Validator;
use relay_gateway::config::RelayConfig;
use relay_gateway::realtime::{Hub, spawn_news_ticker};
use relay_gateway::ws::handler::{chat_ws_handler, notifications_ws_handler};

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting relay-gateway");

    let validator = Arc::new(Hs256Validator::new(config.token_secret.clone()));

    // One hub task per logical channel; they share nothing.
    let (chat_hub, chat_handle) = Hub::new("chat", config.hub_queue_capacity);
    let (notify_hub, notify_handle) = Hub::new("notifications", config.hub_queue_capacity);
    tokio::spawn(chat_hub.run());
    tokio::spawn(notify_hub.run());

    if config.news_enabled {
        spawn_news_ticker(
            notify_handle.clone(),
            Duration::from_secs(config.news_interval_secs),
        );
    }

    // Build application state
    let app_state = AppState {
        chat_hub: chat_handle,
        notify_hub: notify_handle,
        validator,
        pump: config.pump(),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ws/chat", get(chat_ws_handler))
        .route("/ws/group/chat", get(chat_ws_handler))
        .route("/ws/notifications", get(notifications_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server exited gracefully");
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => tracing::error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
