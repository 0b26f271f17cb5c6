//! Relay HTTP Server
//!
//! One listener serves both the subscriber WebSocket and the operational
//! routes:
//!
//! - `GET /ws` - subscriber channel (`tick` events)
//! - `GET /health`, `/healthz`, `/readyz` - health checks
//! - `GET /metrics` - Prometheus metrics
//! - `POST /feed/connect` - ask the ticker to (re)connect

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::feed::FeedState;
use crate::infrastructure::broadcast::SubscriberRegistry;
use crate::infrastructure::gateway::ws_handler;
use crate::infrastructure::health::{
    connect_handler, health_handler, liveness_handler, metrics_handler, readiness_handler,
};
use crate::infrastructure::kite::KiteTicker;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    /// Relay version.
    pub version: String,
    /// Process start time.
    pub started_at: Instant,
    /// Upstream connection view.
    pub feed_state: Arc<FeedState>,
    /// Connected subscribers.
    pub registry: Arc<SubscriberRegistry>,
    /// Upstream client, for connect requests.
    pub ticker: Arc<KiteTicker>,
    /// Tokens selected at startup.
    pub subscription_size: usize,
    /// Relay shutdown signal.
    pub cancel: CancellationToken,
}

/// Build the relay router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/feed/connect", post(connect_handler))
        .with_state(state)
}

/// HTTP server for subscribers and health checks.
pub struct RelayServer {
    listener: TcpListener,
    state: AppState,
}

impl RelayServer {
    /// Bind `0.0.0.0:port` (0 picks a free port).
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::BindFailed` if the port cannot be bound.
    pub async fn bind(port: u16, state: AppState) -> Result<Self, HttpServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(port, e.to_string()))?;
        Ok(Self { listener, state })
    }

    /// Address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the relay shutdown signal fires.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::ServerFailed` if the server stops with an error.
    pub async fn serve(self) -> Result<(), HttpServerError> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Relay server listening");

        let cancel = self.state.cancel.clone();
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Relay server stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
