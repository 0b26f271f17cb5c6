//! Health Check and Metrics Endpoints
//!
//! Handlers for connection status reporting, Prometheus metrics and the
//! manual connect trigger. Routed by `infrastructure::server`.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe (ticker connected)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `POST /feed/connect` - request a ticker connection

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::feed::{ConnectionState, FeedState};
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::server::AppState;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream feed status.
    pub feed: FeedInfo,
    /// Connected downstream subscribers.
    pub subscribers: usize,
    /// Tokens selected at startup.
    pub subscription_size: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Ticker connected.
    Healthy,
    /// Ticker connecting or waiting to reconnect.
    Degraded,
    /// Ticker disconnected.
    Unhealthy,
}

/// Upstream feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state.
    pub state: ConnectionState,
    /// Whether the feed is connected.
    pub connected: bool,
    /// Last successful connection.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Last reported error.
    pub last_error: Option<String>,
    /// Tick batches received.
    pub batches_received: u64,
    /// Ticks received.
    pub ticks_received: u64,
    /// Reconnect attempts since the last successful connection.
    pub reconnect_attempts: u64,
}

impl From<&FeedState> for FeedInfo {
    fn from(state: &FeedState) -> Self {
        Self {
            state: state.state(),
            connected: state.is_connected(),
            last_connected_at: state.last_connected_at(),
            last_error: state.last_error(),
            batches_received: state.batches_received(),
            ticks_received: state.ticks_received(),
            reconnect_attempts: state.reconnect_attempts(),
        }
    }
}

/// Response to a connect request.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectResponse {
    /// Whether the request was accepted.
    pub accepted: bool,
    /// Ticker state when the request arrived.
    pub state: ConnectionState,
}

// =============================================================================
// HTTP Handlers
// =============================================================================

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

/// `GET /healthz`
pub async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /readyz`
pub async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.feed_state.is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

/// `POST /feed/connect`
pub async fn connect_handler(State(state): State<AppState>) -> impl IntoResponse {
    let current = state.ticker.state();
    let accepted = state.ticker.request_connect();
    tracing::info!(accepted, state = current.as_str(), "Connect requested");

    let status = if accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    };
    (
        status,
        Json(ConnectResponse {
            accepted,
            state: current,
        }),
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let feed = FeedInfo::from(state.feed_state.as_ref());

    HealthResponse {
        status: determine_health_status(feed.state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        subscribers: state.registry.len(),
        subscription_size: state.subscription_size,
    }
}

const fn determine_health_status(state: ConnectionState) -> HealthStatus {
    match state {
        ConnectionState::Connected => HealthStatus::Healthy,
        ConnectionState::Connecting | ConnectionState::Reconnecting => HealthStatus::Degraded,
        ConnectionState::Disconnected => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::subscription::SubscriptionSet;
    use crate::infrastructure::broadcast::SubscriberRegistry;
    use crate::infrastructure::config::Credentials;
    use crate::infrastructure::kite::{KiteTicker, TickerConfig};
    use crate::infrastructure::server::router;

    fn state() -> AppState {
        let (tx, _rx) = mpsc::channel(1);
        let ticker = KiteTicker::new(
            TickerConfig::new(
                "ws://127.0.0.1:1",
                Credentials::new("key", "token").unwrap(),
            ),
            SubscriptionSet::default(),
            tx,
            CancellationToken::new(),
        );
        AppState {
            version: "test".to_string(),
            started_at: Instant::now(),
            feed_state: Arc::new(FeedState::new()),
            registry: Arc::new(SubscriberRegistry::new(4)),
            ticker: Arc::new(ticker),
            subscription_size: 2,
            cancel: CancellationToken::new(),
        }
    }

    async fn call(state: AppState, method: &str, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn status_follows_connection_state() {
        assert_eq!(
            determine_health_status(ConnectionState::Connected),
            HealthStatus::Healthy
        );
        assert_eq!(
            determine_health_status(ConnectionState::Reconnecting),
            HealthStatus::Degraded
        );
        assert_eq!(
            determine_health_status(ConnectionState::Disconnected),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn liveness_is_ok() {
        let (status, body) = call(state(), "GET", "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn health_reports_disconnected_feed() {
        let (status, body) = call(state(), "GET", "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "unhealthy");
        assert_eq!(value["feed"]["state"], "disconnected");
        assert_eq!(value["subscription_size"], 2);
    }

    #[tokio::test]
    async fn readiness_requires_connection() {
        let state = state();
        let (status, _) = call(state.clone(), "GET", "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.feed_state.set_state(ConnectionState::Connected);
        let (status, body) = call(state, "GET", "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "READY");
    }

    #[tokio::test]
    async fn connect_request_is_accepted_when_disconnected() {
        let (status, body) = call(state(), "POST", "/feed/connect").await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["accepted"], true);
        assert_eq!(value["state"], "disconnected");
    }
}
