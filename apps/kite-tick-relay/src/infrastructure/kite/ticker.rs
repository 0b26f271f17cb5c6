//! Kite Ticker Client
//!
//! Holds the single upstream WebSocket connection and turns it into a
//! stream of [`FeedEvent`]s.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect request──► Connecting ──handshake ok──► Connected
//!      ▲                                 │                           │
//!      └──────── handshake failed ───────┘◄──── closed / error ──────┘
//! ```
//!
//! With automatic reconnection enabled, a lost connection moves to
//! `Reconnecting` and retries after a backoff delay. Otherwise the client
//! stays `Disconnected` until [`KiteTicker::request_connect`] is called.
//!
//! # Activation
//!
//! Right after the handshake the client sends `subscribe` followed by
//! `mode full` for the whole subscription set. Ticks are only forwarded
//! after both have been written.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, Frame, KiteCodec, TextMessage};
use super::messages::TickerRequest;
use super::reconnect::{Backoff, BackoffConfig};
use crate::application::ports::FeedEvent;
use crate::domain::feed::ConnectionState;
use crate::domain::subscription::SubscriptionSet;
use crate::domain::tick::TickMode;
use crate::infrastructure::config::{Credentials, FeedSettings};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a ticker connection.
#[derive(Debug, thiserror::Error)]
pub enum TickerError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Handshake did not finish in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Request serialization failed.
    #[error("failed to encode request: {0}")]
    Request(#[from] serde_json::Error),

    /// Connection closed by the server or the stream ended.
    #[error("connection closed: {0}")]
    Closed(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the ticker client.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Endpoint without query string.
    pub url: String,
    /// API credentials.
    pub credentials: Credentials,
    /// Handshake timeout (`None` = wait indefinitely).
    pub connect_timeout: Option<Duration>,
    /// Automatic reconnection (`None` = wait for a connect request).
    pub reconnect: Option<BackoffConfig>,
}

impl TickerConfig {
    /// Create a configuration with the given endpoint and no automatic
    /// reconnection.
    #[must_use]
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            credentials,
            connect_timeout: Some(Duration::from_secs(30)),
            reconnect: None,
        }
    }

    /// Create configuration from feed settings.
    #[must_use]
    pub fn from_settings(settings: &FeedSettings, credentials: Credentials) -> Self {
        Self {
            url: settings.ticker_url.clone(),
            credentials,
            connect_timeout: settings.connect_timeout,
            reconnect: BackoffConfig::from_feed_settings(settings),
        }
    }

    /// Full endpoint with credentials in the query string.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}?api_key={}&access_token={}",
            self.url,
            self.credentials.api_key(),
            self.credentials.access_token()
        )
    }

    /// Endpoint safe to log.
    #[must_use]
    pub fn redacted_endpoint(&self) -> String {
        format!("{}?api_key=[REDACTED]&access_token=[REDACTED]", self.url)
    }
}

// =============================================================================
// Ticker Client
// =============================================================================

/// Kite ticker WebSocket client.
pub struct KiteTicker {
    config: TickerConfig,
    subscription: SubscriptionSet,
    codec: KiteCodec,
    event_tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
    connect_requested: Notify,
    state: RwLock<ConnectionState>,
}

impl KiteTicker {
    /// Create a new ticker client.
    #[must_use]
    pub fn new(
        config: TickerConfig,
        subscription: SubscriptionSet,
        event_tx: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            subscription,
            codec: KiteCodec::new(),
            event_tx,
            cancel,
            connect_requested: Notify::new(),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Ask the client to connect.
    ///
    /// Only honoured while `Disconnected`; returns whether the request was
    /// accepted.
    pub fn request_connect(&self) -> bool {
        if self.state() != ConnectionState::Disconnected {
            return false;
        }
        self.connect_requested.notify_one();
        true
    }

    /// Run the connection loop until cancelled.
    ///
    /// Connection failures are reported as events and never end the loop.
    pub async fn run(self: Arc<Self>) {
        let mut backoff = self.config.reconnect.clone().map(Backoff::new);
        let mut retry_now = false;

        loop {
            if !retry_now {
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = self.connect_requested.notified() => {}
                }
            }
            retry_now = false;

            match self.connect_and_run(backoff.as_mut()).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Kite ticker connection ended");
                    self.set_state(ConnectionState::Disconnected);
                    self.emit(FeedEvent::Disconnected {
                        reason: e.to_string(),
                    })
                    .await;

                    let Some(backoff) = backoff.as_mut() else {
                        tracing::info!(
                            "Automatic reconnection disabled, waiting for a connect request"
                        );
                        continue;
                    };

                    let Some(delay) = backoff.next_delay() else {
                        tracing::warn!(
                            attempts = backoff.attempts(),
                            "Reconnection attempts exhausted, waiting for a connect request"
                        );
                        backoff.reset();
                        continue;
                    };

                    let attempt = backoff.attempts();
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Reconnecting to Kite ticker"
                    );
                    self.set_state(ConnectionState::Reconnecting);
                    self.emit(FeedEvent::Reconnecting { attempt }).await;

                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    retry_now = true;
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Kite ticker stopped");
    }

    /// Connect, activate and stream until error or cancellation.
    ///
    /// Returns `Ok(())` only when cancelled.
    async fn connect_and_run(&self, backoff: Option<&mut Backoff>) -> Result<(), TickerError> {
        self.set_state(ConnectionState::Connecting);
        self.emit(FeedEvent::Connecting).await;
        tracing::info!(url = %self.config.redacted_endpoint(), "Connecting to Kite ticker");

        let ws_stream = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = self.handshake() => result?,
        };
        let (mut write, mut read) = ws_stream.split();

        self.activate(&mut write).await?;
        self.set_state(ConnectionState::Connected);
        if let Some(backoff) = backoff {
            backoff.reset();
        }
        self.emit(FeedEvent::Connected {
            subscribed: self.subscription.len(),
        })
        .await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => self.handle_binary(&data).await,
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map_or_else(
                                || "server sent close frame".to_string(),
                                |f| format!("{} {}", u16::from(f.code), f.reason),
                            );
                            return Err(TickerError::Closed(reason));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(TickerError::Closed("stream ended".to_string())),
                    }
                }
            }
        }
    }

    async fn handshake(&self) -> Result<WsStream, TickerError> {
        let connect = tokio_tungstenite::connect_async(self.config.endpoint());
        let (ws_stream, _response) = match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| TickerError::HandshakeTimeout(limit))??,
            None => connect.await?,
        };
        Ok(ws_stream)
    }

    /// Subscribe to the whole set and switch it to full mode.
    async fn activate<W>(&self, write: &mut W) -> Result<(), TickerError>
    where
        W: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let tokens = self.subscription.tokens();
        if tokens.is_empty() {
            tracing::warn!("Subscription set is empty, no ticks will arrive");
            return Ok(());
        }

        let subscribe = TickerRequest::subscribe(tokens).to_json()?;
        let mode = TickerRequest::mode(TickMode::Full, tokens).to_json()?;
        write.send(Message::Text(subscribe.into())).await?;
        write.send(Message::Text(mode.into())).await?;

        tracing::info!(tokens = tokens.len(), "Subscribed in full mode");
        Ok(())
    }

    async fn handle_binary(&self, data: &[u8]) {
        match self.codec.decode_binary(data) {
            Ok(Frame::Heartbeat) => tracing::trace!("Kite heartbeat"),
            Ok(Frame::Ticks(ticks)) if ticks.is_empty() => {}
            Ok(Frame::Ticks(ticks)) => self.emit(FeedEvent::Ticks(ticks)).await,
            Err(e) => self.report_codec_error(&e).await,
        }
    }

    async fn handle_text(&self, text: &str) {
        match self.codec.decode_text(text) {
            Ok(TextMessage::Error(message)) => self.emit(FeedEvent::Error(message)).await,
            Ok(TextMessage::Message(message)) => {
                tracing::info!(message = %message, "Kite ticker message");
            }
            Ok(TextMessage::Order(_)) => tracing::debug!("Ignoring order postback"),
            Ok(TextMessage::Other(kind)) => {
                tracing::debug!(kind = %kind, "Ignoring ticker text message");
            }
            Err(e) => self.report_codec_error(&e).await,
        }
    }

    async fn report_codec_error(&self, error: &CodecError) {
        tracing::warn!(error = %error, "Failed to decode ticker frame");
        self.emit(FeedEvent::Error(error.to_string())).await;
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    async fn emit(&self, event: FeedEvent) {
        if self.event_tx.send(event).await.is_err() {
            tracing::debug!("Feed event receiver dropped");
        }
    }
}
