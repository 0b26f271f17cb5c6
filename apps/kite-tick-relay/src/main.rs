//! Kite Tick Relay Binary
//!
//! Loads the instrument catalog, connects to the Kite ticker and relays
//! enriched ticks to downstream WebSocket subscribers.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin kite-tick-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `KITE_API_KEY`: Kite Connect API key
//! - `KITE_ACCESS_TOKEN`: Kite Connect access token
//!
//! ## Optional
//! - `RELAY_CATALOG_PATH`: instrument CSV (default: instruments.csv)
//! - `RELAY_MARKET` / `RELAY_INSTRUMENT_TYPE`: filter (default: NSE / EQ)
//! - `RELAY_SUBSCRIPTION_LIMIT`: instruments to subscribe to (default: 200)
//! - `RELAY_PORT`: subscriber and health port (default: 3000)
//! - `RELAY_SINK`: broadcast | console (default: broadcast)
//! - `KITE_TICKER_URL`: ticker endpoint (default: <wss://ws.kite.trade>)
//! - `KITE_RECONNECT_ENABLED`: retry automatically after a loss (default: false)
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: info)

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use kite_tick_relay::application::ports::TickSink;
use kite_tick_relay::application::services::TickPipeline;
use kite_tick_relay::domain::feed::FeedState;
use kite_tick_relay::domain::instrument::InstrumentFilter;
use kite_tick_relay::domain::subscription::{RelayContext, select_top_n};
use kite_tick_relay::infrastructure::broadcast::{ConsoleSink, SubscriberRegistry};
use kite_tick_relay::infrastructure::catalog;
use kite_tick_relay::infrastructure::config::{CatalogSettings, RelayConfig, SinkKind};
use kite_tick_relay::infrastructure::kite::{KiteTicker, TickerConfig};
use kite_tick_relay::infrastructure::metrics::{self, init_metrics};
use kite_tick_relay::infrastructure::server::{AppState, RelayServer};
use kite_tick_relay::infrastructure::telemetry;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Kite tick relay");

    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let context = Arc::new(load_relay_context(&config.catalog).await?);
    let subscription_size = context.subscription().len();
    metrics::set_subscription_size(subscription_size);

    let shutdown_token = CancellationToken::new();
    let feed_state = Arc::new(FeedState::new());
    let registry = Arc::new(SubscriberRegistry::new(config.broadcast.subscriber_buffer));

    let sink: Arc<dyn TickSink> = match config.broadcast.sink {
        SinkKind::Broadcast => Arc::clone(&registry) as Arc<dyn TickSink>,
        SinkKind::Console => Arc::new(ConsoleSink::new()),
    };

    let (event_tx, event_rx) = mpsc::channel(config.broadcast.feed_channel_capacity);

    let pipeline = TickPipeline::new(Arc::clone(&context), sink, Arc::clone(&feed_state));
    tokio::spawn(pipeline.run(event_rx));

    let ticker = Arc::new(KiteTicker::new(
        TickerConfig::from_settings(&config.feed, config.credentials.clone()),
        context.subscription().clone(),
        event_tx,
        shutdown_token.clone(),
    ));
    let ticker_handle = tokio::spawn(Arc::clone(&ticker).run());
    ticker.request_connect();

    let state = AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: Instant::now(),
        feed_state,
        registry,
        ticker,
        subscription_size,
        cancel: shutdown_token.clone(),
    };
    let server = RelayServer::bind(config.server.port, state)
        .await
        .context("failed to start relay server")?;

    tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            tracing::error!(error = %e, "Relay server error");
        }
    });

    tracing::info!(port = config.server.port, "Kite tick relay ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, ticker_handle)
        .await
        .is_err()
    {
        tracing::warn!("Kite ticker did not stop in time");
    }

    tracing::info!("Kite tick relay stopped");
    Ok(())
}

/// Load the catalog and select the subscription.
///
/// Runs the file read on the blocking pool. Any failure here aborts startup
/// before the ticker connects.
async fn load_relay_context(settings: &CatalogSettings) -> anyhow::Result<RelayContext> {
    let path = settings.path.clone();
    let filter = InstrumentFilter::new(&settings.market, &settings.instrument_type);

    let load = tokio::task::spawn_blocking(move || catalog::load_filtered(&path, filter))
        .await
        .context("catalog loader panicked")?
        .context("failed to load instrument catalog")?;

    let selection = select_top_n(load.records, settings.subscription_limit);
    if selection.subscription.is_empty() {
        tracing::warn!(
            market = %settings.market,
            instrument_type = %settings.instrument_type,
            "No instruments matched, the relay will publish nothing"
        );
    }
    tracing::info!(
        selected = selection.subscription.len(),
        limit = settings.subscription_limit,
        "Subscription selected"
    );

    Ok(RelayContext::new(selection))
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        catalog = %config.catalog.path.display(),
        market = %config.catalog.market,
        instrument_type = %config.catalog.instrument_type,
        limit = config.catalog.subscription_limit,
        port = config.server.port,
        sink = config.broadcast.sink.as_str(),
        reconnect = config.feed.reconnect_enabled,
        "Configuration loaded"
    );
    tracing::debug!(ticker_url = %config.feed.ticker_url, "Ticker endpoint");
}

/// Load a .env file from the current directory or the nearest ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for SIGTERM or SIGINT, then cancel everything.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }

    shutdown_token.cancel();
}
