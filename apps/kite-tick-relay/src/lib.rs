#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Kite Tick Relay - Live Market Data Fan-out
//!
//! Selects a bounded set of instruments from the Kite instrument catalog,
//! holds one Kite ticker connection for them, names every tick with its
//! trading symbol and rebroadcasts each batch to every connected downstream
//! WebSocket client.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types and rules
//!   - `instrument`: catalog records and the market / type filter
//!   - `subscription`: symbol ordering, top-N selection, symbol lookup
//!   - `tick`: decoded ticks and their enriched downstream form
//!   - `feed`: upstream connection state
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `FeedEvent` (inbound) and `TickSink` (outbound)
//!   - `services`: `TickPipeline`, enrichment and publication
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `catalog`: CSV loader
//!   - `kite`: ticker WebSocket client and binary codec
//!   - `broadcast`: subscriber registry and console sink
//!   - `gateway` / `server` / `health`: HTTP and WebSocket surface
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! instruments.csv ──► select_top_n ──► RelayContext
//!                                          │
//! Kite ticker WS ──► KiteTicker ──FeedEvent──► TickPipeline ──► TickSink ──► /ws client 1
//!                                                                        ├─► /ws client 2
//!                                                                        └─► /ws client N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::feed::{ConnectionState, FeedState};
pub use domain::instrument::{InstrumentFilter, InstrumentRecord, InstrumentToken};
pub use domain::subscription::{
    DEFAULT_SUBSCRIPTION_LIMIT, RelayContext, Selection, SubscriptionSet, SymbolIndex,
    UNKNOWN_SYMBOL, select_top_n,
};
pub use domain::tick::{EnrichedTick, TickMode, TickRecord, enrich_batch};

// Application
pub use application::ports::{FeedEvent, TickBatch, TickSink};
pub use application::services::TickPipeline;

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, CatalogSettings, ConfigError, Credentials, FeedSettings, RelayConfig,
    ServerSettings, SinkKind,
};

// Catalog
pub use infrastructure::catalog::{CatalogError, CatalogLoad, load_filtered};

// Sinks
pub use infrastructure::broadcast::{
    BroadcastReport, ConsoleSink, DeliveryError, SubscriberId, SubscriberRegistry, TICK_EVENT,
};

// Kite ticker
pub use infrastructure::kite::{KiteCodec, KiteTicker, TickerConfig, TickerError};

// HTTP server
pub use infrastructure::server::{AppState, HttpServerError, RelayServer};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
