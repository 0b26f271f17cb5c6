//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus everything that
//! talks to files, sockets or the environment.

/// Instrument catalog (CSV) loader.
pub mod catalog;

/// Kite ticker WebSocket client.
pub mod kite;

/// Tick sinks: subscriber broadcast and console.
pub mod broadcast;

/// Downstream subscriber WebSocket endpoint.
pub mod gateway;

/// HTTP server wiring.
pub mod server;

/// Configuration from the environment.
pub mod config;

/// Health check and connect-trigger handlers.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
