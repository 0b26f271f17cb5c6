//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the tick pipeline and the port interfaces that
//! decouple it from the upstream feed and the downstream consumers.

/// Port interfaces for external systems (feed events, tick sinks).
pub mod ports;

/// Application services (enrichment and fan-out pipeline).
pub mod services;
