//! Domain Layer - Core relay types and business logic.
//!
//! This layer contains the instrument selection and tick enrichment logic
//! with no I/O. Everything here is deterministic and synchronous.

/// Feed connection state tracking.
pub mod feed;

/// Instrument catalog rows and filtering.
pub mod instrument;

/// Subscription selection (top-N set and symbol index).
pub mod subscription;

/// Tick records and enrichment.
pub mod tick;
