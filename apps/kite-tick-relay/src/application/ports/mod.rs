//! Port Interfaces
//!
//! Defines the interfaces (ports) between the pipeline and the outside
//! world following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TickSink`: where enriched batches go (subscriber broadcast, console)
//!
//! ## Driver Ports (Inbound)
//!
//! - `FeedEvent`: typed events emitted by the upstream feed connector

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::tick::{EnrichedTick, TickRecord};

/// An enriched batch, shared between all recipients.
pub type TickBatch = Arc<[EnrichedTick]>;

/// Events emitted by the upstream feed connector, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Handshake started.
    Connecting,
    /// Handshake succeeded and the subscription was activated.
    Connected {
        /// Number of tokens subscribed in full mode.
        subscribed: usize,
    },
    /// A batch of decoded ticks.
    Ticks(Vec<TickRecord>),
    /// Error reported by the upstream or the connection.
    Error(String),
    /// Connection lost or closed.
    Disconnected {
        /// Why the connection ended.
        reason: String,
    },
    /// Waiting before an automatic reconnection attempt.
    Reconnecting {
        /// Reconnection attempt number.
        attempt: u32,
    },
}

/// Destination for enriched tick batches.
///
/// Implementations must not block on any individual consumer and must not
/// fail: delivery problems are handled and reported inside the sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TickSink: Send + Sync {
    /// Publish one enriched batch.
    async fn publish(&self, batch: TickBatch);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
