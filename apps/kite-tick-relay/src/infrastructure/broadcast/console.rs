//! Console Sink
//!
//! Logs enriched batches instead of fanning them out. Useful for checking
//! the upstream feed without a downstream client.

use async_trait::async_trait;

use crate::application::ports::{TickBatch, TickSink};

/// Sink that writes each batch to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    /// Create a console sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TickSink for ConsoleSink {
    async fn publish(&self, batch: TickBatch) {
        tracing::info!(ticks = batch.len(), "Tick batch");
        for tick in batch.iter() {
            tracing::info!(
                token = tick.token,
                symbol = %tick.symbol,
                last_price = %tick.last_price,
                volume = ?tick.volume,
                change = %tick.change,
                "Tick"
            );
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
