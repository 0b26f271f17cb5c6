//! Application Services
//!
//! - `TickPipeline`: consumes feed events in arrival order, enriches tick
//!   batches with symbols and hands them to the configured `TickSink`.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::application::ports::{FeedEvent, TickBatch, TickSink};
use crate::domain::feed::{ConnectionState, FeedState};
use crate::domain::subscription::RelayContext;
use crate::domain::tick::{TickRecord, enrich_batch};
use crate::infrastructure::metrics;

/// Enrichment and fan-out stage.
///
/// Runs on a single task, so batches are enriched and published strictly in
/// the order the feed delivered them.
pub struct TickPipeline {
    context: Arc<RelayContext>,
    sink: Arc<dyn TickSink>,
    feed_state: Arc<FeedState>,
}

impl TickPipeline {
    /// Create a new pipeline.
    #[must_use]
    pub fn new(
        context: Arc<RelayContext>,
        sink: Arc<dyn TickSink>,
        feed_state: Arc<FeedState>,
    ) -> Self {
        Self {
            context,
            sink,
            feed_state,
        }
    }

    /// Process feed events until the channel closes.
    pub async fn run(self, mut rx: mpsc::Receiver<FeedEvent>) {
        tracing::info!(sink = self.sink.name(), "Tick pipeline started");
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
        tracing::info!("Tick pipeline stopped");
    }

    /// Apply one feed event.
    pub async fn handle_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Connecting => {
                self.feed_state.set_state(ConnectionState::Connecting);
                tracing::info!("Kite ticker connecting");
            }
            FeedEvent::Connected { subscribed } => {
                self.feed_state.set_state(ConnectionState::Connected);
                self.feed_state.set_subscription_count(subscribed);
                metrics::set_feed_connected(true);
                tracing::info!(subscribed, "Kite ticker connected");
            }
            FeedEvent::Ticks(batch) => {
                if !self.feed_state.is_connected() {
                    tracing::warn!(
                        ticks = batch.len(),
                        "Dropping tick batch received before activation"
                    );
                    return;
                }
                self.process_batch(&batch).await;
            }
            FeedEvent::Error(message) => {
                metrics::record_feed_error();
                tracing::error!(error = %message, "Kite ticker error");
                self.feed_state.set_error(message);
            }
            FeedEvent::Disconnected { reason } => {
                self.feed_state.set_state(ConnectionState::Disconnected);
                metrics::set_feed_connected(false);
                tracing::warn!(reason = %reason, "Kite ticker disconnected");
            }
            FeedEvent::Reconnecting { attempt } => {
                self.feed_state.set_state(ConnectionState::Reconnecting);
                self.feed_state.increment_reconnect_attempts();
                metrics::record_reconnect();
                tracing::info!(attempt, "Kite ticker reconnecting");
            }
        }
    }

    /// Enrich one raw batch and publish it. Returns the published length.
    pub async fn process_batch(&self, batch: &[TickRecord]) -> usize {
        let started = Instant::now();
        self.feed_state.record_batch(batch.len());
        metrics::record_batch_received(batch.len());

        let enriched: TickBatch = enrich_batch(batch, self.context.symbols()).into();
        let published = enriched.len();
        self.sink.publish(enriched).await;

        metrics::record_ticks_published(self.sink.name(), published);
        metrics::record_processing_duration(started.elapsed());
        published
    }
}
