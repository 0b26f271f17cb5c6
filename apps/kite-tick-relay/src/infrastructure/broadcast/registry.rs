//! Subscriber Registry
//!
//! Tracks connected downstream subscribers and delivers every event to all
//! of them. Each subscriber owns a bounded queue drained by its own writer
//! task, so delivery is a non-blocking `try_send` per subscriber:
//!
//! - queue full: the event is dropped for that subscriber only
//! - queue closed: the subscriber is removed
//!
//! Neither outcome affects the other subscribers or the caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::application::ports::{TickBatch, TickSink};
use crate::infrastructure::metrics;

/// Event name under which tick batches are published.
pub const TICK_EVENT: &str = "tick";

/// Subscriber identifier.
pub type SubscriberId = Uuid;

/// Encoded event shared by every subscriber queue.
pub type Outbound = Arc<str>;

/// Why a delivery to one subscriber failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Outbound queue is full; the event was dropped for this subscriber.
    #[error("subscriber queue full")]
    QueueFull,
    /// Subscriber has gone away.
    #[error("subscriber disconnected")]
    Closed,
}

impl DeliveryError {
    /// Metric label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
        }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers that did not.
    pub failed: Vec<(SubscriberId, DeliveryError)>,
}

impl BroadcastReport {
    /// Number of failed deliveries.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize + ?Sized> {
    event: &'a str,
    data: &'a T,
}

/// Encode `{"event": <event>, "data": <data>}`.
///
/// # Errors
///
/// Returns an error if `data` cannot be serialized.
pub fn encode_event<T: Serialize + ?Sized>(
    event: &str,
    data: &T,
) -> Result<Outbound, serde_json::Error> {
    serde_json::to_string(&Envelope { event, data }).map(Outbound::from)
}

/// Set of connected downstream subscribers.
#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Outbound>>>,
    queue_capacity: usize,
}

impl SubscriberRegistry {
    /// Create an empty registry; every subscriber gets a queue of
    /// `queue_capacity` events.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Add a subscriber and return its id and inbound queue.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<Outbound>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        metrics::set_subscribers(count);
        tracing::info!(subscriber = %id, subscribers = count, "Subscriber registered");

        (id, rx)
    }

    /// Remove a subscriber. Removing an unknown id is a no-op.
    ///
    /// Returns whether the subscriber was present.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };

        if removed {
            metrics::set_subscribers(count);
            tracing::info!(subscriber = %id, subscribers = count, "Subscriber unregistered");
        }
        removed
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether no subscriber is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Deliver one encoded event to every subscriber.
    pub fn deliver(&self, payload: &Outbound) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(Arc::clone(payload)) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.failed.push((*id, DeliveryError::QueueFull));
                    }
                    Err(TrySendError::Closed(_)) => {
                        report.failed.push((*id, DeliveryError::Closed));
                    }
                }
            }
        }

        for (id, error) in &report.failed {
            metrics::record_delivery_failed(error.label());
            tracing::warn!(subscriber = %id, error = %error, "Delivery failed");
            if *error == DeliveryError::Closed {
                self.unregister(*id);
            }
        }

        report
    }

    /// Encode and deliver `data` under `event`.
    ///
    /// # Errors
    ///
    /// Returns an error only if `data` cannot be serialized; delivery
    /// failures are reported in the returned [`BroadcastReport`].
    pub fn broadcast<T: Serialize + ?Sized>(
        &self,
        event: &str,
        data: &T,
    ) -> Result<BroadcastReport, serde_json::Error> {
        let payload = encode_event(event, data)?;
        Ok(self.deliver(&payload))
    }
}

#[async_trait]
impl TickSink for SubscriberRegistry {
    async fn publish(&self, batch: TickBatch) {
        match self.broadcast(TICK_EVENT, &*batch) {
            Ok(report) => tracing::debug!(
                ticks = batch.len(),
                delivered = report.delivered,
                failed = report.failed_count(),
                "Tick batch broadcast"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to encode tick batch"),
        }
    }

    fn name(&self) -> &'static str {
        "broadcast"
    }
}
