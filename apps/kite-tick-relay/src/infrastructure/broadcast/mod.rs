//! Tick Sinks
//!
//! Implementations of the `TickSink` port:
//!
//! - `SubscriberRegistry`: fans every batch out to connected WebSocket
//!   subscribers as a `tick` event
//! - `ConsoleSink`: logs every batch

mod console;
mod registry;

pub use console::ConsoleSink;
pub use registry::{
    BroadcastReport, DeliveryError, Outbound, SubscriberId, SubscriberRegistry, TICK_EVENT,
    encode_event,
};
