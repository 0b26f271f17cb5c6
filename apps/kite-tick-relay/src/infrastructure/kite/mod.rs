//! Kite Ticker Adapter
//!
//! Upstream market-data connection.
//!
//! - `codec`: binary tick frames and JSON text messages
//! - `messages`: subscribe / mode requests
//! - `reconnect`: optional backoff between automatic reconnections
//! - `ticker`: connection lifecycle, emitting `FeedEvent`s

pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod ticker;

pub use codec::{CodecError, Frame, KiteCodec, TextMessage};
pub use messages::TickerRequest;
pub use reconnect::{Backoff, BackoffConfig};
pub use ticker::{KiteTicker, TickerConfig, TickerError};
