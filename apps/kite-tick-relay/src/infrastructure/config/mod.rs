//! Configuration Module
//!
//! Environment-driven configuration for the relay.

mod settings;

pub use settings::{
    BroadcastSettings, CatalogSettings, ConfigError, Credentials, FeedSettings, RelayConfig,
    ServerSettings, SinkKind,
};
