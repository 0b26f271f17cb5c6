//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! Secrets have no defaults; everything else falls back to the values
//! below when unset or unparseable.

use std::path::PathBuf;
use std::time::Duration;

/// Where enriched tick batches are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// Broadcast to connected WebSocket subscribers.
    #[default]
    Broadcast,
    /// Log each batch locally.
    Console,
}

impl SinkKind {
    /// Parse sink kind from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "console" | "log" => Self::Console,
            _ => Self::Broadcast,
        }
    }

    /// Get the sink name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Console => "console",
        }
    }
}

/// Kite ticker credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    access_token: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is empty.
    pub fn new(
        api_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        let access_token = access_token.into();

        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("KITE_API_KEY".to_string()));
        }
        if access_token.is_empty() {
            return Err(ConfigError::EmptyValue("KITE_ACCESS_TOKEN".to_string()));
        }

        Ok(Self {
            api_key,
            access_token,
        })
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Instrument catalog and selection settings.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Path of the instrument CSV.
    pub path: PathBuf,
    /// Market (exchange) filter.
    pub market: String,
    /// Instrument-type filter.
    pub instrument_type: String,
    /// Maximum number of tokens to subscribe to.
    pub subscription_limit: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("instruments.csv"),
            market: "NSE".to_string(),
            instrument_type: "EQ".to_string(),
            subscription_limit: 200,
        }
    }
}

/// Upstream ticker connection settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Ticker WebSocket endpoint, without query string.
    pub ticker_url: String,
    /// Handshake timeout (`None` = wait indefinitely).
    pub connect_timeout: Option<Duration>,
    /// Reconnect automatically after a connection loss.
    pub reconnect_enabled: bool,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ticker_url: "wss://ws.kite.trade".to_string(),
            connect_timeout: Some(Duration::from_secs(30)),
            reconnect_enabled: false,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

/// Downstream fan-out settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Sink for enriched batches.
    pub sink: SinkKind,
    /// Outbound queue capacity per subscriber.
    pub subscriber_buffer: usize,
    /// Capacity of the feed event channel.
    pub feed_channel_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            sink: SinkKind::Broadcast,
            subscriber_buffer: 256,
            feed_channel_capacity: 1024,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP port serving the WebSocket channel and health routes.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream credentials.
    pub credentials: Credentials,
    /// Catalog and selection settings.
    pub catalog: CatalogSettings,
    /// Upstream connection settings.
    pub feed: FeedSettings,
    /// Downstream fan-out settings.
    pub broadcast: BroadcastSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a secret is missing or empty, or if the
    /// subscription limit is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("KITE_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("KITE_API_KEY".to_string()))?;

        let access_token = std::env::var("KITE_ACCESS_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("KITE_ACCESS_TOKEN".to_string()))?;

        let credentials = Credentials::new(api_key, access_token)?;

        let catalog_defaults = CatalogSettings::default();
        let catalog = CatalogSettings {
            path: std::env::var("RELAY_CATALOG_PATH")
                .map_or(catalog_defaults.path, PathBuf::from),
            market: std::env::var("RELAY_MARKET").unwrap_or(catalog_defaults.market),
            instrument_type: std::env::var("RELAY_INSTRUMENT_TYPE")
                .unwrap_or(catalog_defaults.instrument_type),
            subscription_limit: parse_env_usize(
                "RELAY_SUBSCRIPTION_LIMIT",
                catalog_defaults.subscription_limit,
            ),
        };

        if catalog.subscription_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "RELAY_SUBSCRIPTION_LIMIT".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let feed_defaults = FeedSettings::default();
        let feed = FeedSettings {
            ticker_url: std::env::var("KITE_TICKER_URL").unwrap_or(feed_defaults.ticker_url),
            connect_timeout: parse_env_optional_secs(
                "KITE_CONNECT_TIMEOUT_SECS",
                feed_defaults.connect_timeout,
            ),
            reconnect_enabled: parse_env_bool(
                "KITE_RECONNECT_ENABLED",
                feed_defaults.reconnect_enabled,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "KITE_RECONNECT_DELAY_INITIAL_MS",
                feed_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "KITE_RECONNECT_DELAY_MAX_SECS",
                feed_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "KITE_RECONNECT_DELAY_MULTIPLIER",
                feed_defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "KITE_MAX_RECONNECT_ATTEMPTS",
                feed_defaults.max_reconnect_attempts,
            ),
        };

        let broadcast_defaults = BroadcastSettings::default();
        let broadcast = BroadcastSettings {
            sink: std::env::var("RELAY_SINK")
                .map(|s| SinkKind::from_str_case_insensitive(&s))
                .unwrap_or_default(),
            subscriber_buffer: parse_env_usize(
                "RELAY_SUBSCRIBER_BUFFER",
                broadcast_defaults.subscriber_buffer,
            )
            .max(1),
            feed_channel_capacity: parse_env_usize(
                "RELAY_FEED_CHANNEL_CAPACITY",
                broadcast_defaults.feed_channel_capacity,
            )
            .max(1),
        };

        let server = ServerSettings {
            port: parse_env_u16("RELAY_PORT", ServerSettings::default().port),
        };

        Ok(Self {
            credentials,
            catalog,
            feed,
            broadcast,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

/// Seconds where `0` means "no limit".
fn parse_env_optional_secs(key: &str, default: Option<Duration>) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, optional_secs)
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
