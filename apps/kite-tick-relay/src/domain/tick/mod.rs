//! Tick Types and Enrichment
//!
//! `TickRecord` is the decoded upstream packet; `EnrichedTick` is what
//! downstream consumers receive. Both are ephemeral: a batch is enriched
//! and handed to the sink in one step, then dropped.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::InstrumentToken;
use super::subscription::SymbolIndex;

// =============================================================================
// Inbound Tick
// =============================================================================

/// Detail level of an upstream tick packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickMode {
    /// Last traded price only.
    Ltp,
    /// Quote without depth.
    Quote,
    /// Full packet (quote + timestamps + open interest).
    Full,
}

/// Open/high/low/close of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ohlc {
    /// Session open.
    pub open: Decimal,
    /// Session high.
    pub high: Decimal,
    /// Session low.
    pub low: Decimal,
    /// Previous close.
    pub close: Decimal,
}

/// One decoded upstream tick.
///
/// Fields that a packet's mode does not carry are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Instrument token.
    pub token: InstrumentToken,
    /// Packet detail level.
    pub mode: TickMode,
    /// False for index packets.
    pub tradable: bool,
    /// Last traded price.
    pub last_price: Decimal,
    /// Last traded quantity.
    pub last_traded_quantity: Option<u64>,
    /// Volume-weighted average traded price.
    pub average_traded_price: Option<Decimal>,
    /// Volume traded today.
    pub volume: Option<u64>,
    /// Total pending buy quantity.
    pub total_buy_quantity: Option<u64>,
    /// Total pending sell quantity.
    pub total_sell_quantity: Option<u64>,
    /// Session OHLC.
    pub ohlc: Option<Ohlc>,
    /// Percentage change of last price against previous close.
    pub change: Decimal,
    /// Time of the last trade.
    pub last_trade_time: Option<DateTime<Utc>>,
    /// Open interest.
    pub oi: Option<u64>,
    /// Day high of open interest.
    pub oi_day_high: Option<u64>,
    /// Day low of open interest.
    pub oi_day_low: Option<u64>,
    /// Exchange timestamp of the packet.
    pub exchange_timestamp: Option<DateTime<Utc>>,
}

impl TickRecord {
    /// Create a last-price-only tick.
    #[must_use]
    pub const fn ltp(token: InstrumentToken, last_price: Decimal) -> Self {
        Self {
            token,
            mode: TickMode::Ltp,
            tradable: true,
            last_price,
            last_traded_quantity: None,
            average_traded_price: None,
            volume: None,
            total_buy_quantity: None,
            total_sell_quantity: None,
            ohlc: None,
            change: Decimal::ZERO,
            last_trade_time: None,
            oi: None,
            oi_day_high: None,
            oi_day_low: None,
            exchange_timestamp: None,
        }
    }
}

/// Percentage change of `last_price` against `close`, zero when there is no close.
#[must_use]
pub fn percent_change(last_price: Decimal, close: Decimal) -> Decimal {
    if close.is_zero() {
        return Decimal::ZERO;
    }
    ((last_price - close) * Decimal::ONE_HUNDRED / close).round_dp(6)
}

// =============================================================================
// Outbound Tick
// =============================================================================

/// Tick as published downstream.
///
/// # Wire Format (JSON)
/// ```json
/// {"token":101,"symbol":"ZETA","lastPrice":50.0,"volume":10,"change":1.0,"timestamp":"2024-01-02T09:15:00Z"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTick {
    /// Instrument token.
    pub token: InstrumentToken,
    /// Trading symbol, or `UNKNOWN`.
    pub symbol: String,
    /// Last traded price.
    #[serde(with = "rust_decimal::serde::float")]
    pub last_price: Decimal,
    /// Volume traded today.
    pub volume: Option<u64>,
    /// Percentage change against previous close.
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
    /// Exchange timestamp.
    pub timestamp: Option<DateTime<Utc>>,
}

impl EnrichedTick {
    /// Enrich a single tick with its symbol.
    #[must_use]
    pub fn from_record(record: &TickRecord, symbols: &SymbolIndex) -> Self {
        Self {
            token: record.token,
            symbol: symbols.resolve(record.token).to_string(),
            last_price: record.last_price,
            volume: record.volume,
            change: record.change,
            timestamp: record.exchange_timestamp,
        }
    }
}

/// Enrich a raw batch, preserving length and order.
#[must_use]
pub fn enrich_batch(batch: &[TickRecord], symbols: &SymbolIndex) -> Vec<EnrichedTick> {
    batch
        .iter()
        .map(|record| EnrichedTick::from_record(record, symbols))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn index() -> SymbolIndex {
        [(101, "ZETA".to_string()), (102, "ALPHA".to_string())]
            .into_iter()
            .collect()
    }

    fn full_tick(token: InstrumentToken) -> TickRecord {
        TickRecord {
            mode: TickMode::Full,
            volume: Some(10),
            change: Decimal::ONE,
            exchange_timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 15, 0).unwrap()),
            ..TickRecord::ltp(token, Decimal::from(50))
        }
    }

    #[test]
    fn enriches_known_token() {
        let raw = full_tick(101);
        let enriched = EnrichedTick::from_record(&raw, &index());

        assert_eq!(enriched.token, 101);
        assert_eq!(enriched.symbol, "ZETA");
        assert_eq!(enriched.last_price, Decimal::from(50));
        assert_eq!(enriched.volume, Some(10));
        assert_eq!(enriched.change, Decimal::ONE);
        assert_eq!(enriched.timestamp, raw.exchange_timestamp);
    }

    #[test]
    fn unknown_token_gets_sentinel() {
        let enriched = EnrichedTick::from_record(&full_tick(999), &index());
        assert_eq!(enriched.symbol, "UNKNOWN");
    }

    #[test]
    fn batch_preserves_length_and_order() {
        let raw = vec![full_tick(102), full_tick(999), full_tick(101), full_tick(102)];
        let enriched = enrich_batch(&raw, &index());

        assert_eq!(enriched.len(), raw.len());
        let tokens: Vec<_> = enriched.iter().map(|t| t.token).collect();
        assert_eq!(tokens, vec![102, 999, 101, 102]);
        let symbols: Vec<_> = enriched.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ALPHA", "UNKNOWN", "ZETA", "ALPHA"]);
    }

    #[test]
    fn empty_batch() {
        assert!(enrich_batch(&[], &index()).is_empty());
    }

    #[test]
    fn serializes_with_downstream_field_names() {
        let enriched = EnrichedTick::from_record(&full_tick(101), &index());
        let json = serde_json::to_value(&enriched).unwrap();

        assert_eq!(json["token"], 101);
        assert_eq!(json["symbol"], "ZETA");
        assert_eq!(json["lastPrice"], 50.0);
        assert_eq!(json["volume"], 10);
        assert_eq!(json["change"], 1.0);
        assert_eq!(json["timestamp"], "2024-01-02T09:15:00Z");
    }

    #[test]
    fn missing_fields_serialize_as_null() {
        let enriched = EnrichedTick::from_record(&TickRecord::ltp(101, Decimal::ONE), &index());
        let json = serde_json::to_value(&enriched).unwrap();
        assert!(json["volume"].is_null());
        assert!(json["timestamp"].is_null());
    }

    #[test]
    fn percent_change_against_close() {
        let change = percent_change(Decimal::new(10_500, 2), Decimal::from(100));
        assert_eq!(change, Decimal::from(5));
        assert_eq!(percent_change(Decimal::ONE, Decimal::ZERO), Decimal::ZERO);
    }
}
