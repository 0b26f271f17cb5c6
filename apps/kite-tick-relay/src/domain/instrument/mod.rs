//! Instrument Catalog Types
//!
//! One `InstrumentRecord` per catalog row that survived the market and
//! instrument-type filter. Records are immutable and only live until the
//! subscription selector has produced its `SymbolIndex`.

use serde::{Deserialize, Serialize};

/// Opaque integer key naming a tradable instrument on the upstream feed.
pub type InstrumentToken = u32;

/// A catalog row reduced to the fields the relay needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    /// Upstream instrument token.
    pub token: InstrumentToken,
    /// Human-readable trading symbol.
    pub symbol: String,
    /// Market (exchange) the instrument trades on, e.g. `NSE`.
    pub market: String,
    /// Instrument type, e.g. `EQ`.
    pub instrument_type: String,
}

impl InstrumentRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(
        token: InstrumentToken,
        symbol: impl Into<String>,
        market: impl Into<String>,
        instrument_type: impl Into<String>,
    ) -> Self {
        Self {
            token,
            symbol: symbol.into(),
            market: market.into(),
            instrument_type: instrument_type.into(),
        }
    }
}

/// Market + instrument-type predicate applied to catalog rows.
///
/// Matching is exact and case-sensitive, the same way the catalog spells
/// its values (`NSE`, `EQ`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentFilter {
    market: String,
    instrument_type: String,
}

impl Default for InstrumentFilter {
    fn default() -> Self {
        Self::new("NSE", "EQ")
    }
}

impl InstrumentFilter {
    /// Create a filter for the given market and instrument type.
    #[must_use]
    pub fn new(market: impl Into<String>, instrument_type: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            instrument_type: instrument_type.into(),
        }
    }

    /// Market this filter accepts.
    #[must_use]
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Instrument type this filter accepts.
    #[must_use]
    pub fn instrument_type(&self) -> &str {
        &self.instrument_type
    }

    /// Check raw column values against the filter.
    #[must_use]
    pub fn matches(&self, market: &str, instrument_type: &str) -> bool {
        market == self.market && instrument_type == self.instrument_type
    }

    /// Check a parsed record against the filter.
    #[must_use]
    pub fn accepts(&self, record: &InstrumentRecord) -> bool {
        self.matches(&record.market, &record.instrument_type)
    }
}
