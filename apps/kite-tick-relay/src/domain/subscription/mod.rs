//! Subscription Selection
//!
//! Derives the bounded working set of instruments the relay subscribes to.
//!
//! # Design
//!
//! The selector:
//! - Sorts the filtered catalog by symbol with a locale-aware comparison
//! - Drops repeated tokens (first occurrence in sorted order wins)
//! - Truncates to the configured limit
//!
//! The result is packaged into an immutable `RelayContext` that is shared
//! by the feed connector (which tokens to subscribe) and the tick pipeline
//! (which symbol each token maps to).

mod collation;

use std::collections::{HashMap, HashSet};

pub use collation::locale_cmp;

use super::instrument::{InstrumentRecord, InstrumentToken};

/// Symbol reported for tokens missing from the `SymbolIndex`.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Default selection limit.
pub const DEFAULT_SUBSCRIPTION_LIMIT: usize = 200;

// =============================================================================
// Subscription Set
// =============================================================================

/// Ordered, duplicate-free list of tokens to subscribe to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    tokens: Vec<InstrumentToken>,
}

impl SubscriptionSet {
    /// Tokens in selection order.
    #[must_use]
    pub fn tokens(&self) -> &[InstrumentToken] {
        &self.tokens
    }

    /// Number of selected tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check whether nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check whether a token is part of the set.
    #[must_use]
    pub fn contains(&self, token: InstrumentToken) -> bool {
        self.tokens.contains(&token)
    }
}

// =============================================================================
// Symbol Index
// =============================================================================

/// Reverse lookup from instrument token to display symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolIndex {
    symbols: HashMap<InstrumentToken, String>,
}

impl SymbolIndex {
    /// Resolve a token, falling back to [`UNKNOWN_SYMBOL`].
    #[must_use]
    pub fn resolve(&self, token: InstrumentToken) -> &str {
        self.get(token).unwrap_or(UNKNOWN_SYMBOL)
    }

    /// Look up a token without a fallback.
    #[must_use]
    pub fn get(&self, token: InstrumentToken) -> Option<&str> {
        self.symbols.get(&token).map(String::as_str)
    }

    /// Number of indexed tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl FromIterator<(InstrumentToken, String)> for SymbolIndex {
    fn from_iter<I: IntoIterator<Item = (InstrumentToken, String)>>(iter: I) -> Self {
        Self {
            symbols: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Selector
// =============================================================================

/// Output of the selector: what to subscribe to and how to name it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Tokens to subscribe to, in symbol order.
    pub subscription: SubscriptionSet,
    /// Token to symbol lookup for the selected tokens.
    pub symbols: SymbolIndex,
}

/// Select the first `limit` instruments by symbol.
///
/// The sort is stable, so records with equal symbols keep catalog order.
/// If fewer than `limit` records are supplied, all of them are selected.
#[must_use]
pub fn select_top_n(
    records: impl IntoIterator<Item = InstrumentRecord>,
    limit: usize,
) -> Selection {
    let mut ranked: Vec<InstrumentRecord> = records.into_iter().collect();
    ranked.sort_by(|a, b| locale_cmp(&a.symbol, &b.symbol));

    let mut seen = HashSet::with_capacity(limit.min(ranked.len()));
    let mut tokens = Vec::with_capacity(limit.min(ranked.len()));
    let mut symbols = HashMap::with_capacity(limit.min(ranked.len()));

    for record in ranked {
        if tokens.len() == limit {
            break;
        }
        if !seen.insert(record.token) {
            tracing::debug!(token = record.token, symbol = %record.symbol, "Skipping repeated token");
            continue;
        }
        tokens.push(record.token);
        symbols.insert(record.token, record.symbol);
    }

    Selection {
        subscription: SubscriptionSet { tokens },
        symbols: SymbolIndex { symbols },
    }
}

// =============================================================================
// Relay Context
// =============================================================================

/// Immutable selection shared by the feed connector and the tick pipeline.
#[derive(Debug, Clone, Default)]
pub struct RelayContext {
    subscription: SubscriptionSet,
    symbols: SymbolIndex,
}

impl RelayContext {
    /// Build the context from a selection.
    #[must_use]
    pub fn new(selection: Selection) -> Self {
        Self {
            subscription: selection.subscription,
            symbols: selection.symbols,
        }
    }

    /// Tokens to subscribe to.
    #[must_use]
    pub const fn subscription(&self) -> &SubscriptionSet {
        &self.subscription
    }

    /// Token to symbol lookup.
    #[must_use]
    pub const fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }
}

impl From<Selection> for RelayContext {
    fn from(selection: Selection) -> Self {
        Self::new(selection)
    }
}

// =============================================================================
// Tests
// =============================================================================
