//! Kite Ticker Requests
//!
//! Outbound control messages. Every request is a JSON object with an action
//! `a` and a value `v`:
//!
//! ```json
//! {"a":"subscribe","v":[408065,884737]}
//! {"a":"mode","v":["full",[408065,884737]]}
//! ```

use serde::Serialize;

use crate::domain::instrument::InstrumentToken;
use crate::domain::tick::TickMode;

/// Request action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Start streaming the tokens.
    Subscribe,
    /// Change the packet mode of the tokens.
    Mode,
}

/// Request value: a token list, or a `[mode, tokens]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestValue {
    /// Plain token list.
    Tokens(Vec<InstrumentToken>),
    /// Mode plus token list.
    Mode(TickMode, Vec<InstrumentToken>),
}

/// A ticker control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerRequest {
    /// Action.
    #[serde(rename = "a")]
    pub action: Action,
    /// Value.
    #[serde(rename = "v")]
    pub value: RequestValue,
}

impl TickerRequest {
    /// Subscribe to tokens.
    #[must_use]
    pub fn subscribe(tokens: &[InstrumentToken]) -> Self {
        Self {
            action: Action::Subscribe,
            value: RequestValue::Tokens(tokens.to_vec()),
        }
    }

    /// Set the packet mode for tokens.
    #[must_use]
    pub fn mode(mode: TickMode, tokens: &[InstrumentToken]) -> Self {
        Self {
            action: Action::Mode,
            value: RequestValue::Mode(mode, tokens.to_vec()),
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
