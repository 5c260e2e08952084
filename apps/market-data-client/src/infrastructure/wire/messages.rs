//! Wire Message Types
//!
//! Item encodings carried inside reply envelopes and published frames, and
//! the frames exchanged on the publish/subscribe sockets.
//!
//! Items omit their subject: a tick's symbol comes from the topic it was
//! published on or from the reply metadata.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::{Bar, BarType, Symbol, Tick};

/// Quote tick without its symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Bid price.
    pub bid: Decimal,
    /// Ask price.
    pub ask: Decimal,
    /// Bid size.
    pub bid_size: Decimal,
    /// Ask size.
    pub ask_size: Decimal,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
}

impl TickRecord {
    /// Attach a symbol.
    #[must_use]
    pub fn into_tick(self, symbol: Symbol) -> Tick {
        Tick {
            symbol,
            bid: self.bid,
            ask: self.ask,
            bid_size: self.bid_size,
            ask_size: self.ask_size,
            timestamp: self.timestamp,
        }
    }
}

impl From<&Tick> for TickRecord {
    fn from(tick: &Tick) -> Self {
        Self {
            bid: tick.bid,
            ask: tick.ask,
            bid_size: tick.bid_size,
            ask_size: tick.ask_size,
            timestamp: tick.timestamp,
        }
    }
}

/// Bar without its bar type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRecord {
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Volume.
    pub volume: Decimal,
    /// Close time.
    pub timestamp: DateTime<Utc>,
}

impl BarRecord {
    /// Attach a bar type.
    #[must_use]
    pub fn into_bar(self, bar_type: BarType) -> Bar {
        Bar {
            bar_type,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            timestamp: self.timestamp,
        }
    }
}

impl From<&Bar> for BarRecord {
    fn from(bar: &Bar) -> Self {
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            timestamp: bar.timestamp,
        }
    }
}

/// Message published on a subscriber socket (binary `MessagePack` frame).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedFrame {
    /// Canonical topic string.
    pub topic: String,
    /// Item encoded with the data or instrument codec.
    pub payload: Vec<u8>,
}

/// Subscription control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Start receiving a topic.
    Subscribe,
    /// Stop receiving a topic.
    Unsubscribe,
}

/// Control message sent on a subscriber socket (JSON text frame).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    /// Requested action.
    pub action: ControlAction,
    /// Canonical topic string.
    pub topic: String,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn control_frame_json_shape() {
        let frame = ControlFrame {
            action: ControlAction::Unsubscribe,
            topic: "EUR/USD.FXCM".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"action":"unsubscribe","topic":"EUR/USD.FXCM"}"#
        );
    }

    #[test]
    fn tick_record_reattaches_symbol() {
        let tick = Tick {
            symbol: "AUD/USD.FXCM".parse().unwrap(),
            bid: dec!(0.7001),
            ask: dec!(0.7003),
            bid_size: dec!(1000000),
            ask_size: dec!(500000),
            timestamp: Utc::now(),
        };
        let record = TickRecord::from(&tick);
        assert_eq!(record.into_tick(tick.symbol.clone()), tick);
    }
}
