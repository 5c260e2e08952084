//! Market Data Records
//!
//! Quote ticks, bars and instrument definitions delivered to strategies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identifiers::{BarType, PriceType, Symbol};

/// A single timestamped bid/ask quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument quoted.
    pub symbol: Symbol,
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Size available at the bid.
    pub bid_size: Decimal,
    /// Size available at the ask.
    pub ask_size: Decimal,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    /// Price of the requested side.
    #[must_use]
    pub fn price(&self, price_type: PriceType) -> Decimal {
        match price_type {
            PriceType::Bid => self.bid,
            PriceType::Ask => self.ask,
            PriceType::Mid | PriceType::Last => (self.bid + self.ask) / Decimal::TWO,
        }
    }

    /// Size of the requested side.
    #[must_use]
    pub fn size(&self, price_type: PriceType) -> Decimal {
        match price_type {
            PriceType::Bid => self.bid_size,
            PriceType::Ask => self.ask_size,
            PriceType::Mid | PriceType::Last => self.bid_size + self.ask_size,
        }
    }
}

/// OHLCV summary over a time window or a fixed tick count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// What the bar aggregates.
    pub bar_type: BarType,
    /// First price in the window.
    pub open: Decimal,
    /// Highest price in the window.
    pub high: Decimal,
    /// Lowest price in the window.
    pub low: Decimal,
    /// Last price in the window.
    pub close: Decimal,
    /// Aggregated size.
    pub volume: Decimal,
    /// Close time of the window.
    pub timestamp: DateTime<Utc>,
}

/// Static definition of a tradeable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Venue-qualified symbol.
    pub symbol: Symbol,
    /// Currency prices are quoted in.
    pub quote_currency: String,
    /// Decimal places of prices.
    pub price_precision: u8,
    /// Decimal places of sizes.
    pub size_precision: u8,
    /// Minimum price increment.
    pub tick_size: Decimal,
    /// Standard trading lot.
    pub lot_size: Decimal,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn tick() -> Tick {
        Tick {
            symbol: "EUR/USD.FXCM".parse().unwrap(),
            bid: dec!(1.10000),
            ask: dec!(1.10010),
            bid_size: dec!(2),
            ask_size: dec!(3),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn tick_price_by_side() {
        let tick = tick();
        assert_eq!(tick.price(PriceType::Bid), dec!(1.10000));
        assert_eq!(tick.price(PriceType::Ask), dec!(1.10010));
        assert_eq!(tick.price(PriceType::Mid), dec!(1.10005));
    }

    #[test]
    fn tick_size_by_side() {
        let tick = tick();
        assert_eq!(tick.size(PriceType::Bid), dec!(2));
        assert_eq!(tick.size(PriceType::Mid), dec!(5));
    }
}
