//! Quote Tick Wrangling
//!
//! Turns tick rows and bid/ask bar rows into quote ticks.
//!
//! Each aligned bid/ask bar pair closing at `t` yields four ticks:
//!
//! | time | prices |
//! |---|---|
//! | `t - 3ms` | open |
//! | `t - 2ms` | low (up bar) or high (down bar) |
//! | `t - 1ms` | high (up bar) or low (down bar) |
//! | `t` | close |
//!
//! The bid bar decides the direction. Tick sizes are the bar volumes.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::container::{BarRow, TickRow};
use super::error::BacktestError;
use crate::domain::market::{BarStructure, Symbol, Tick};

/// Builds quote ticks for one instrument.
pub trait TickBuilder {
    /// Convert tick rows 1:1, stably sorted by timestamp.
    fn ticks_from_rows(&self, symbol: &Symbol, rows: &[TickRow]) -> Vec<Tick>;

    /// Synthesize ticks from aligned bid and ask bars.
    ///
    /// # Errors
    ///
    /// Returns `MisalignedBars` if the tables differ in length or a row's
    /// timestamps disagree.
    fn ticks_from_bars(
        &self,
        symbol: &Symbol,
        structure: BarStructure,
        bid: &[BarRow],
        ask: &[BarRow],
    ) -> Result<Vec<Tick>, BacktestError>;
}

/// Default [`TickBuilder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct QuoteTickWrangler;

impl QuoteTickWrangler {
    /// Create a wrangler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Clone, Copy)]
enum Point {
    Open,
    High,
    Low,
    Close,
}

impl Point {
    const fn of(self, bar: &BarRow) -> Decimal {
        match self {
            Self::Open => bar.open,
            Self::High => bar.high,
            Self::Low => bar.low,
            Self::Close => bar.close,
        }
    }
}

fn quote(
    symbol: &Symbol,
    bid: &BarRow,
    ask: &BarRow,
    point: Point,
    timestamp: DateTime<Utc>,
) -> Tick {
    Tick {
        symbol: symbol.clone(),
        bid: point.of(bid),
        ask: point.of(ask),
        bid_size: bid.volume,
        ask_size: ask.volume,
        timestamp,
    }
}

impl TickBuilder for QuoteTickWrangler {
    fn ticks_from_rows(&self, symbol: &Symbol, rows: &[TickRow]) -> Vec<Tick> {
        let mut ticks: Vec<Tick> = rows
            .iter()
            .map(|row| Tick {
                symbol: symbol.clone(),
                bid: row.bid,
                ask: row.ask,
                bid_size: row.bid_size,
                ask_size: row.ask_size,
                timestamp: row.timestamp,
            })
            .collect();
        ticks.sort_by_key(|tick| tick.timestamp);
        ticks
    }

    fn ticks_from_bars(
        &self,
        symbol: &Symbol,
        structure: BarStructure,
        bid: &[BarRow],
        ask: &[BarRow],
    ) -> Result<Vec<Tick>, BacktestError> {
        let misaligned = |row| BacktestError::MisalignedBars {
            symbol: symbol.to_string(),
            structure: structure.as_str(),
            row,
        };
        if bid.len() != ask.len() {
            return Err(misaligned(bid.len().min(ask.len())));
        }

        let mut ticks = Vec::with_capacity(bid.len() * 4);
        for (row, (bid, ask)) in bid.iter().zip(ask).enumerate() {
            if bid.timestamp != ask.timestamp {
                return Err(misaligned(row));
            }

            let (first, second) = if bid.is_up() {
                (Point::Low, Point::High)
            } else {
                (Point::High, Point::Low)
            };
            let close = bid.timestamp;
            ticks.push(quote(symbol, bid, ask, Point::Open, close - Duration::milliseconds(3)));
            ticks.push(quote(symbol, bid, ask, first, close - Duration::milliseconds(2)));
            ticks.push(quote(symbol, bid, ask, second, close - Duration::milliseconds(1)));
            ticks.push(quote(symbol, bid, ask, Point::Close, close));
        }

        ticks.sort_by_key(|tick| tick.timestamp);
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::super::container::fixtures::{at_secs, bar_row, tick_row};
    use super::*;

    fn symbol() -> Symbol {
        "EUR/USD.FXCM".parse().unwrap()
    }

    #[test]
    fn rows_sort_stably() {
        let rows = vec![
            tick_row(2, dec!(1.3)),
            tick_row(1, dec!(1.1)),
            tick_row(1, dec!(1.2)),
        ];
        let ticks = QuoteTickWrangler::new().ticks_from_rows(&symbol(), &rows);

        let bids: Vec<Decimal> = ticks.iter().map(|t| t.bid).collect();
        assert_eq!(bids, vec![dec!(1.1), dec!(1.2), dec!(1.3)]);
    }

    #[test]
    fn up_bar_visits_low_first() {
        let bid = [bar_row(60, dec!(1.0), dec!(1.5), dec!(0.5), dec!(1.2))];
        let ask = [bar_row(60, dec!(1.1), dec!(1.6), dec!(0.6), dec!(1.3))];
        let ticks = QuoteTickWrangler::new()
            .ticks_from_bars(&symbol(), BarStructure::Minute, &bid, &ask)
            .unwrap();

        let bids: Vec<Decimal> = ticks.iter().map(|t| t.bid).collect();
        assert_eq!(bids, vec![dec!(1.0), dec!(0.5), dec!(1.5), dec!(1.2)]);
        assert_eq!(ticks[0].timestamp, at_secs(60) - Duration::milliseconds(3));
        assert_eq!(ticks[3].timestamp, at_secs(60));
        assert_eq!(ticks[1].ask, dec!(0.6));
        assert_eq!(ticks[2].bid_size, dec!(100));
    }

    #[test]
    fn down_bar_visits_high_first() {
        let bid = [bar_row(60, dec!(1.2), dec!(1.5), dec!(0.5), dec!(1.0))];
        let ask = [bar_row(60, dec!(1.3), dec!(1.6), dec!(0.6), dec!(1.1))];
        let ticks = QuoteTickWrangler::new()
            .ticks_from_bars(&symbol(), BarStructure::Minute, &bid, &ask)
            .unwrap();

        let bids: Vec<Decimal> = ticks.iter().map(|t| t.bid).collect();
        assert_eq!(bids, vec![dec!(1.2), dec!(1.5), dec!(0.5), dec!(1.0)]);
    }

    #[test]
    fn misaligned_bars_fail() {
        let bid = [bar_row(60, dec!(1), dec!(1), dec!(1), dec!(1))];
        let ask = [bar_row(120, dec!(1), dec!(1), dec!(1), dec!(1))];
        let err = QuoteTickWrangler::new()
            .ticks_from_bars(&symbol(), BarStructure::Minute, &bid, &ask)
            .unwrap_err();

        assert!(matches!(err, BacktestError::MisalignedBars { row: 0, .. }));
    }
}
