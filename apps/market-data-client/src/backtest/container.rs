//! Backtest Data Container
//!
//! Raw per-instrument inputs for a backtest: instrument definitions, quote
//! tick rows, and bid/ask bar rows keyed by bar structure.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::BacktestError;
use crate::domain::market::{BarStructure, Instrument, Symbol};

/// One row of a quote tick table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRow {
    /// Quote time.
    pub timestamp: DateTime<Utc>,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Size at the bid.
    pub bid_size: Decimal,
    /// Size at the ask.
    pub ask_size: Decimal,
}

/// One row of a bar table. `timestamp` is the bar close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarRow {
    /// Bar close time.
    pub timestamp: DateTime<Utc>,
    /// First price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Last price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
}

impl BarRow {
    /// Whether the bar closed at or above its open.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// Side of the book a bar table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuoteSide {
    /// Bid bars.
    Bid,
    /// Ask bars.
    Ask,
}

impl QuoteSide {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }
}

type BarTables = BTreeMap<(Symbol, BarStructure, QuoteSide), Vec<BarRow>>;

/// Everything a backtest data client is built from.
#[derive(Debug, Clone, Default)]
pub struct BacktestDataContainer {
    instruments: BTreeMap<Symbol, Instrument>,
    ticks: BTreeMap<Symbol, Vec<TickRow>>,
    bars: BarTables,
}

impl BacktestDataContainer {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an instrument definition.
    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.symbol.clone(), instrument);
    }

    /// Add or replace the tick table of `symbol`.
    pub fn add_ticks(&mut self, symbol: Symbol, rows: Vec<TickRow>) {
        self.ticks.insert(symbol, rows);
    }

    /// Add or replace one side's bar table for `symbol` at `structure`.
    pub fn add_bars(
        &mut self,
        symbol: Symbol,
        structure: BarStructure,
        side: QuoteSide,
        rows: Vec<BarRow>,
    ) {
        self.bars.insert((symbol, structure, side), rows);
    }

    /// Instrument definitions, ordered by symbol.
    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    /// Instrument definition of `symbol`.
    #[must_use]
    pub fn instrument(&self, symbol: &Symbol) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    /// Tick table of `symbol`.
    #[must_use]
    pub fn ticks(&self, symbol: &Symbol) -> Option<&[TickRow]> {
        self.ticks.get(symbol).map(Vec::as_slice)
    }

    /// One side's bar table of `symbol` at `structure`.
    #[must_use]
    pub fn bars(
        &self,
        symbol: &Symbol,
        structure: BarStructure,
        side: QuoteSide,
    ) -> Option<&[BarRow]> {
        self.bars
            .get(&(symbol.clone(), structure, side))
            .map(Vec::as_slice)
    }

    /// Symbols referenced by any data table.
    #[must_use]
    pub fn data_symbols(&self) -> BTreeSet<&Symbol> {
        self.ticks
            .keys()
            .chain(self.bars.keys().map(|(symbol, _, _)| symbol))
            .collect()
    }

    /// Check that every table has rows and names a known instrument.
    ///
    /// # Errors
    ///
    /// Returns `MissingInstrument` for a table without an instrument
    /// definition and `EmptyTable` for a table without rows.
    pub fn check_integrity(&self) -> Result<(), BacktestError> {
        for (symbol, rows) in &self.ticks {
            self.check_table(symbol, "tick", rows.is_empty(), || "tick".to_string())?;
        }
        for ((symbol, structure, side), rows) in &self.bars {
            self.check_table(symbol, "bar", rows.is_empty(), || {
                format!("{} {} bar", side.as_str(), structure.as_str())
            })?;
        }
        Ok(())
    }

    fn check_table(
        &self,
        symbol: &Symbol,
        kind: &'static str,
        empty: bool,
        describe: impl FnOnce() -> String,
    ) -> Result<(), BacktestError> {
        if !self.instruments.contains_key(symbol) {
            return Err(BacktestError::MissingInstrument {
                symbol: symbol.to_string(),
                table: kind,
            });
        }
        if empty {
            return Err(BacktestError::EmptyTable {
                symbol: symbol.to_string(),
                table: describe(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    pub fn at_secs(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_577_836_800 + secs, 0).unwrap()
    }

    pub fn instrument(symbol: &str) -> Instrument {
        Instrument {
            symbol: symbol.parse().unwrap(),
            quote_currency: "USD".to_string(),
            price_precision: 5,
            size_precision: 0,
            tick_size: dec!(0.00001),
            lot_size: dec!(1000),
        }
    }

    pub fn tick_row(secs: i64, bid: Decimal) -> TickRow {
        TickRow {
            timestamp: at_secs(secs),
            bid,
            ask: bid + dec!(0.0002),
            bid_size: dec!(1),
            ask_size: dec!(1),
        }
    }

    pub fn bar_row(
        secs: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> BarRow {
        BarRow {
            timestamp: at_secs(secs),
            open,
            high,
            low,
            close,
            volume: dec!(100),
        }
    }
}
