//! Data Provider
//!
//! One instrument's replayable tick sequence, built from its tick table and
//! its finest available bid/ask bars.

use chrono::{DateTime, Utc};

use super::container::{BacktestDataContainer, QuoteSide};
use super::error::BacktestError;
use super::wrangler::TickBuilder;
use crate::domain::market::{BarStructure, Instrument, Symbol, Tick};

/// Bar structures tried for tick synthesis, finest first.
const BAR_GRANULARITY: [BarStructure; 3] =
    [BarStructure::Second, BarStructure::Minute, BarStructure::Hour];

/// Ascending tick sequence for one instrument.
#[derive(Debug, Clone)]
pub struct DataProvider {
    instrument: Instrument,
    ticks: Vec<Tick>,
}

impl DataProvider {
    /// Build the provider for `instrument` from the container's tables.
    ///
    /// # Errors
    ///
    /// Returns `MisalignedBars` if the chosen bid and ask bars do not pair
    /// up.
    pub fn build(
        container: &BacktestDataContainer,
        instrument: &Instrument,
        builder: &dyn TickBuilder,
    ) -> Result<Self, BacktestError> {
        let symbol = &instrument.symbol;
        let mut ticks = container
            .ticks(symbol)
            .map(|rows| builder.ticks_from_rows(symbol, rows))
            .unwrap_or_default();

        let finest = BAR_GRANULARITY.into_iter().find_map(|structure| {
            let bid = container.bars(symbol, structure, QuoteSide::Bid)?;
            let ask = container.bars(symbol, structure, QuoteSide::Ask)?;
            Some((structure, bid, ask))
        });
        if let Some((structure, bid, ask)) = finest {
            tracing::debug!(
                %symbol,
                structure = structure.as_str(),
                bars = bid.len(),
                "Synthesizing ticks from bars"
            );
            ticks.extend(builder.ticks_from_bars(symbol, structure, bid, ask)?);
            ticks.sort_by_key(|tick| tick.timestamp);
        }

        Ok(Self {
            instrument: instrument.clone(),
            ticks,
        })
    }

    /// The instrument.
    #[must_use]
    pub const fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// The instrument's symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.instrument.symbol
    }

    /// Ticks in ascending time order.
    #[must_use]
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Number of ticks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Whether the provider has no ticks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Time of the first tick.
    #[must_use]
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ticks.first().map(|tick| tick.timestamp)
    }

    /// Time of the last tick.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ticks.last().map(|tick| tick.timestamp)
    }
}
