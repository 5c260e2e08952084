//! Backtest errors.

/// Errors raised while assembling backtest data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BacktestError {
    /// A data table references a symbol with no instrument definition.
    #[error("No instrument for {symbol} referenced by {table} data")]
    MissingInstrument {
        /// Canonical symbol of the table.
        symbol: String,
        /// Table kind.
        table: &'static str,
    },

    /// Bid and ask bars do not pair up by timestamp.
    #[error("Bid and ask {structure} bars for {symbol} are misaligned at row {row}")]
    MisalignedBars {
        /// Canonical symbol of the bars.
        symbol: String,
        /// Bar structure of the tables.
        structure: &'static str,
        /// First row that does not pair up.
        row: usize,
    },

    /// A data table was registered without rows.
    #[error("{table} table for {symbol} is empty")]
    EmptyTable {
        /// Canonical symbol of the table.
        symbol: String,
        /// Table kind.
        table: String,
    },

    /// A repeating timer was given a non-positive interval.
    #[error("Timer {0} needs a positive interval")]
    InvalidTimer(String),
}
