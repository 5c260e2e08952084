//! Market Data Types
//!
//! Identifiers and records shared by the live and backtest data clients.

mod data;
mod identifiers;

pub use data::{Bar, Instrument, Tick};
pub use identifiers::{
    BarSpecification, BarStructure, BarType, MAX_BAR_INTERVAL_DAYS, PriceType, StrategyId,
    Symbol, Venue,
};

/// Errors raised while constructing or parsing market identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A required identifier component was empty.
    #[error("{0} cannot be empty")]
    EmptyIdentifier(&'static str),

    /// Text did not match the canonical form.
    #[error("invalid {kind}: {value:?}")]
    InvalidIdentifier {
        /// Identifier kind being parsed.
        kind: &'static str,
        /// Offending text.
        value: String,
    },

    /// Bar specifications need a positive step.
    #[error("bar step must be greater than zero")]
    ZeroBarStep,

    /// A time bar spans more than the supported interval.
    #[error("bar of {step} x {unit}s exceeds the longest supported interval")]
    BarIntervalTooLong {
        /// Units per bar.
        step: u32,
        /// Unit length in seconds.
        unit: i64,
    },
}
