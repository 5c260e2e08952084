#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Market Data Client - Live and Backtest Data Access for Strategies
//!
//! A strategy-facing data client with two interchangeable implementations
//! behind one [`DataClient`] contract: a live client talking to a remote
//! data service, and a backtest client replaying recorded data
//! deterministically against a virtual clock.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Market data types and subscription bookkeeping
//!   - `market`: symbols, bar types, ticks, bars, instruments
//!   - `subscription`: handlers, topics, handler registry
//!   - `aggregation`: tick and time bar aggregators
//!   - `cache`: parse-or-reuse cache for wire keys
//!
//! - **Application**: Contract, protocol and shared services
//!   - `ports`: data client, codec, transport and clock interfaces
//!   - `protocol`: request/response envelopes
//!   - `services`: data dispatcher, request validation
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `live`: live data client and its dispatch task
//!   - `transport`: WebSocket and in-memory channels
//!   - `wire`: JSON and `MessagePack` codecs
//!   - `config`, `health`, `metrics`, `telemetry`
//!
//! - **Backtest**: recorded data replay
//!
//! # Data Flow (live)
//!
//! ```text
//! tick/bar/instrument ──► subscriber ──► dispatch ──► DataDispatcher ──► handlers
//!   publishers            channels        queue        (+ aggregators)
//!                                           ▲
//! subscribe/unsubscribe ─── registry commands ┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market data types with no I/O dependencies.
pub mod domain;

/// Application layer - Contract, protocol and shared services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Backtest layer - Deterministic replay of recorded data.
pub mod backtest;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{
    Bar, BarSpecification, BarStructure, BarType, Instrument, ModelError, PriceType, StrategyId,
    Symbol, Tick, Venue,
};
pub use domain::subscription::{Handler, HandlerRef};

// Contract
pub use application::error::DataClientError;
pub use application::ports::{Clock, DataClient, RequestOutcome, TimeEvent, VirtualClock};

// Live client
pub use infrastructure::config::{ConfigError, LiveClientConfig};
pub use infrastructure::live::{Codecs, LiveChannels, LiveClock, LiveDataClient};

// Backtest client
pub use backtest::{BacktestDataClient, BacktestDataContainer, BacktestError, TestClock};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryGuard, init as init_telemetry};
