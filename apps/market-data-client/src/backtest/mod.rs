//! Backtest Data
//!
//! Deterministic replay of recorded market data behind the same
//! [`DataClient`](crate::application::ports::DataClient) contract as the live
//! client.
//!
//! - **Container**: raw instrument, tick and bar tables
//! - **Wrangler**: quote ticks from tick rows and bid/ask bars
//! - **Provider**: one instrument's ascending tick sequence
//! - **Clock**: virtual time with alerts and repeating timers
//! - **Client**: k-way merge of all providers, replayed tick by tick
//!
//! # Example
//!
//! ```ignore
//! use market_data_client::backtest::{BacktestDataClient, BacktestDataContainer, TestClock};
//!
//! let client = BacktestDataClient::new(&container, TestClock::new(start))?;
//! client.subscribe_ticks(&symbol, handler).await?;
//! let processed = client.run();
//! ```

mod client;
mod clock;
mod container;
mod error;
mod provider;
mod wrangler;

pub use client::BacktestDataClient;
pub use clock::TestClock;
pub use container::{BacktestDataContainer, BarRow, QuoteSide, TickRow};
pub use error::BacktestError;
pub use provider::DataProvider;
pub use wrangler::{QuoteTickWrangler, TickBuilder};
