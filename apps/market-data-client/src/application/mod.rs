//! Application Layer - Data client contract, protocol and shared services.
//!
//! This layer defines the ports the live and backtest clients implement or
//! depend on, the codec-agnostic wire protocol, and the dispatcher both
//! clients compose.

/// Data client errors.
pub mod error;

/// Port interfaces (data client, codecs, transport, clocks).
pub mod ports;

/// Request/response envelopes for the data service.
pub mod protocol;

/// Dispatch and request validation shared by both clients.
pub mod services;
