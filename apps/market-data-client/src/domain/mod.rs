//! Domain Layer - Market data types and subscription bookkeeping.
//!
//! This layer contains the value types delivered to strategies and the
//! in-memory structures that route them, with no I/O dependencies.

/// Bar aggregation from quote ticks.
pub mod aggregation;

/// Parse-or-reuse cache for wire keys.
pub mod cache;

/// Identifiers, ticks, bars and instruments.
pub mod market;

/// Handlers, topics and the handler registry.
pub mod subscription;
