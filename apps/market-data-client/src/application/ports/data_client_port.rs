//! Data Client Port (Driver Port)
//!
//! The contract strategies program against. The live and backtest clients
//! both implement it, so a strategy cannot tell which one it was given.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::error::DataClientError;
use crate::domain::market::{Bar, BarType, Instrument, StrategyId, Symbol, Tick, Venue};
use crate::domain::subscription::HandlerRef;

/// Receives the ticks answering a tick request.
pub type TicksCallback = Box<dyn FnOnce(Vec<Tick>) + Send>;

/// Receives the bars answering a bar request.
pub type BarsCallback = Box<dyn FnOnce(BarType, Vec<Bar>) + Send>;

/// Receives the instrument answering an instrument request.
pub type InstrumentCallback = Box<dyn FnOnce(Instrument) + Send>;

/// Receives the instruments answering a venue instruments request.
pub type InstrumentsCallback = Box<dyn FnOnce(Vec<Instrument>) + Send>;

/// How a historical request ended, when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The callback was invoked with `count` items.
    Delivered {
        /// Number of items handed to the callback.
        count: usize,
    },
    /// The service refused the request; the callback was not invoked.
    Rejected {
        /// Reason given by the service.
        reason: String,
    },
    /// The service could not answer the query; the callback was not invoked.
    QueryFailed {
        /// Reason given by the service.
        reason: String,
    },
}

impl RequestOutcome {
    /// Whether the callback was invoked.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Market data client contract.
///
/// Subscriptions register the handler before any wire activity; unsubscribes
/// issue the wire unsubscribe before the handler is removed, and only when
/// the topic would be left without handlers.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Client name, for logs.
    fn name(&self) -> &str;

    /// Whether every channel is connected.
    fn is_connected(&self) -> bool;

    /// Connect the client.
    async fn connect(&self) -> Result<(), DataClientError>;

    /// Disconnect the client. Transport failures are logged, not returned.
    async fn disconnect(&self);

    /// Clear subscriptions, aggregators and caches.
    async fn reset(&self) -> Result<(), DataClientError>;

    /// Release every resource. Later calls fail with `Disposed`.
    async fn dispose(&self);

    /// Bind a strategy to this client. Re-binding is a logged no-op.
    fn register_strategy(&self, strategy: StrategyId) -> Result<(), DataClientError>;

    /// Strategies bound to this client, in binding order.
    fn registered_strategies(&self) -> Vec<StrategyId>;

    /// Deliver ticks for `symbol` to `handler`.
    async fn subscribe_ticks(
        &self,
        symbol: &Symbol,
        handler: HandlerRef<Tick>,
    ) -> Result<(), DataClientError>;

    /// Deliver bars of `bar_type` to `handler`.
    async fn subscribe_bars(
        &self,
        bar_type: &BarType,
        handler: HandlerRef<Bar>,
    ) -> Result<(), DataClientError>;

    /// Deliver instrument updates for `symbol` to `handler`.
    async fn subscribe_instrument(
        &self,
        symbol: &Symbol,
        handler: HandlerRef<Instrument>,
    ) -> Result<(), DataClientError>;

    /// Stop delivering ticks for `symbol` to `handler`.
    async fn unsubscribe_ticks(
        &self,
        symbol: &Symbol,
        handler: &HandlerRef<Tick>,
    ) -> Result<(), DataClientError>;

    /// Stop delivering bars of `bar_type` to `handler`.
    async fn unsubscribe_bars(
        &self,
        bar_type: &BarType,
        handler: &HandlerRef<Bar>,
    ) -> Result<(), DataClientError>;

    /// Stop delivering instrument updates for `symbol` to `handler`.
    async fn unsubscribe_instrument(
        &self,
        symbol: &Symbol,
        handler: &HandlerRef<Instrument>,
    ) -> Result<(), DataClientError>;

    /// Request historical ticks. A `limit` of zero means unlimited.
    async fn request_ticks(
        &self,
        symbol: &Symbol,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
        callback: TicksCallback,
    ) -> Result<RequestOutcome, DataClientError>;

    /// Request historical bars. A `limit` of zero means unlimited.
    async fn request_bars(
        &self,
        bar_type: &BarType,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
        callback: BarsCallback,
    ) -> Result<RequestOutcome, DataClientError>;

    /// Request one instrument definition.
    async fn request_instrument(
        &self,
        symbol: &Symbol,
        callback: InstrumentCallback,
    ) -> Result<RequestOutcome, DataClientError>;

    /// Request every instrument of a venue.
    async fn request_instruments(
        &self,
        venue: &Venue,
        callback: InstrumentsCallback,
    ) -> Result<RequestOutcome, DataClientError>;

    /// Symbols with tick handlers.
    async fn subscribed_ticks(&self) -> Result<Vec<Symbol>, DataClientError>;

    /// Bar types with bar handlers.
    async fn subscribed_bars(&self) -> Result<Vec<BarType>, DataClientError>;

    /// Symbols with instrument handlers.
    async fn subscribed_instruments(&self) -> Result<Vec<Symbol>, DataClientError>;
}
