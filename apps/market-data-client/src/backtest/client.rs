//! Backtest Data Client
//!
//! Replays a deterministic, time-ordered merge of every instrument's ticks
//! through the shared [`DataDispatcher`], advancing a [`TestClock`] in
//! lock-step.
//!
//! # Merge order
//!
//! Providers are merged with a k-way min-heap keyed on
//! `(timestamp, canonical symbol, position)`. Ticks with equal timestamps
//! across instruments come out in symbol order; within an instrument they
//! keep their provider order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::clock::TestClock;
use super::container::BacktestDataContainer;
use super::error::BacktestError;
use super::provider::DataProvider;
use super::wrangler::QuoteTickWrangler;
use crate::application::error::DataClientError;
use crate::application::ports::{
    BarsCallback, DataClient, InstrumentCallback, InstrumentsCallback, RequestOutcome,
    TicksCallback, VirtualClock,
};
use crate::application::services::{
    BarSource, DataDispatcher, Registration, check_range, query_limit,
};
use crate::domain::market::{Bar, BarType, Instrument, StrategyId, Symbol, Tick, Venue};
use crate::domain::subscription::HandlerRef;

// =============================================================================
// Merge
// =============================================================================

/// Head of one provider's remaining ticks.
#[derive(Debug)]
struct MergeCursor {
    timestamp: DateTime<Utc>,
    symbol: String,
    provider: usize,
    position: usize,
}

impl MergeCursor {
    fn key(&self) -> (DateTime<Utc>, &str, usize) {
        (self.timestamp, &self.symbol, self.position)
    }
}

impl PartialEq for MergeCursor {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MergeCursor {}

impl PartialOrd for MergeCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        other.key().cmp(&self.key())
    }
}

fn merge(providers: &[DataProvider]) -> Vec<Tick> {
    let cursor = |provider: usize, position: usize| {
        providers[provider]
            .ticks()
            .get(position)
            .map(|tick| MergeCursor {
                timestamp: tick.timestamp,
                symbol: providers[provider].symbol().to_string(),
                provider,
                position,
            })
    };

    let total = providers.iter().map(DataProvider::len).sum();
    let mut merged = Vec::with_capacity(total);
    let mut heap: BinaryHeap<MergeCursor> =
        (0..providers.len()).filter_map(|p| cursor(p, 0)).collect();

    while let Some(head) = heap.pop() {
        merged.push(providers[head.provider].ticks()[head.position].clone());
        if let Some(next) = cursor(head.provider, head.position + 1) {
            heap.push(next);
        }
    }
    merged
}

// =============================================================================
// Backtest Data Client
// =============================================================================

/// Data client replaying recorded data.
#[derive(Debug)]
pub struct BacktestDataClient {
    name: String,
    clock: TestClock,
    instruments: BTreeMap<Symbol, Instrument>,
    ticks: Vec<Tick>,
    dispatcher: Mutex<DataDispatcher>,
    strategies: Mutex<Vec<StrategyId>>,
    connected: AtomicBool,
    disposed: AtomicBool,
}

impl BacktestDataClient {
    /// Build the merged tick stream from `container`.
    ///
    /// # Errors
    ///
    /// Returns `MissingInstrument` or `EmptyTable` if the container fails
    /// its integrity check, and `MisalignedBars` if bid and ask bars do not
    /// pair up.
    pub fn new(container: &BacktestDataContainer, clock: TestClock) -> Result<Self, BacktestError> {
        container.check_integrity()?;

        let wrangler = QuoteTickWrangler::new();
        let providers = container
            .instruments()
            .map(|instrument| DataProvider::build(container, instrument, &wrangler))
            .collect::<Result<Vec<_>, _>>()?;
        let ticks = merge(&providers);

        let instruments: BTreeMap<Symbol, Instrument> = container
            .instruments()
            .map(|instrument| (instrument.symbol.clone(), instrument.clone()))
            .collect();

        tracing::info!(
            instruments = instruments.len(),
            ticks = ticks.len(),
            start = ?ticks.first().map(|t| t.timestamp),
            end = ?ticks.last().map(|t| t.timestamp),
            "Backtest data prepared"
        );

        Ok(Self {
            name: "BacktestDataClient".to_string(),
            clock,
            instruments,
            ticks,
            dispatcher: Mutex::new(DataDispatcher::new()),
            strategies: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// The clock driven by replay.
    #[must_use]
    pub const fn clock(&self) -> &TestClock {
        &self.clock
    }

    /// The merged tick stream.
    #[must_use]
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Time of the first replayed tick.
    #[must_use]
    pub fn min_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ticks.first().map(|tick| tick.timestamp)
    }

    /// Time of the last replayed tick.
    #[must_use]
    pub fn max_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ticks.last().map(|tick| tick.timestamp)
    }

    /// Instrument definition of `symbol`.
    #[must_use]
    pub fn instrument(&self, symbol: &Symbol) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    /// Every instrument definition, ordered by symbol.
    #[must_use]
    pub fn instruments(&self) -> Vec<Instrument> {
        self.instruments.values().cloned().collect()
    }

    /// Dispatch one tick, then fire every timer due at or before it.
    pub fn process_tick(&self, tick: &Tick) {
        let fanout = self.dispatcher.lock().route_tick(tick);
        fanout.deliver(tick);

        let due = self
            .clock
            .next_event_time()
            .is_some_and(|next| next <= tick.timestamp);
        if !self.clock.has_pending_timers() || !due {
            self.clock.set_time(tick.timestamp);
            return;
        }

        for timer in self.clock.advance_time(tick.timestamp) {
            timer.fire();
        }
    }

    /// Replay the whole merged stream. Returns the number of ticks processed.
    pub fn run(&self) -> usize {
        for tick in &self.ticks {
            self.process_tick(tick);
        }
        tracing::info!(ticks = self.ticks.len(), "Backtest replay finished");
        self.ticks.len()
    }

    fn check_open(&self) -> Result<(), DataClientError> {
        if self.disposed.load(AtomicOrdering::SeqCst) {
            Err(DataClientError::Disposed)
        } else {
            Ok(())
        }
    }

    fn register(&self, registration: Registration) -> Result<(), DataClientError> {
        self.check_open()?;
        let topic = registration.topic();
        self.dispatcher.lock().register(registration);
        tracing::debug!(channel = topic.channel.as_str(), topic = %topic.key, "Subscribed");
        Ok(())
    }

    fn deregister(&self, registration: &Registration) -> Result<(), DataClientError> {
        self.check_open()?;
        if self.dispatcher.lock().deregister(registration).is_none() {
            tracing::debug!(topic = %registration.topic().key, "Handler not subscribed");
        }
        Ok(())
    }
}

#[async_trait]
impl DataClient for BacktestDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(AtomicOrdering::SeqCst)
    }

    async fn connect(&self) -> Result<(), DataClientError> {
        self.check_open()?;
        self.connected.store(true, AtomicOrdering::SeqCst);
        tracing::info!(client = %self.name, "Connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, AtomicOrdering::SeqCst);
        tracing::info!(client = %self.name, "Disconnected");
    }

    async fn reset(&self) -> Result<(), DataClientError> {
        self.check_open()?;
        self.dispatcher.lock().reset();
        tracing::info!(client = %self.name, "Reset");
        Ok(())
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        self.connected.store(false, AtomicOrdering::SeqCst);
        self.dispatcher.lock().reset();
        tracing::info!(client = %self.name, "Disposed");
    }

    fn register_strategy(&self, strategy: StrategyId) -> Result<(), DataClientError> {
        self.check_open()?;
        let mut strategies = self.strategies.lock();
        if strategies.contains(&strategy) {
            tracing::debug!(strategy = %strategy, "Strategy already registered");
            return Ok(());
        }
        tracing::info!(strategy = %strategy, client = %self.name, "Strategy registered");
        strategies.push(strategy);
        Ok(())
    }

    fn registered_strategies(&self) -> Vec<StrategyId> {
        self.strategies.lock().clone()
    }

    async fn subscribe_ticks(
        &self,
        symbol: &Symbol,
        handler: HandlerRef<Tick>,
    ) -> Result<(), DataClientError> {
        self.register(Registration::Ticks {
            symbol: symbol.clone(),
            handler,
        })
    }

    async fn subscribe_bars(
        &self,
        bar_type: &BarType,
        handler: HandlerRef<Bar>,
    ) -> Result<(), DataClientError> {
        self.register(Registration::Bars {
            bar_type: bar_type.clone(),
            handler,
            source: BarSource::Aggregated,
        })
    }

    /// Instruments never change during a replay, so this only logs.
    async fn subscribe_instrument(
        &self,
        symbol: &Symbol,
        _handler: HandlerRef<Instrument>,
    ) -> Result<(), DataClientError> {
        self.check_open()?;
        tracing::debug!(%symbol, "Instrument subscriptions are not replayed");
        Ok(())
    }

    async fn unsubscribe_ticks(
        &self,
        symbol: &Symbol,
        handler: &HandlerRef<Tick>,
    ) -> Result<(), DataClientError> {
        self.deregister(&Registration::Ticks {
            symbol: symbol.clone(),
            handler: handler.clone(),
        })
    }

    async fn unsubscribe_bars(
        &self,
        bar_type: &BarType,
        handler: &HandlerRef<Bar>,
    ) -> Result<(), DataClientError> {
        self.deregister(&Registration::Bars {
            bar_type: bar_type.clone(),
            handler: handler.clone(),
            source: BarSource::Aggregated,
        })
    }

    async fn unsubscribe_instrument(
        &self,
        symbol: &Symbol,
        _handler: &HandlerRef<Instrument>,
    ) -> Result<(), DataClientError> {
        self.check_open()?;
        tracing::debug!(%symbol, "Instrument subscriptions are not replayed");
        Ok(())
    }

    async fn request_ticks(
        &self,
        symbol: &Symbol,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
        _callback: TicksCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        query_limit(limit)?;
        check_range(from, to)?;
        tracing::info!(%symbol, "Historical tick requests are not served during a backtest");
        Ok(RequestOutcome::Delivered { count: 0 })
    }

    async fn request_bars(
        &self,
        bar_type: &BarType,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
        _callback: BarsCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        query_limit(limit)?;
        check_range(from, to)?;
        tracing::info!(%bar_type, "Historical bar requests are not served during a backtest");
        Ok(RequestOutcome::Delivered { count: 0 })
    }

    async fn request_instrument(
        &self,
        symbol: &Symbol,
        callback: InstrumentCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        let Some(instrument) = self.instruments.get(symbol) else {
            let reason = format!("no instrument for {symbol}");
            tracing::error!(%symbol, "Request rejected: {reason}");
            return Ok(RequestOutcome::Rejected { reason });
        };
        callback(instrument.clone());
        Ok(RequestOutcome::Delivered { count: 1 })
    }

    async fn request_instruments(
        &self,
        venue: &Venue,
        callback: InstrumentsCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        let instruments: Vec<Instrument> = self
            .instruments
            .values()
            .filter(|instrument| instrument.symbol.venue() == venue)
            .cloned()
            .collect();
        let count = instruments.len();
        callback(instruments);
        Ok(RequestOutcome::Delivered { count })
    }

    async fn subscribed_ticks(&self) -> Result<Vec<Symbol>, DataClientError> {
        Ok(self.dispatcher.lock().subscribed_ticks())
    }

    async fn subscribed_bars(&self) -> Result<Vec<BarType>, DataClientError> {
        Ok(self.dispatcher.lock().subscribed_bars())
    }

    async fn subscribed_instruments(&self) -> Result<Vec<Symbol>, DataClientError> {
        Ok(Vec::new())
    }
}
