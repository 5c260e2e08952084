//! Live Data Client
//!
//! Implements [`DataClient`] against a remote data service reached over six
//! channels: a request/reply and a publish/subscribe channel for each of
//! ticks, bars and instruments.
//!
//! # Ordering
//!
//! Handler registration is a command on the dispatch queue, sent before the
//! wire subscribe. Unsubscribing probes the registry, issues the wire
//! unsubscribe if the topic would go idle, then sends the deregistration.
//! The subscription mutex makes each sequence atomic with respect to other
//! callers.
//!
//! Request/reply exchanges are serialized per channel, and every reply's
//! correlation id is checked against the request id.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::clock::LiveClock;
use super::dispatch_loop::{DispatchLoop, DispatchMessage, QueueSink, SubscriptionSnapshot};
use crate::application::error::DataClientError;
use crate::application::ports::{
    BarsCallback, Clock, DataClient, DataSerializer, InstrumentCallback, InstrumentSerializer,
    InstrumentsCallback, RequestChannel, RequestOutcome, RequestSerializer, ResponseSerializer,
    SubscriberChannel, TicksCallback,
};
use crate::application::protocol::{
    DataQuery, DataRequest, DataResponse, DataType, ResponseMetadata,
};
use crate::application::services::{BarSource, Registration, check_range, query_limit};
use crate::domain::cache::ObjectCache;
use crate::domain::market::{
    Bar, BarType, Instrument, ModelError, StrategyId, Symbol, Tick, Venue,
};
use crate::domain::subscription::{ChannelKind, HandlerRef};
use crate::infrastructure::config::{CodecKind, ConfigError, LiveClientConfig, ValidatedPorts};
use crate::infrastructure::metrics;
use crate::infrastructure::transport::{WsRequestChannel, WsSubscriberChannel};
use crate::infrastructure::wire::{JsonCodec, MsgPackCodec};

// =============================================================================
// Channels and Codecs
// =============================================================================

/// The six channels a live client talks over.
#[derive(Clone)]
pub struct LiveChannels {
    /// Tick request/reply.
    pub tick_requests: Arc<dyn RequestChannel>,
    /// Tick publish/subscribe.
    pub tick_subscriber: Arc<dyn SubscriberChannel>,
    /// Bar request/reply.
    pub bar_requests: Arc<dyn RequestChannel>,
    /// Bar publish/subscribe.
    pub bar_subscriber: Arc<dyn SubscriberChannel>,
    /// Instrument request/reply.
    pub instrument_requests: Arc<dyn RequestChannel>,
    /// Instrument publish/subscribe.
    pub instrument_subscriber: Arc<dyn SubscriberChannel>,
}

impl LiveChannels {
    /// WebSocket channels for the configured endpoints.
    #[must_use]
    pub fn websocket(config: &LiveClientConfig, ports: &ValidatedPorts) -> Self {
        let request = |port, channel| -> Arc<dyn RequestChannel> {
            Arc::new(WsRequestChannel::new(
                config.endpoint(port, channel),
                config.reconnect.clone(),
            ))
        };
        let subscriber = |port, channel| -> Arc<dyn SubscriberChannel> {
            Arc::new(WsSubscriberChannel::new(
                config.endpoint(port, channel),
                config.reconnect.clone(),
            ))
        };

        Self {
            tick_requests: request(ports.tick_request, "tick-requests"),
            tick_subscriber: subscriber(ports.tick_subscribe, "ticks"),
            bar_requests: request(ports.bar_request, "bar-requests"),
            bar_subscriber: subscriber(ports.bar_subscribe, "bars"),
            instrument_requests: request(ports.instrument_request, "instrument-requests"),
            instrument_subscriber: subscriber(ports.instrument_subscribe, "instruments"),
        }
    }

    fn requests(&self) -> [&Arc<dyn RequestChannel>; 3] {
        [
            &self.tick_requests,
            &self.bar_requests,
            &self.instrument_requests,
        ]
    }

    fn subscriber(&self, channel: ChannelKind) -> &Arc<dyn SubscriberChannel> {
        match channel {
            ChannelKind::Ticks => &self.tick_subscriber,
            ChannelKind::Bars => &self.bar_subscriber,
            ChannelKind::Instruments => &self.instrument_subscriber,
        }
    }
}

impl fmt::Debug for LiveChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveChannels")
            .field("tick_requests", &self.tick_requests.endpoint())
            .field("tick_subscriber", &self.tick_subscriber.endpoint())
            .field("bar_requests", &self.bar_requests.endpoint())
            .field("bar_subscriber", &self.bar_subscriber.endpoint())
            .field("instrument_requests", &self.instrument_requests.endpoint())
            .field("instrument_subscriber", &self.instrument_subscriber.endpoint())
            .finish()
    }
}

/// The four codecs a live client uses.
#[derive(Clone)]
pub struct Codecs {
    /// Request envelope encoder.
    pub request: Arc<dyn RequestSerializer>,
    /// Reply envelope decoder.
    pub response: Arc<dyn ResponseSerializer>,
    /// Tick and bar codec.
    pub data: Arc<dyn DataSerializer>,
    /// Instrument codec.
    pub instrument: Arc<dyn InstrumentSerializer>,
}

impl Codecs {
    /// JSON for everything.
    #[must_use]
    pub fn json() -> Self {
        let codec = Arc::new(JsonCodec::new());
        Self {
            request: codec.clone(),
            response: codec.clone(),
            data: codec.clone(),
            instrument: codec,
        }
    }

    /// `MessagePack` for everything.
    #[must_use]
    pub fn msgpack() -> Self {
        let codec = Arc::new(MsgPackCodec::new());
        Self {
            request: codec.clone(),
            response: codec.clone(),
            data: codec.clone(),
            instrument: codec,
        }
    }

    /// Codecs for a configured wire encoding.
    #[must_use]
    pub fn for_kind(kind: CodecKind) -> Self {
        match kind {
            CodecKind::Json => Self::json(),
            CodecKind::MsgPack => Self::msgpack(),
        }
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codecs").finish_non_exhaustive()
    }
}

// =============================================================================
// Live Data Client
// =============================================================================

/// Reply to a request, once correlated.
enum Reply {
    Data {
        metadata: ResponseMetadata,
        items: Vec<Vec<u8>>,
    },
    Refused(RequestOutcome),
}

/// Data client backed by a remote data service.
pub struct LiveDataClient {
    name: String,
    config: LiveClientConfig,
    channels: LiveChannels,
    codecs: Codecs,
    clock: Arc<dyn Clock>,
    symbols: Arc<ObjectCache<Symbol, ModelError>>,
    bar_types: Arc<ObjectCache<BarType, ModelError>>,
    queue: mpsc::Sender<DispatchMessage>,
    pending_loop: Mutex<Option<(DispatchLoop, mpsc::Receiver<DispatchMessage>)>>,
    cancel: CancellationToken,
    subscriptions: tokio::sync::Mutex<()>,
    tick_exchange: tokio::sync::Mutex<()>,
    bar_exchange: tokio::sync::Mutex<()>,
    instrument_exchange: tokio::sync::Mutex<()>,
    strategies: Mutex<Vec<StrategyId>>,
    disposed: AtomicBool,
}

impl fmt::Debug for LiveDataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveDataClient")
            .field("name", &self.name)
            .field("channels", &self.channels)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl LiveDataClient {
    /// Create a client over the given channels.
    ///
    /// The dispatch task is spawned on first use, so construction does not
    /// need a runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration does not validate.
    pub fn new(
        config: LiveClientConfig,
        channels: LiveChannels,
        codecs: Codecs,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let symbols = Arc::new(ObjectCache::new("symbols", str::parse::<Symbol>));
        let bar_types = Arc::new(ObjectCache::new("bar_types", str::parse::<BarType>));
        let (queue, receiver) = mpsc::channel(config.queue_capacity);
        let dispatch = DispatchLoop::new(
            Arc::clone(&symbols),
            Arc::clone(&bar_types),
            Arc::clone(&codecs.data),
            Arc::clone(&codecs.instrument),
        );

        Ok(Self {
            name: format!("LiveDataClient-{}", config.service_name),
            config,
            channels,
            codecs,
            clock,
            symbols,
            bar_types,
            queue,
            pending_loop: Mutex::new(Some((dispatch, receiver))),
            cancel: CancellationToken::new(),
            subscriptions: tokio::sync::Mutex::new(()),
            tick_exchange: tokio::sync::Mutex::new(()),
            bar_exchange: tokio::sync::Mutex::new(()),
            instrument_exchange: tokio::sync::Mutex::new(()),
            strategies: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Create a client over WebSocket channels with the configured codec.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration does not validate.
    pub fn from_config(config: LiveClientConfig) -> Result<Self, ConfigError> {
        let ports = config.validate()?;
        let channels = LiveChannels::websocket(&config, &ports);
        let codecs = Codecs::for_kind(config.codec);
        Self::new(config, channels, codecs, Arc::new(LiveClock))
    }

    /// The client configuration.
    #[must_use]
    pub const fn config(&self) -> &LiveClientConfig {
        &self.config
    }

    /// Request every instrument of `venue` and push each one through
    /// instrument dispatch, so subscribed handlers see the refreshed
    /// definitions.
    ///
    /// # Errors
    ///
    /// Fails like [`DataClient::request_instruments`].
    pub async fn update_instruments(
        &self,
        venue: &Venue,
    ) -> Result<RequestOutcome, DataClientError> {
        let (tx, rx) = oneshot::channel();
        let outcome = self
            .request_instruments(
                venue,
                Box::new(move |instruments| {
                    let _ = tx.send(instruments);
                }),
            )
            .await?;

        if let Ok(instruments) = rx.await {
            tracing::info!(venue = %venue, count = instruments.len(), "Updating instruments");
            for instrument in instruments {
                self.queue
                    .send(DispatchMessage::Instrument(instrument))
                    .await
                    .map_err(|_| DataClientError::DispatcherClosed)?;
            }
        }
        Ok(outcome)
    }

    fn check_open(&self) -> Result<(), DataClientError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(DataClientError::Disposed)
        } else {
            Ok(())
        }
    }

    fn ensure_dispatcher(&self) {
        if let Some((dispatch, receiver)) = self.pending_loop.lock().take() {
            tokio::spawn(dispatch.run(receiver, self.cancel.clone()));
        }
    }

    async fn command<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> DispatchMessage,
    ) -> Result<R, DataClientError> {
        self.check_open()?;
        self.ensure_dispatcher();

        let (tx, rx) = oneshot::channel();
        self.queue
            .send(build(tx))
            .await
            .map_err(|_| DataClientError::DispatcherClosed)?;
        rx.await.map_err(|_| DataClientError::DispatcherClosed)
    }

    async fn snapshot(&self) -> Result<SubscriptionSnapshot, DataClientError> {
        self.command(DispatchMessage::Snapshot).await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    async fn subscribe(&self, registration: Registration) -> Result<(), DataClientError> {
        self.check_open()?;
        let _guard = self.subscriptions.lock().await;

        let rollback = registration.clone();
        let Some(change) = self
            .command(|tx| DispatchMessage::Register(registration, tx))
            .await?
        else {
            return Ok(());
        };
        if !change.crossed_zero {
            tracing::debug!(topic = %change.topic.key, "Topic already active");
            return Ok(());
        }

        let channel = self.channels.subscriber(change.topic.channel);
        if let Err(e) = channel.subscribe(&change.topic.key).await {
            self.command(|tx| DispatchMessage::Deregister(rollback, tx))
                .await?;
            return Err(e.into());
        }

        metrics::adjust_subscriptions(change.topic.channel, 1.0);
        tracing::debug!(
            channel = change.topic.channel.as_str(),
            topic = %change.topic.key,
            "Subscribed"
        );
        Ok(())
    }

    async fn unsubscribe(&self, registration: Registration) -> Result<(), DataClientError> {
        self.check_open()?;
        let _guard = self.subscriptions.lock().await;

        let probe = registration.clone();
        let Some(change) = self
            .command(|tx| DispatchMessage::Probe(probe, tx))
            .await?
        else {
            tracing::debug!(topic = %registration.topic().key, "Handler not subscribed");
            return Ok(());
        };

        if change.crossed_zero {
            let channel = self.channels.subscriber(change.topic.channel);
            channel.unsubscribe(&change.topic.key).await?;
            metrics::adjust_subscriptions(change.topic.channel, -1.0);
            tracing::debug!(
                channel = change.topic.channel.as_str(),
                topic = %change.topic.key,
                "Unsubscribed"
            );
        }

        self.command(|tx| DispatchMessage::Deregister(registration, tx))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Requests
    // =========================================================================

    async fn exchange(&self, query: DataQuery) -> Result<Reply, DataClientError> {
        let data_type = query.data_type;
        let (channel, lock, name) = match data_type {
            DataType::Tick => (&self.channels.tick_requests, &self.tick_exchange, "tick"),
            DataType::Bar => (&self.channels.bar_requests, &self.bar_exchange, "bar"),
            DataType::Instrument | DataType::Instruments => (
                &self.channels.instrument_requests,
                &self.instrument_exchange,
                "instrument",
            ),
        };

        let request = DataRequest::new(query, self.clock.time_now());
        let payload = self.codecs.request.serialize_request(&request)?;

        let reply = {
            let _guard = lock.lock().await;
            let started = Instant::now();
            let reply = tokio::time::timeout(self.config.request_timeout, channel.request(payload))
                .await
                .map_err(|_| DataClientError::Timeout {
                    channel: name,
                    after: self.config.request_timeout,
                })??;
            metrics::record_request_duration(data_type.as_str(), started.elapsed());
            reply
        };

        let response = self.codecs.response.deserialize_response(&reply)?;
        if response.correlation_id() != request.id {
            return Err(DataClientError::CorrelationMismatch {
                expected: request.id.to_string(),
                actual: response.correlation_id().to_string(),
            });
        }

        match response {
            DataResponse::Data { metadata, data, .. } => Ok(Reply::Data {
                metadata,
                items: data,
            }),
            DataResponse::Rejected { reason, .. } => {
                tracing::error!(
                    data_type = data_type.as_str(),
                    request_id = %request.id,
                    %reason,
                    "Request rejected"
                );
                Ok(Reply::Refused(RequestOutcome::Rejected { reason }))
            }
            DataResponse::QueryFailed { reason, .. } => {
                tracing::error!(
                    data_type = data_type.as_str(),
                    request_id = %request.id,
                    %reason,
                    "Query failed"
                );
                Ok(Reply::Refused(RequestOutcome::QueryFailed { reason }))
            }
        }
    }

    fn check_symbol(
        &self,
        expected: &Symbol,
        metadata: &ResponseMetadata,
    ) -> Result<(), DataClientError> {
        let actual = required(expected, "symbol", metadata.symbol.as_deref())?;
        let subject = self.symbols.get(actual)?;
        if subject == *expected {
            Ok(())
        } else {
            Err(mismatch(expected, &subject))
        }
    }

    fn check_bar_type(
        &self,
        expected: &BarType,
        metadata: &ResponseMetadata,
    ) -> Result<(), DataClientError> {
        let symbol = required(expected, "symbol", metadata.symbol.as_deref())?;
        let specification = required(
            expected,
            "specification",
            metadata.specification.as_deref(),
        )?;
        let subject = self.bar_types.get(&format!("{symbol}-{specification}"))?;
        if subject == *expected {
            Ok(())
        } else {
            Err(mismatch(expected, &subject))
        }
    }

    async fn tick_request(
        &self,
        symbol: &Symbol,
        query: DataQuery,
        callback: TicksCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        let (metadata, items) = match self.exchange(query).await? {
            Reply::Data { metadata, items } => (metadata, items),
            Reply::Refused(outcome) => return Ok(outcome),
        };
        self.check_symbol(symbol, &metadata)?;

        let ticks = items
            .iter()
            .map(|bytes| self.codecs.data.deserialize_tick(symbol, bytes))
            .collect::<Result<Vec<Tick>, _>>()?;
        let count = ticks.len();
        callback(ticks);
        Ok(RequestOutcome::Delivered { count })
    }

    async fn bar_request(
        &self,
        bar_type: &BarType,
        query: DataQuery,
        callback: BarsCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        let (metadata, items) = match self.exchange(query).await? {
            Reply::Data { metadata, items } => (metadata, items),
            Reply::Refused(outcome) => return Ok(outcome),
        };
        self.check_bar_type(bar_type, &metadata)?;

        let bars = items
            .iter()
            .map(|bytes| self.codecs.data.deserialize_bar(bar_type, bytes))
            .collect::<Result<Vec<Bar>, _>>()?;
        let count = bars.len();
        callback(bar_type.clone(), bars);
        Ok(RequestOutcome::Delivered { count })
    }

    async fn instrument_request(
        &self,
        symbol: &Symbol,
        callback: InstrumentCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        let (metadata, items) = match self.exchange(DataQuery::instrument(symbol)).await? {
            Reply::Data { metadata, items } => (metadata, items),
            Reply::Refused(outcome) => return Ok(outcome),
        };
        self.check_symbol(symbol, &metadata)?;

        let Some(bytes) = items.first() else {
            let reason = format!("no instrument returned for {symbol}");
            tracing::error!(%symbol, "Query failed: {reason}");
            return Ok(RequestOutcome::QueryFailed { reason });
        };
        let instrument = self.codecs.instrument.deserialize_instrument(bytes)?;
        if instrument.symbol != *symbol {
            return Err(mismatch(symbol, &instrument.symbol));
        }
        callback(instrument);
        Ok(RequestOutcome::Delivered { count: 1 })
    }

    async fn instruments_request(
        &self,
        venue: &Venue,
        callback: InstrumentsCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        let (metadata, items) = match self.exchange(DataQuery::instruments(venue)).await? {
            Reply::Data { metadata, items } => (metadata, items),
            Reply::Refused(outcome) => return Ok(outcome),
        };
        let subject = Venue::new(metadata.venue.as_deref().unwrap_or_default())?;
        if subject != *venue {
            return Err(mismatch(venue, &subject));
        }

        let instruments = items
            .iter()
            .map(|bytes| self.codecs.instrument.deserialize_instrument(bytes))
            .collect::<Result<Vec<Instrument>, _>>()?;
        let count = instruments.len();
        callback(instruments);
        Ok(RequestOutcome::Delivered { count })
    }
}

fn mismatch(expected: &impl fmt::Display, actual: &impl fmt::Display) -> DataClientError {
    DataClientError::SubjectMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn required<'a>(
    expected: &impl fmt::Display,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, DataClientError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DataClientError::MissingSubject {
            expected: expected.to_string(),
            field,
        })
}

fn record(
    data_type: DataType,
    result: Result<RequestOutcome, DataClientError>,
) -> Result<RequestOutcome, DataClientError> {
    metrics::record_request(data_type.as_str(), result.as_ref().ok());
    result
}

const fn bar_source(bar_type: &BarType) -> BarSource {
    if bar_type.is_tick_based() {
        BarSource::Aggregated
    } else {
        BarSource::Remote
    }
}

#[async_trait]
impl DataClient for LiveDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.channels.requests().iter().all(|c| c.is_connected())
            && ChannelKind::all()
                .iter()
                .all(|kind| self.channels.subscriber(*kind).is_connected())
    }

    async fn connect(&self) -> Result<(), DataClientError> {
        self.check_open()?;
        self.ensure_dispatcher();
        tracing::info!(client = %self.name, "Connecting");

        for channel in self.channels.requests() {
            channel.connect().await?;
        }
        for kind in ChannelKind::all() {
            let sink = Arc::new(QueueSink::new(*kind, self.queue.clone()));
            self.channels.subscriber(*kind).connect(sink).await?;
        }

        tracing::info!(client = %self.name, "Connected");
        Ok(())
    }

    async fn disconnect(&self) {
        for channel in self.channels.requests() {
            if let Err(e) = channel.disconnect().await {
                tracing::warn!(endpoint = %channel.endpoint(), error = %e, "Disconnect failed");
            }
        }
        for kind in ChannelKind::all() {
            let channel = self.channels.subscriber(*kind);
            if let Err(e) = channel.disconnect().await {
                tracing::warn!(endpoint = %channel.endpoint(), error = %e, "Disconnect failed");
            }
        }
        tracing::info!(client = %self.name, "Disconnected");
    }

    async fn reset(&self) -> Result<(), DataClientError> {
        self.check_open()?;
        let _guard = self.subscriptions.lock().await;

        let topics = self.command(DispatchMessage::Reset).await?;
        for topic in &topics {
            let channel = self.channels.subscriber(topic.channel);
            if let Err(e) = channel.unsubscribe(&topic.key).await {
                tracing::warn!(topic = %topic.key, error = %e, "Unsubscribe on reset failed");
            }
        }
        metrics::clear_subscriptions();

        tracing::info!(client = %self.name, topics = topics.len(), "Reset");
        Ok(())
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        for channel in self.channels.requests() {
            channel.dispose().await;
        }
        for kind in ChannelKind::all() {
            self.channels.subscriber(*kind).dispose().await;
        }
        self.cancel.cancel();
        self.pending_loop.lock().take();

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
        self.subscribe(Registration::Ticks {
            symbol: symbol.clone(),
            handler,
        })
        .await
    }

    async fn subscribe_bars(
        &self,
        bar_type: &BarType,
        handler: HandlerRef<Bar>,
    ) -> Result<(), DataClientError> {
        self.subscribe(Registration::Bars {
            bar_type: bar_type.clone(),
            handler,
            source: bar_source(bar_type),
        })
        .await
    }

    async fn subscribe_instrument(
        &self,
        symbol: &Symbol,
        handler: HandlerRef<Instrument>,
    ) -> Result<(), DataClientError> {
        self.subscribe(Registration::Instrument {
            symbol: symbol.clone(),
            handler,
        })
        .await
    }

    async fn unsubscribe_ticks(
        &self,
        symbol: &Symbol,
        handler: &HandlerRef<Tick>,
    ) -> Result<(), DataClientError> {
        self.unsubscribe(Registration::Ticks {
            symbol: symbol.clone(),
            handler: handler.clone(),
        })
        .await
    }

    async fn unsubscribe_bars(
        &self,
        bar_type: &BarType,
        handler: &HandlerRef<Bar>,
    ) -> Result<(), DataClientError> {
        self.unsubscribe(Registration::Bars {
            bar_type: bar_type.clone(),
            handler: handler.clone(),
            source: bar_source(bar_type),
        })
        .await
    }

    async fn unsubscribe_instrument(
        &self,
        symbol: &Symbol,
        handler: &HandlerRef<Instrument>,
    ) -> Result<(), DataClientError> {
        self.unsubscribe(Registration::Instrument {
            symbol: symbol.clone(),
            handler: handler.clone(),
        })
        .await
    }

    async fn request_ticks(
        &self,
        symbol: &Symbol,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
        callback: TicksCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        let limit = query_limit(limit)?;
        check_range(from, to)?;

        let query = DataQuery::ticks(symbol, from, to, limit);
        record(DataType::Tick, self.tick_request(symbol, query, callback).await)
    }

    async fn request_bars(
        &self,
        bar_type: &BarType,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
        callback: BarsCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        let limit = query_limit(limit)?;
        check_range(from, to)?;

        let query = DataQuery::bars(bar_type, from, to, limit);
        record(DataType::Bar, self.bar_request(bar_type, query, callback).await)
    }

    async fn request_instrument(
        &self,
        symbol: &Symbol,
        callback: InstrumentCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        record(
            DataType::Instrument,
            self.instrument_request(symbol, callback).await,
        )
    }

    async fn request_instruments(
        &self,
        venue: &Venue,
        callback: InstrumentsCallback,
    ) -> Result<RequestOutcome, DataClientError> {
        self.check_open()?;
        record(
            DataType::Instruments,
            self.instruments_request(venue, callback).await,
        )
    }

    async fn subscribed_ticks(&self) -> Result<Vec<Symbol>, DataClientError> {
        Ok(self.snapshot().await?.ticks)
    }

    async fn subscribed_bars(&self) -> Result<Vec<BarType>, DataClientError> {
        Ok(self.snapshot().await?.bars)
    }

    async fn subscribed_instruments(&self) -> Result<Vec<Symbol>, DataClientError> {
        Ok(self.snapshot().await?.instruments)
    }
}
