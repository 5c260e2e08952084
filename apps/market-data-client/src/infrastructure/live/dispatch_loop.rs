//! Dispatch Loop
//!
//! The single task that owns the live client's [`DataDispatcher`]. Registry
//! commands and published messages share one bounded queue, so a handler
//! registered before its wire subscribe sees every message published after
//! it, and a handler removed after its wire unsubscribe still sees every
//! message that was already queued.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{DataSerializer, DeliverySink, InboundMessage, InstrumentSerializer};
use crate::application::services::{DataDispatcher, Registration};
use crate::domain::cache::ObjectCache;
use crate::domain::market::{BarType, Instrument, ModelError, Symbol};
use crate::domain::subscription::{ChannelKind, InterestChange, Topic};
use crate::infrastructure::metrics::{self, DropReason};

/// Subscription keys with handlers, at one point in the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Symbols with tick handlers.
    pub ticks: Vec<Symbol>,
    /// Bar types with bar handlers.
    pub bars: Vec<BarType>,
    /// Symbols with instrument handlers.
    pub instruments: Vec<Symbol>,
}

/// Messages consumed by the dispatch loop.
#[derive(Debug)]
pub enum DispatchMessage {
    /// Add a handler; replies with the interest change, if any.
    Register(Registration, oneshot::Sender<Option<InterestChange>>),
    /// Report what removing a handler would do.
    Probe(Registration, oneshot::Sender<Option<InterestChange>>),
    /// Remove a handler; replies with the interest change, if any.
    Deregister(Registration, oneshot::Sender<Option<InterestChange>>),
    /// Clear handlers, aggregators and caches; replies with the topics that
    /// were active.
    Reset(oneshot::Sender<Vec<Topic>>),
    /// Report subscribed keys.
    Snapshot(oneshot::Sender<SubscriptionSnapshot>),
    /// A message published on a subscriber channel.
    Deliver(ChannelKind, InboundMessage),
    /// An instrument definition obtained by request.
    Instrument(Instrument),
}

/// Forwards one subscriber channel's messages onto the dispatch queue.
#[derive(Debug, Clone)]
pub struct QueueSink {
    channel: ChannelKind,
    queue: mpsc::Sender<DispatchMessage>,
}

impl QueueSink {
    /// Create a sink tagging messages with `channel`.
    #[must_use]
    pub const fn new(channel: ChannelKind, queue: mpsc::Sender<DispatchMessage>) -> Self {
        Self { channel, queue }
    }
}

#[async_trait]
impl DeliverySink for QueueSink {
    async fn deliver(&self, message: InboundMessage) -> bool {
        metrics::record_message_received(self.channel);
        self.queue
            .send(DispatchMessage::Deliver(self.channel, message))
            .await
            .is_ok()
    }
}

/// State owned by the dispatch task.
pub struct DispatchLoop {
    dispatcher: DataDispatcher,
    symbols: Arc<ObjectCache<Symbol, ModelError>>,
    bar_types: Arc<ObjectCache<BarType, ModelError>>,
    data: Arc<dyn DataSerializer>,
    instruments: Arc<dyn InstrumentSerializer>,
}

impl DispatchLoop {
    /// Create a loop with an empty dispatcher.
    #[must_use]
    pub fn new(
        symbols: Arc<ObjectCache<Symbol, ModelError>>,
        bar_types: Arc<ObjectCache<BarType, ModelError>>,
        data: Arc<dyn DataSerializer>,
        instruments: Arc<dyn InstrumentSerializer>,
    ) -> Self {
        Self {
            dispatcher: DataDispatcher::new(),
            symbols,
            bar_types,
            data,
            instruments,
        }
    }

    /// Process messages until cancelled or every sender is gone.
    pub async fn run(
        mut self,
        mut queue: mpsc::Receiver<DispatchMessage>,
        cancel: CancellationToken,
    ) {
        tracing::debug!("Dispatch loop started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                message = queue.recv() => {
                    let Some(message) = message else { break };
                    self.handle(message);
                }
            }
        }
        tracing::debug!("Dispatch loop stopped");
    }

    fn handle(&mut self, message: DispatchMessage) {
        match message {
            DispatchMessage::Register(registration, reply) => {
                let _ = reply.send(self.dispatcher.register(registration));
            }
            DispatchMessage::Probe(registration, reply) => {
                let _ = reply.send(self.dispatcher.probe_release(&registration));
            }
            DispatchMessage::Deregister(registration, reply) => {
                let _ = reply.send(self.dispatcher.deregister(&registration));
            }
            DispatchMessage::Reset(reply) => {
                let active = self.dispatcher.active_topics();
                self.dispatcher.reset();
                self.symbols.clear();
                self.bar_types.clear();
                let _ = reply.send(active);
            }
            DispatchMessage::Snapshot(reply) => {
                let _ = reply.send(SubscriptionSnapshot {
                    ticks: self.dispatcher.subscribed_ticks(),
                    bars: self.dispatcher.subscribed_bars(),
                    instruments: self.dispatcher.subscribed_instruments(),
                });
            }
            DispatchMessage::Deliver(channel, message) => self.deliver(channel, &message),
            DispatchMessage::Instrument(instrument) => self.deliver_instrument(&instrument),
        }
    }

    fn deliver(&mut self, channel: ChannelKind, message: &InboundMessage) {
        match channel {
            ChannelKind::Ticks => {
                let Ok(symbol) = self.symbols.get(&message.topic) else {
                    drop_message(channel, DropReason::BadTopic, &message.topic);
                    return;
                };
                let tick = match self.data.deserialize_tick(&symbol, &message.payload) {
                    Ok(tick) => tick,
                    Err(e) => {
                        tracing::warn!(topic = %message.topic, error = %e, "Undecodable tick");
                        metrics::record_message_dropped(channel, DropReason::BadPayload);
                        return;
                    }
                };

                let fanout = self.dispatcher.route_tick(&tick);
                if fanout.is_empty() {
                    metrics::record_message_dropped(channel, DropReason::NoHandlers);
                }
                fanout.deliver(&tick);
            }
            ChannelKind::Bars => {
                let Ok(bar_type) = self.bar_types.get(&message.topic) else {
                    drop_message(channel, DropReason::BadTopic, &message.topic);
                    return;
                };
                let bar = match self.data.deserialize_bar(&bar_type, &message.payload) {
                    Ok(bar) => bar,
                    Err(e) => {
                        tracing::warn!(topic = %message.topic, error = %e, "Undecodable bar");
                        metrics::record_message_dropped(channel, DropReason::BadPayload);
                        return;
                    }
                };

                let handlers = self.dispatcher.route_bar(&bar);
                if handlers.is_empty() {
                    metrics::record_message_dropped(channel, DropReason::NoHandlers);
                }
                for handler in handlers {
                    handler.call(&bar);
                }
            }
            ChannelKind::Instruments => {
                match self.instruments.deserialize_instrument(&message.payload) {
                    Ok(instrument) => self.deliver_instrument(&instrument),
                    Err(e) => {
                        tracing::warn!(
                            topic = %message.topic,
                            error = %e,
                            "Undecodable instrument"
                        );
                        metrics::record_message_dropped(channel, DropReason::BadPayload);
                    }
                }
            }
        }
    }

    fn deliver_instrument(&self, instrument: &Instrument) {
        let handlers = self.dispatcher.route_instrument(instrument);
        if handlers.is_empty() {
            metrics::record_message_dropped(ChannelKind::Instruments, DropReason::NoHandlers);
        }
        for handler in handlers {
            handler.call(instrument);
        }
    }
}

fn drop_message(channel: ChannelKind, reason: DropReason, topic: &str) {
    tracing::warn!(topic, channel = channel.as_str(), "Unparsable topic");
    metrics::record_message_dropped(channel, reason);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::market::Tick;
    use crate::domain::subscription::HandlerRef;
    use crate::infrastructure::wire::JsonCodec;

    fn dispatch_loop() -> DispatchLoop {
        let codec = Arc::new(JsonCodec::new());
        DispatchLoop::new(
            Arc::new(ObjectCache::new("symbols", str::parse::<Symbol>)),
            Arc::new(ObjectCache::new("bar_types", str::parse::<BarType>)),
            codec.clone(),
            codec,
        )
    }

    fn tick_payload() -> Vec<u8> {
        let tick = Tick {
            symbol: "EUR/USD.FXCM".parse().unwrap(),
            bid: dec!(1.1),
            ask: dec!(1.2),
            bid_size: dec!(1),
            ask_size: dec!(1),
            timestamp: Utc::now(),
        };
        JsonCodec::new().serialize_tick(&tick).unwrap()
    }

    #[test]
    fn delivers_to_registered_handler() {
        let mut state = dispatch_loop();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let (tx, _rx) = oneshot::channel();
        state.handle(DispatchMessage::Register(
            Registration::Ticks {
                symbol: "EUR/USD.FXCM".parse().unwrap(),
                handler: HandlerRef::new(move |_: &Tick| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            },
            tx,
        ));

        let message = InboundMessage {
            topic: "EUR/USD.FXCM".to_string(),
            payload: tick_payload(),
        };
        state.handle(DispatchMessage::Deliver(ChannelKind::Ticks, message));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(state.symbols.len(), 1);
    }

    #[test]
    fn bad_topic_and_payload_are_dropped() {
        let mut state = dispatch_loop();
        state.handle(DispatchMessage::Deliver(
            ChannelKind::Ticks,
            InboundMessage {
                topic: "no-venue".to_string(),
                payload: tick_payload(),
            },
        ));
        state.handle(DispatchMessage::Deliver(
            ChannelKind::Ticks,
            InboundMessage {
                topic: "EUR/USD.FXCM".to_string(),
                payload: b"garbage".to_vec(),
            },
        ));
        assert!(state.symbols.keys().contains(&"EUR/USD.FXCM".to_string()));
    }

    #[test]
    fn reset_reports_active_topics_and_clears_caches() {
        let mut state = dispatch_loop();
        let (tx, _rx) = oneshot::channel();
        state.handle(DispatchMessage::Register(
            Registration::Instrument {
                symbol: "EUR/USD.FXCM".parse().unwrap(),
                handler: HandlerRef::new(|_: &Instrument| {}),
            },
            tx,
        ));
        state.symbols.get("EUR/USD.FXCM").unwrap();

        let (tx, mut rx) = oneshot::channel();
        state.handle(DispatchMessage::Reset(tx));

        let topics = rx.try_recv().unwrap();
        assert_eq!(topics, vec![Topic::new(ChannelKind::Instruments, "EUR/USD.FXCM")]);
        assert!(state.symbols.is_empty());
    }
}
