//! Data Dispatcher
//!
//! Owns the tick, bar and instrument handler registries plus the locally
//! driven bar aggregators, and answers whether a wire topic has just become
//! active or is about to go idle.
//!
//! # Topic interest
//!
//! | Registration | Wire topic |
//! |---|---|
//! | ticks for `S` | `S` on the tick channel |
//! | remote bars for `B` | `B` on the bar channel |
//! | aggregated bars for `B` | `B.symbol` on the tick channel |
//! | instrument `S` | `S` on the instrument channel |
//!
//! A tick topic stays active while either tick handlers or aggregated bar
//! handlers for its symbol remain.
//!
//! Routing methods only collect handlers; callers invoke them after any lock
//! around the dispatcher has been released.

use std::collections::HashMap;

use crate::domain::aggregation::BarAggregator;
use crate::domain::market::{Bar, BarType, Instrument, Symbol, Tick};
use crate::domain::subscription::{
    ChannelKind, HandlerRef, HandlerRegistry, InterestChange, Topic,
};

// =============================================================================
// Registrations
// =============================================================================

/// Where a bar type's bars come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarSource {
    /// Published by the data service on the bar channel.
    Remote,
    /// Built locally from the symbol's ticks.
    Aggregated,
}

/// A handler bound to a subscription key.
#[derive(Debug, Clone)]
pub enum Registration {
    /// Tick handler.
    Ticks {
        /// Subscribed symbol.
        symbol: Symbol,
        /// Handler to invoke.
        handler: HandlerRef<Tick>,
    },
    /// Bar handler.
    Bars {
        /// Subscribed bar type.
        bar_type: BarType,
        /// Handler to invoke.
        handler: HandlerRef<Bar>,
        /// How bars for this type are produced.
        source: BarSource,
    },
    /// Instrument handler.
    Instrument {
        /// Subscribed symbol.
        symbol: Symbol,
        /// Handler to invoke.
        handler: HandlerRef<Instrument>,
    },
}

impl Registration {
    /// Wire topic whose interest this registration contributes to.
    #[must_use]
    pub fn topic(&self) -> Topic {
        match self {
            Self::Ticks { symbol, .. } => Topic::new(ChannelKind::Ticks, symbol),
            Self::Bars {
                bar_type,
                source: BarSource::Remote,
                ..
            } => Topic::new(ChannelKind::Bars, bar_type),
            Self::Bars {
                bar_type,
                source: BarSource::Aggregated,
                ..
            } => Topic::new(ChannelKind::Ticks, bar_type.symbol()),
            Self::Instrument { symbol, .. } => Topic::new(ChannelKind::Instruments, symbol),
        }
    }
}

// =============================================================================
// Fan-out
// =============================================================================

/// Handlers collected for one tick, plus any bars the tick completed.
#[derive(Debug, Default)]
pub struct TickFanout {
    tick_handlers: Vec<HandlerRef<Tick>>,
    bars: Vec<(Bar, Vec<HandlerRef<Bar>>)>,
}

impl TickFanout {
    /// Whether nothing will be invoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tick_handlers.is_empty() && self.bars.iter().all(|(_, h)| h.is_empty())
    }

    /// Invoke every tick handler in registration order, then the handlers of
    /// each completed bar. Returns the number of invocations.
    pub fn deliver(self, tick: &Tick) -> usize {
        let mut calls = 0;
        for handler in &self.tick_handlers {
            handler.call(tick);
            calls += 1;
        }
        for (bar, handlers) in &self.bars {
            for handler in handlers {
                handler.call(bar);
                calls += 1;
            }
        }
        calls
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Handler registries and local bar aggregation shared by both data clients.
#[derive(Debug, Default)]
pub struct DataDispatcher {
    ticks: HandlerRegistry<Symbol, Tick>,
    bars: HandlerRegistry<BarType, Bar>,
    instruments: HandlerRegistry<Symbol, Instrument>,
    aggregators: HashMap<BarType, BarAggregator>,
}

impl DataDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers keeping a symbol's tick topic active.
    fn tick_interest(&self, symbol: &Symbol) -> usize {
        let aggregated: usize = self
            .aggregators
            .keys()
            .filter(|bar_type| bar_type.symbol() == symbol)
            .map(|bar_type| self.bars.count(bar_type))
            .sum();
        self.ticks.count(symbol) + aggregated
    }

    /// Number of handlers keeping the registration's wire topic active.
    fn interest(&self, registration: &Registration) -> usize {
        match registration {
            Registration::Ticks { symbol, .. } => self.tick_interest(symbol),
            Registration::Bars {
                bar_type,
                source: BarSource::Aggregated,
                ..
            } => self.tick_interest(bar_type.symbol()),
            Registration::Bars { bar_type, .. } => self.bars.count(bar_type),
            Registration::Instrument { symbol, .. } => self.instruments.count(symbol),
        }
    }

    fn is_registered(&self, registration: &Registration) -> bool {
        match registration {
            Registration::Ticks { symbol, handler } => self.ticks.contains(symbol, handler),
            Registration::Bars {
                bar_type, handler, ..
            } => self.bars.contains(bar_type, handler),
            Registration::Instrument { symbol, handler } => {
                self.instruments.contains(symbol, handler)
            }
        }
    }

    /// Add a handler.
    ///
    /// Returns `None` if the handler was already registered for the key;
    /// otherwise the topic and whether it just became active.
    pub fn register(&mut self, registration: Registration) -> Option<InterestChange> {
        let topic = registration.topic();
        let before = self.interest(&registration);

        let added = match &registration {
            Registration::Ticks { symbol, handler } => {
                self.ticks.add(symbol.clone(), handler.clone())
            }
            Registration::Bars {
                bar_type,
                handler,
                source,
            } => {
                let added = self.bars.add(bar_type.clone(), handler.clone());
                if added && *source == BarSource::Aggregated {
                    self.aggregators
                        .entry(bar_type.clone())
                        .or_insert_with(|| BarAggregator::for_bar_type(bar_type.clone()));
                }
                added
            }
            Registration::Instrument { symbol, handler } => {
                self.instruments.add(symbol.clone(), handler.clone())
            }
        };

        if !added {
            tracing::warn!(
                topic = %topic.key,
                channel = topic.channel.as_str(),
                "Handler already registered"
            );
            return None;
        }

        Some(InterestChange {
            topic,
            crossed_zero: before == 0,
        })
    }

    /// Report what removing a handler would do, without removing it.
    ///
    /// Returns `None` if the handler is not registered.
    #[must_use]
    pub fn probe_release(&self, registration: &Registration) -> Option<InterestChange> {
        if !self.is_registered(registration) {
            return None;
        }

        Some(InterestChange {
            topic: registration.topic(),
            crossed_zero: self.interest(registration) == 1,
        })
    }

    /// Remove a handler.
    ///
    /// Returns `None` if the handler was not registered; otherwise the topic
    /// and whether it just went idle. An aggregator is dropped with its last
    /// bar handler.
    pub fn deregister(&mut self, registration: &Registration) -> Option<InterestChange> {
        let topic = registration.topic();

        let removed = match registration {
            Registration::Ticks { symbol, handler } => self.ticks.remove(symbol, handler),
            Registration::Bars {
                bar_type, handler, ..
            } => {
                let removed = self.bars.remove(bar_type, handler);
                if removed && self.bars.count(bar_type) == 0 {
                    self.aggregators.remove(bar_type);
                }
                removed
            }
            Registration::Instrument { symbol, handler } => {
                self.instruments.remove(symbol, handler)
            }
        };

        if !removed {
            tracing::debug!(
                topic = %topic.key,
                channel = topic.channel.as_str(),
                "Handler not registered"
            );
            return None;
        }

        let crossed_zero = self.interest(registration) == 0;
        Some(InterestChange {
            topic,
            crossed_zero,
        })
    }

    /// Collect handlers for a tick and feed it to the symbol's aggregators.
    pub fn route_tick(&mut self, tick: &Tick) -> TickFanout {
        let tick_handlers = self.ticks.handlers(&tick.symbol);

        let mut completed: Vec<Bar> = Vec::new();
        for (bar_type, aggregator) in &mut self.aggregators {
            if bar_type.symbol() == &tick.symbol
                && let Some(bar) = aggregator.update(tick)
            {
                completed.push(bar);
            }
        }
        completed.sort_by(|a, b| a.bar_type.cmp(&b.bar_type));

        let bars = completed
            .into_iter()
            .map(|bar| {
                let handlers = self.bars.handlers(&bar.bar_type);
                (bar, handlers)
            })
            .collect();

        let fanout = TickFanout {
            tick_handlers,
            bars,
        };
        if fanout.is_empty() {
            tracing::debug!(symbol = %tick.symbol, "No handlers for tick");
        }
        fanout
    }

    /// Collect handlers for a bar.
    #[must_use]
    pub fn route_bar(&self, bar: &Bar) -> Vec<HandlerRef<Bar>> {
        let handlers = self.bars.handlers(&bar.bar_type);
        if handlers.is_empty() {
            tracing::debug!(bar_type = %bar.bar_type, "No handlers for bar");
        }
        handlers
    }

    /// Collect handlers for an instrument.
    #[must_use]
    pub fn route_instrument(&self, instrument: &Instrument) -> Vec<HandlerRef<Instrument>> {
        let handlers = self.instruments.handlers(&instrument.symbol);
        if handlers.is_empty() {
            tracing::debug!(symbol = %instrument.symbol, "No handlers for instrument");
        }
        handlers
    }

    /// Symbols with tick handlers, sorted.
    #[must_use]
    pub fn subscribed_ticks(&self) -> Vec<Symbol> {
        let mut keys = self.ticks.keys();
        keys.sort();
        keys
    }

    /// Bar types with bar handlers, sorted.
    #[must_use]
    pub fn subscribed_bars(&self) -> Vec<BarType> {
        let mut keys = self.bars.keys();
        keys.sort();
        keys
    }

    /// Symbols with instrument handlers, sorted.
    #[must_use]
    pub fn subscribed_instruments(&self) -> Vec<Symbol> {
        let mut keys = self.instruments.keys();
        keys.sort();
        keys
    }

    /// Every wire topic with at least one handler behind it.
    #[must_use]
    pub fn active_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .ticks
            .keys()
            .into_iter()
            .chain(self.aggregators.keys().map(|bar_type| bar_type.symbol().clone()))
            .map(|symbol| Topic::new(ChannelKind::Ticks, symbol))
            .chain(
                self.bars
                    .keys()
                    .into_iter()
                    .filter(|bar_type| !self.aggregators.contains_key(bar_type))
                    .map(|bar_type| Topic::new(ChannelKind::Bars, bar_type)),
            )
            .chain(
                self.instruments
                    .keys()
                    .into_iter()
                    .map(|symbol| Topic::new(ChannelKind::Instruments, symbol)),
            )
            .collect();
        topics.sort_by(|a, b| {
            (a.channel.as_str(), &a.key).cmp(&(b.channel.as_str(), &b.key))
        });
        topics.dedup();
        topics
    }

    /// Number of active local aggregators.
    #[must_use]
    pub fn aggregator_count(&self) -> usize {
        self.aggregators.len()
    }

    /// Drop every handler and aggregator.
    pub fn reset(&mut self) {
        self.ticks.clear();
        self.bars.clear();
        self.instruments.clear();
        self.aggregators.clear();
    }
}
