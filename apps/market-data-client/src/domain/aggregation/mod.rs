//! Bar Aggregation
//!
//! Builds bars locally from quote ticks. Tick-count bars are always built
//! this way because the remote service only distributes wall-clock bars;
//! the backtest client also builds time bars this way from replayed ticks.

use chrono::{DateTime, DurationRound, Utc};
use rust_decimal::Decimal;

use super::market::{Bar, BarType, Tick};

/// Accumulates OHLCV values for the bar under construction.
#[derive(Debug, Clone, Default)]
struct BarBuilder {
    open: Option<Decimal>,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    count: u32,
}

impl BarBuilder {
    fn update(&mut self, price: Decimal, size: Decimal) {
        if self.open.is_none() {
            self.open = Some(price);
            self.high = price;
            self.low = price;
        } else {
            self.high = self.high.max(price);
            self.low = self.low.min(price);
        }
        self.close = price;
        self.volume += size;
        self.count += 1;
    }

    fn build(&mut self, bar_type: &BarType, timestamp: DateTime<Utc>) -> Option<Bar> {
        let open = self.open?;
        let bar = Bar {
            bar_type: bar_type.clone(),
            open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            timestamp,
        };
        *self = Self::default();
        Some(bar)
    }
}

// =============================================================================
// Tick Bars
// =============================================================================

/// Emits a bar every `step` ticks.
#[derive(Debug, Clone)]
pub struct TickBarAggregator {
    bar_type: BarType,
    builder: BarBuilder,
}

impl TickBarAggregator {
    /// Create an aggregator for a tick-structured bar type.
    #[must_use]
    pub fn new(bar_type: BarType) -> Self {
        Self {
            bar_type,
            builder: BarBuilder::default(),
        }
    }

    /// Feed one tick; returns a bar once `step` ticks have accumulated.
    pub fn update(&mut self, tick: &Tick) -> Option<Bar> {
        let price_type = self.bar_type.specification().price_type();
        self.builder
            .update(tick.price(price_type), tick.size(price_type));

        if self.builder.count >= self.bar_type.specification().step() {
            self.builder.build(&self.bar_type, tick.timestamp)
        } else {
            None
        }
    }
}

// =============================================================================
// Time Bars
// =============================================================================

/// Emits a bar when a tick arrives past the end of the current window.
///
/// Windows are `[start, start + interval)` aligned to the Unix epoch; a bar is
/// stamped with its window end.
#[derive(Debug, Clone)]
pub struct TimeBarAggregator {
    bar_type: BarType,
    interval: chrono::Duration,
    window_end: Option<DateTime<Utc>>,
    builder: BarBuilder,
}

impl TimeBarAggregator {
    /// Create an aggregator, or `None` if the bar type is not time based.
    #[must_use]
    pub fn new(bar_type: BarType) -> Option<Self> {
        let interval = bar_type.specification().interval()?;
        Some(Self {
            bar_type,
            interval,
            window_end: None,
            builder: BarBuilder::default(),
        })
    }

    /// Feed one tick; returns the completed bar of the previous window, if
    /// this tick closes it.
    pub fn update(&mut self, tick: &Tick) -> Option<Bar> {
        let mut completed = None;

        if let Some(end) = self.window_end
            && tick.timestamp >= end
        {
            completed = self.builder.build(&self.bar_type, end);
            self.window_end = None;
        }

        if self.window_end.is_none() {
            let start = tick
                .timestamp
                .duration_trunc(self.interval)
                .unwrap_or(tick.timestamp);
            let Some(end) = start.checked_add_signed(self.interval) else {
                tracing::warn!(
                    bar_type = %self.bar_type,
                    timestamp = %tick.timestamp,
                    "Bar window ends past the calendar; tick skipped"
                );
                return completed;
            };
            self.window_end = Some(end);
        }

        let price_type = self.bar_type.specification().price_type();
        self.builder
            .update(tick.price(price_type), tick.size(price_type));

        completed
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Either kind of local bar aggregator.
#[derive(Debug, Clone)]
pub enum BarAggregator {
    /// Tick-count bars.
    Tick(TickBarAggregator),
    /// Wall-clock bars.
    Time(TimeBarAggregator),
}

impl BarAggregator {
    /// Create the aggregator matching the bar type's structure.
    #[must_use]
    pub fn for_bar_type(bar_type: BarType) -> Self {
        if bar_type.is_tick_based() {
            Self::Tick(TickBarAggregator::new(bar_type))
        } else {
            match TimeBarAggregator::new(bar_type.clone()) {
                Some(aggregator) => Self::Time(aggregator),
                None => Self::Tick(TickBarAggregator::new(bar_type)),
            }
        }
    }

    /// Feed one tick.
    pub fn update(&mut self, tick: &Tick) -> Option<Bar> {
        match self {
            Self::Tick(aggregator) => aggregator.update(tick),
            Self::Time(aggregator) => aggregator.update(tick),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn tick_at(secs: i64, bid: Decimal) -> Tick {
        Tick {
            symbol: "EUR/USD.FXCM".parse().unwrap(),
            bid,
            ask: bid + dec!(0.0002),
            bid_size: dec!(1),
            ask_size: dec!(1),
            timestamp: Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn tick_bars_emit_after_step() {
        let bar_type: BarType = "EUR/USD.FXCM-3-TICK-BID".parse().unwrap();
        let mut aggregator = TickBarAggregator::new(bar_type);

        assert!(aggregator.update(&tick_at(0, dec!(1.1000))).is_none());
        assert!(aggregator.update(&tick_at(1, dec!(1.1005))).is_none());
        let bar = aggregator.update(&tick_at(2, dec!(1.0995))).unwrap();

        assert_eq!(bar.open, dec!(1.1000));
        assert_eq!(bar.high, dec!(1.1005));
        assert_eq!(bar.low, dec!(1.0995));
        assert_eq!(bar.close, dec!(1.0995));
        assert_eq!(bar.volume, dec!(3));
        assert_eq!(bar.timestamp, tick_at(2, dec!(1)).timestamp);
    }

    #[test]
    fn tick_bars_restart_after_emit() {
        let bar_type: BarType = "EUR/USD.FXCM-2-TICK-ASK".parse().unwrap();
        let mut aggregator = TickBarAggregator::new(bar_type);

        let bars: Vec<Bar> = (0..5)
            .filter_map(|i| aggregator.update(&tick_at(i, dec!(1.1))))
            .collect();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(1.1002));
    }

    #[test]
    fn time_bars_close_on_window_cross() {
        let bar_type: BarType = "EUR/USD.FXCM-1-MINUTE-BID".parse().unwrap();
        let mut aggregator = TimeBarAggregator::new(bar_type).unwrap();

        // 1_600_000_000 is 26:40 past the hour, i.e. 40s into a minute.
        assert!(aggregator.update(&tick_at(0, dec!(1.1))).is_none());
        assert!(aggregator.update(&tick_at(10, dec!(1.2))).is_none());
        let bar = aggregator.update(&tick_at(20, dec!(1.3))).unwrap();

        assert_eq!(bar.open, dec!(1.1));
        assert_eq!(bar.close, dec!(1.2));
        assert_eq!(bar.timestamp, tick_at(20, dec!(1)).timestamp);
    }

    #[test]
    fn window_past_the_calendar_skips_the_tick() {
        let bar_type: BarType = "EUR/USD.FXCM-36500-DAY-BID".parse().unwrap();
        let mut aggregator = TimeBarAggregator::new(bar_type).unwrap();
        let mut late = tick_at(0, dec!(1.1));
        late.timestamp = DateTime::<Utc>::MAX_UTC - chrono::Duration::days(1);

        assert!(aggregator.update(&late).is_none());
        assert!(aggregator.update(&late).is_none());
        assert!(aggregator.window_end.is_none());
    }

    #[test]
    fn time_aggregator_rejects_tick_structure() {
        let bar_type: BarType = "EUR/USD.FXCM-10-TICK-BID".parse().unwrap();
        assert!(TimeBarAggregator::new(bar_type.clone()).is_none());
        assert!(matches!(
            BarAggregator::for_bar_type(bar_type),
            BarAggregator::Tick(_)
        ));
    }
}
