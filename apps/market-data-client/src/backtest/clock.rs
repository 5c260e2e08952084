//! Test Clock
//!
//! Virtual clock for backtests. Time only moves when the backtest client
//! advances it to the next replayed tick.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::error::BacktestError;
use crate::application::ports::{Clock, FiredTimer, TimeEvent, VirtualClock};
use crate::domain::subscription::HandlerRef;

#[derive(Debug)]
struct Timer {
    name: String,
    next: DateTime<Utc>,
    interval: Option<Duration>,
    stop: Option<DateTime<Utc>>,
    handler: HandlerRef<TimeEvent>,
}

#[derive(Debug)]
struct ClockState {
    now: DateTime<Utc>,
    timers: Vec<Timer>,
}

/// Shared virtual clock. Clones observe and move the same time.
#[derive(Debug, Clone)]
pub struct TestClock {
    state: Arc<Mutex<ClockState>>,
}

impl TestClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                now: start,
                timers: Vec::new(),
            })),
        }
    }

    /// Move the clock without firing anything.
    pub fn set_time(&self, to: DateTime<Utc>) {
        self.state.lock().now = to;
    }

    /// Schedule a one-shot alert, replacing any timer of the same name.
    pub fn set_time_alert(
        &self,
        name: impl Into<String>,
        at: DateTime<Utc>,
        handler: HandlerRef<TimeEvent>,
    ) {
        self.schedule(Timer {
            name: name.into(),
            next: at,
            interval: None,
            stop: None,
            handler,
        });
    }

    /// Schedule a repeating timer firing every `interval` from `start`
    /// (default: now) until `stop`, replacing any timer of the same name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimer` if `interval` is not positive.
    pub fn set_timer(
        &self,
        name: impl Into<String>,
        interval: Duration,
        start: Option<DateTime<Utc>>,
        stop: Option<DateTime<Utc>>,
        handler: HandlerRef<TimeEvent>,
    ) -> Result<(), BacktestError> {
        let name = name.into();
        if interval <= Duration::zero() {
            return Err(BacktestError::InvalidTimer(name));
        }
        let start = start.unwrap_or_else(|| self.time_now());
        self.schedule(Timer {
            name,
            next: start + interval,
            interval: Some(interval),
            stop,
            handler,
        });
        Ok(())
    }

    /// Remove a timer or alert. Returns whether it existed.
    pub fn cancel_timer(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.timers.len();
        state.timers.retain(|timer| timer.name != name);
        state.timers.len() != before
    }

    /// Names of scheduled timers and alerts, in scheduling order.
    #[must_use]
    pub fn timer_names(&self) -> Vec<String> {
        self.state
            .lock()
            .timers
            .iter()
            .map(|timer| timer.name.clone())
            .collect()
    }

    fn schedule(&self, timer: Timer) {
        let mut state = self.state.lock();
        state.timers.retain(|existing| existing.name != timer.name);
        state.timers.push(timer);
    }
}

impl Clock for TestClock {
    fn time_now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }
}

impl VirtualClock for TestClock {
    fn has_pending_timers(&self) -> bool {
        !self.state.lock().timers.is_empty()
    }

    fn next_event_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().timers.iter().map(|timer| timer.next).min()
    }

    fn advance_time(&self, to: DateTime<Utc>) -> Vec<FiredTimer> {
        let mut state = self.state.lock();
        let mut fired = Vec::new();

        for timer in &mut state.timers {
            while timer.next <= to && timer.stop.is_none_or(|stop| timer.next <= stop) {
                fired.push(FiredTimer {
                    event: TimeEvent {
                        name: timer.name.clone(),
                        timestamp: timer.next,
                    },
                    handler: timer.handler.clone(),
                });
                match timer.interval {
                    Some(interval) => timer.next += interval,
                    None => break,
                }
            }
        }
        state.timers.retain(|timer| {
            let alert_fired = timer.interval.is_none() && timer.next <= to;
            let expired = timer.stop.is_some_and(|stop| timer.next > stop);
            !alert_fired && !expired
        });
        if to > state.now {
            state.now = to;
        }

        fired.sort_by_key(|timer| timer.event.timestamp);
        fired
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_577_836_800 + secs, 0).unwrap()
    }

    fn noop() -> HandlerRef<TimeEvent> {
        HandlerRef::new(|_: &TimeEvent| {})
    }

    #[test]
    fn alerts_fire_once() {
        let clock = TestClock::new(t(0));
        clock.set_time_alert("open", t(10), noop());

        assert!(clock.advance_time(t(5)).is_empty());
        assert_eq!(clock.next_event_time(), Some(t(10)));

        let fired = clock.advance_time(t(10));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].event.name, "open");
        assert!(!clock.has_pending_timers());
        assert_eq!(clock.time_now(), t(10));
    }

    #[test]
    fn timers_repeat_until_stop_in_time_order() {
        let clock = TestClock::new(t(0));
        clock
            .set_timer("fast", Duration::seconds(2), None, Some(t(6)), noop())
            .unwrap();
        clock.set_time_alert("alert", t(3), noop());

        let fired: Vec<(String, DateTime<Utc>)> = clock
            .advance_time(t(10))
            .into_iter()
            .map(|f| (f.event.name, f.event.timestamp))
            .collect();

        assert_eq!(
            fired,
            vec![
                ("fast".to_string(), t(2)),
                ("alert".to_string(), t(3)),
                ("fast".to_string(), t(4)),
                ("fast".to_string(), t(6)),
            ]
        );
        assert!(!clock.has_pending_timers());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let clock = TestClock::new(t(0));
        let result = clock.set_timer("bad", Duration::zero(), None, None, noop());
        assert_eq!(result, Err(BacktestError::InvalidTimer("bad".to_string())));
    }

    #[test]
    fn rescheduling_replaces_and_cancel_removes() {
        let clock = TestClock::new(t(0));
        clock.set_time_alert("a", t(5), noop());
        clock.set_time_alert("a", t(7), noop());
        assert_eq!(clock.timer_names(), vec!["a".to_string()]);
        assert_eq!(clock.next_event_time(), Some(t(7)));

        assert!(clock.cancel_timer("a"));
        assert!(!clock.cancel_timer("a"));
    }
}
