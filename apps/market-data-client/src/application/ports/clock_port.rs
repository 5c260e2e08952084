//! Clock Port (Driven Port)
//!
//! Time source for data clients. The backtest client drives a
//! [`VirtualClock`] forward in lock-step with replayed ticks.

use chrono::{DateTime, Utc};

use crate::domain::subscription::HandlerRef;

/// A named timer or time alert firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEvent {
    /// Timer or alert name.
    pub name: String,
    /// Scheduled fire time.
    pub timestamp: DateTime<Utc>,
}

/// A due timer event paired with the handler registered for it.
#[derive(Debug, Clone)]
pub struct FiredTimer {
    /// The event being fired.
    pub event: TimeEvent,
    /// Handler to invoke.
    pub handler: HandlerRef<TimeEvent>,
}

impl FiredTimer {
    /// Invoke the handler with the event.
    pub fn fire(&self) {
        self.handler.call(&self.event);
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn time_now(&self) -> DateTime<Utc>;
}

/// A clock whose time only moves when advanced explicitly.
pub trait VirtualClock: Clock {
    /// Whether any timer or alert is still scheduled.
    fn has_pending_timers(&self) -> bool;

    /// Fire time of the earliest scheduled timer.
    fn next_event_time(&self) -> Option<DateTime<Utc>>;

    /// Move the clock to `to` and return every timer due at or before it,
    /// in fire-time order. Handlers are not invoked.
    fn advance_time(&self, to: DateTime<Utc>) -> Vec<FiredTimer>;
}
