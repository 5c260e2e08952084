//! Wall clock for live trading.

use chrono::{DateTime, Utc};

use crate::application::ports::Clock;

/// System UTC clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveClock;

impl Clock for LiveClock {
    fn time_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_wall_time() {
        let before = Utc::now();
        let now = LiveClock.time_now();
        assert!(now >= before);
        assert!(now <= Utc::now());
    }
}
