//! Clock port.

use quicktimer_domain::time::{EpochSeconds, now_epoch};

/// Source of "now" for countdown projections.
pub trait Clock {
    fn now(&self) -> EpochSeconds;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochSeconds {
        now_epoch()
    }
}
