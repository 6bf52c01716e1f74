//! Tokio-backed timer and clock.
//!
//! Ticks and retries are delivered as [`Signal`]s on the runtime channel,
//! so they are processed in order with every other event.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use quicktimer_domain::time::{EpochSeconds, now_epoch};

use crate::ports::{Clock, IntervalTimer, SurfaceId};
use crate::runtime::{Signal, SignalSender};

/// [`IntervalTimer`] that spawns one tokio task per running interval.
#[derive(Debug, Clone)]
pub struct TokioIntervalTimer {
    sender: SignalSender,
}

impl TokioIntervalTimer {
    #[must_use]
    pub fn new(sender: SignalSender) -> Self {
        Self { sender }
    }
}

impl IntervalTimer for TokioIntervalTimer {
    type Handle = JoinHandle<()>;

    fn start(&mut self, surface: SurfaceId, period: Duration) -> JoinHandle<()> {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if sender.send(Signal::Tick(surface)).is_err() {
                    break;
                }
            }
        })
    }

    fn stop(&mut self, handle: JoinHandle<()>) {
        handle.abort();
    }

    fn retry_after(&mut self, delay: Duration) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(Signal::RetryTick);
        });
    }
}

/// Epoch clock that advances with tokio time, so paused-time tests see
/// countdowns move.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: EpochSeconds,
    started: Instant,
}

impl TokioClock {
    #[must_use]
    pub fn new() -> Self {
        Self::anchored(now_epoch())
    }

    /// Report `anchor` now and advance from there.
    #[must_use]
    pub fn anchored(anchor: EpochSeconds) -> Self {
        Self {
            anchor,
            started: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> EpochSeconds {
        self.anchor + self.started.elapsed().as_secs_f64()
    }
}
