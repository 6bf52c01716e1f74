//! Timer port — periodic ticks per surface and the locate retry.

use std::time::Duration;

/// A visual surface that can own a countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    /// An injected detail panel, by instance number.
    Panel(u64),
    /// A configured timer card, by position.
    Card(usize),
}

/// Schedules ticks back into the engine's signal loop.
pub trait IntervalTimer {
    /// Running interval; dropping it need not stop it, [`stop`](Self::stop) must.
    type Handle;

    /// Tick `surface` every `period`, first tick one period from now.
    fn start(&mut self, surface: SurfaceId, period: Duration) -> Self::Handle;

    fn stop(&mut self, handle: Self::Handle);

    /// Deliver one locate retry after `delay`.
    fn retry_after(&mut self, delay: Duration);
}
