use core::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Enforces a minimum wall-clock interval between cycle starts.
///
/// The first cycle starts immediately. A cycle that overruns the interval is
/// followed by the next one right away, never by a burst of catch-up cycles.
#[derive(Debug)]
pub struct Pacer {
    interval: Interval,
}

impl Pacer {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period.max(Duration::from_millis(1)));

        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { interval }
    }

    /// Waits until the next cycle may start. Returns `false` once `cancel`
    /// fires, in which case the loop should exit.
    pub async fn ready(&mut self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            _ = self.interval.tick() => !cancel.is_cancelled(),
        }
    }
}
