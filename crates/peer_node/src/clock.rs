//! Local monotonic clock

use contracts::SyncClock;
use tokio::time::Instant;

/// Seconds since construction, shifted by a fixed origin
///
/// Based on `tokio::time::Instant`, so it follows paused time in tests.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
    origin: f64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::with_origin(0.0)
    }

    /// Clock that reads `origin` right now
    pub fn with_origin(origin: f64) -> Self {
        Self {
            start: Instant::now(),
            origin,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin + self.start.elapsed().as_secs_f64()
    }
}
