//! Monotonic time source for time-driven controllers.
//!
//! Timestamps are nanoseconds on the same base as the hardware link's
//! encoder and IMU timestamps.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Monotonic nanosecond clock.
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> i64;
}

/// Process-wide monotonic clock, zero at first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    fn epoch() -> Instant {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        *EPOCH.get_or_init(Instant::now)
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> i64 {
        Self::epoch().elapsed().as_nanos() as i64
    }
}

/// Manually advanced clock for deterministic stepping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub const fn new(start_nanos: i64) -> Self {
        Self {
            now: AtomicI64::new(start_nanos),
        }
    }

    pub fn set(&self, nanos: i64) {
        self.now.store(nanos, Ordering::Release);
    }

    pub fn advance(&self, nanos: i64) {
        self.now.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}
