//! Fixed-period pacing, cycle statistics and RT thread setup.
//!
//! ## RT Setup Sequence (`rt` feature)
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to the configured CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`: RT priority.
//!
//! Without the feature every step is a no-op and the loops run under the
//! normal scheduler.
//!
//! ## Pacing
//! [`Pacer`] sleeps to absolute deadlines (`start + n·period`) so jitter in one
//! iteration does not accumulate. After an overrun the schedule restarts from
//! the current instant instead of bursting to catch up.

use std::time::{Duration, Instant};

use thiserror::Error;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Aggregator tick timing, updated in O(1) without allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Duration of the most recent tick body [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub sum_cycle_ns: i64,
    /// Ticks whose deadline had already passed.
    pub overruns: u64,
    /// Worst oversleep past a deadline [ns].
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Mean tick duration [ns], 0 before the first tick.
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        match self.cycle_count {
            0 => 0,
            n => self.sum_cycle_ns / n as i64,
        }
    }
}

// ─── Log Throttle ───────────────────────────────────────────────────

/// Decides which occurrences of a repeating event get logged.
///
/// The first `burst` occurrences are logged, then every `every`-th.
#[derive(Debug, Clone, Copy)]
pub struct LogThrottle {
    count: u64,
    burst: u64,
    every: u64,
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(10, 1000)
    }
}

impl LogThrottle {
    pub const fn new(burst: u64, every: u64) -> Self {
        Self {
            count: 0,
            burst,
            every,
        }
    }

    /// Count one occurrence; returns true if it should be logged.
    #[inline]
    pub fn hit(&mut self) -> bool {
        self.count += 1;
        Self::should_log(self.count, self.burst, self.every)
    }

    /// Stateless form for counters kept elsewhere (e.g. atomics).
    #[inline]
    pub const fn should_log(count: u64, burst: u64, every: u64) -> bool {
        count <= burst || (every > 0 && count % every == 0)
    }

    /// Occurrences seen so far.
    #[inline]
    pub const fn count(&self) -> u64 {
        self.count
    }
}

// ─── Pacer ──────────────────────────────────────────────────────────

/// Absolute-deadline pacing for a fixed-period loop.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    next_deadline: Instant,
}

impl Pacer {
    /// Start pacing now; the first deadline is one period away.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_deadline: Instant::now() + period,
        }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadline the next wait will sleep towards.
    #[inline]
    pub fn deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Time left until the current deadline, then advance it by one period.
    ///
    /// Returns `None` if the deadline already passed (overrun); the schedule
    /// is then re-anchored at `now`.
    pub fn next_wait(&mut self) -> Option<Duration> {
        let now = Instant::now();
        let wait = self.next_deadline.checked_duration_since(now);
        self.next_deadline = match wait {
            Some(_) => self.next_deadline + self.period,
            None => now + self.period,
        };
        wait
    }

    /// Block until the next deadline. Returns false on overrun.
    pub fn wait(&mut self) -> bool {
        match self.next_wait() {
            Some(d) => {
                std::thread::sleep(d);
                true
            }
            None => false,
        }
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Aggregator thread start-up errors.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("RT setup error: {0}")]
    RtSetup(String),

    #[error("thread spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Default SCHED_FIFO priority for the aggregator thread.
pub const RT_PRIORITY_DEFAULT: i32 = 80;

#[cfg(feature = "rt")]
mod rt {
    use super::CycleError;
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::sys::mman::{MlockallFlags, mlockall};
    use nix::unistd::Pid;

    pub(super) fn lock_memory() -> Result<(), CycleError> {
        mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
            .map_err(|e| CycleError::RtSetup(format!("mlockall: {e}")))
    }

    /// Fault in 256 KiB of stack up front.
    pub(super) fn prefault_stack() {
        let mut buf = [0u8; 256 * 1024];
        for byte in buf.iter_mut() {
            // SAFETY: `byte` is a valid, aligned, exclusive reference into `buf`.
            unsafe { core::ptr::write_volatile(byte, 0xFF) };
        }
        core::hint::black_box(&buf);
    }

    pub(super) fn pin_to(cpu: usize) -> Result<(), CycleError> {
        let mut set = CpuSet::new();
        set.set(cpu)
            .map_err(|e| CycleError::RtSetup(format!("cpu {cpu}: {e}")))?;
        sched_setaffinity(Pid::from_raw(0), &set)
            .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity: {e}")))
    }

    pub(super) fn fifo(priority: i32) -> Result<(), CycleError> {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        // SAFETY: `param` is a valid sched_param; pid 0 targets the calling thread.
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
            let err = std::io::Error::last_os_error();
            return Err(CycleError::RtSetup(format!(
                "SCHED_FIFO priority {priority}: {err}"
            )));
        }
        Ok(())
    }
}

#[cfg(not(feature = "rt"))]
mod rt {
    use super::CycleError;

    pub(super) fn lock_memory() -> Result<(), CycleError> {
        Ok(())
    }

    pub(super) fn prefault_stack() {}

    pub(super) fn pin_to(_cpu: usize) -> Result<(), CycleError> {
        Ok(())
    }

    pub(super) fn fifo(_priority: i32) -> Result<(), CycleError> {
        Ok(())
    }
}

/// Prepare the calling thread for real-time ticking.
///
/// Locks memory, prefaults the stack, pins to `cpu_core` if given and
/// switches to SCHED_FIFO. Every step is a no-op without the `rt` feature.
pub fn rt_setup(cpu_core: Option<usize>, rt_priority: i32) -> Result<(), CycleError> {
    rt::lock_memory()?;
    rt::prefault_stack();
    if let Some(cpu) = cpu_core {
        rt::pin_to(cpu)?;
    }
    rt::fifo(rt_priority)
}

/// Whether the binary was built with the `rt` feature.
pub const fn rt_enabled() -> bool {
    cfg!(feature = "rt")
}

// ─── Tests ──────────────────────────────────────────────────────────
