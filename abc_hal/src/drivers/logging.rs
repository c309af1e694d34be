//! Sink that only logs commands (dry runs without hardware).

use abc_common::hal::driver::{ActuatorSink, HalError};
use tracing::{debug, info};

/// Logs every command at DEBUG and every `summary_every`-th at INFO.
#[derive(Debug)]
pub struct LoggingSink {
    summary_every: u64,
    count: u64,
}

impl LoggingSink {
    pub fn new(summary_every: u64) -> Self {
        Self {
            summary_every: summary_every.max(1),
            count: 0,
        }
    }

    /// Commands received so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ActuatorSink for LoggingSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn set_wheel_output(&mut self, left: f64, right: f64) -> Result<(), HalError> {
        self.count += 1;
        debug!(left, right, "Wheel output");
        if self.count % self.summary_every == 0 {
            info!(count = self.count, left, right, "Wheel output");
        }
        Ok(())
    }
}
