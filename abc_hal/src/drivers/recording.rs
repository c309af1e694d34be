//! Sink that records every command for later inspection.

use std::sync::Arc;

use abc_common::prelude::*;
use parking_lot::Mutex;

/// Appends every command to a shared log.
///
/// Clones share the same log, so a test can keep one clone while the
/// aggregator thread owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    commands: Arc<Mutex<Vec<WheelCommand>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all commands received so far.
    pub fn commands(&self) -> Vec<WheelCommand> {
        self.commands.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<WheelCommand> {
        self.commands.lock().last().copied()
    }
}

impl ActuatorSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn set_wheel_output(&mut self, left: f64, right: f64) -> Result<(), HalError> {
        self.commands.lock().push(WheelCommand::new(left, right));
        Ok(())
    }
}
