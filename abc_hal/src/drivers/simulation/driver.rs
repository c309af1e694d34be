//! Simulation driver: the actuator end of the simulated link.
//!
//! The aggregator writes into a [`SimLink`] through [`SimulationDriver`];
//! the runner reads the latest command each physics step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use abc_common::hal::driver::{ActuatorSink, HalError};
use abc_common::robot::types::WheelCommand;
use abc_common::slot::Slot;

/// State shared between the driver (writer) and the runner (reader).
#[derive(Debug, Default)]
pub struct SimLink {
    command: Slot<WheelCommand>,
    attached: AtomicBool,
    closed: AtomicBool,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest command written by the driver.
    pub fn command(&self) -> WheelCommand {
        self.command.load()
    }

    /// Number of accepted commands.
    pub fn commands_received(&self) -> u64 {
        self.command.version()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_attached(&self) {
        self.attached.store(true, Ordering::Release);
    }

    /// Refuse further commands.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// [`ActuatorSink`] writing into a [`SimLink`].
#[derive(Debug)]
pub struct SimulationDriver {
    link: Arc<SimLink>,
}

impl SimulationDriver {
    pub fn new(link: Arc<SimLink>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Arc<SimLink> {
        &self.link
    }
}

impl ActuatorSink for SimulationDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn set_wheel_output(&mut self, left: f64, right: f64) -> Result<(), HalError> {
        if self.link.is_closed() {
            return Err(HalError::NotAttached("simulation stopped".to_string()));
        }
        if !(left.is_finite() && right.is_finite()) {
            return Err(HalError::Rejected(format!(
                "non-finite command ({left}, {right})"
            )));
        }
        self.link.command.store(WheelCommand::new(left, right));
        Ok(())
    }
}
