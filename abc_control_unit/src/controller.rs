//! Controller abstraction.
//!
//! A controller is any unit that can compute one wheel command per step.
//! Controllers share no mutable state with each other: each one's result is
//! published into its own [`ControllerOutput`] by the task that drives it,
//! and the aggregator only ever reads those outputs.
//!
//! Concrete variants:
//! - [`balance`] - tilt PID balance law
//! - [`centering`] - turn toward a target reported by a vision pipeline
//! - [`scripted`] - fixed sequence of timed commands
//! - [`back_and_forth`] - alternating forward/backward drive
//! - [`manual`] - relay of an externally set command

pub mod back_and_forth;
pub mod balance;
pub mod centering;
pub mod manual;
pub mod scripted;

use abc_common::robot::error::FaultFlags;
use abc_common::robot::types::WheelCommand;
use abc_common::slot::Slot;
use thiserror::Error;

use crate::aggregator::{OutputSource, SourceError};

/// Step failure. The driving task logs it and holds the previous output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    /// Tuning parameters not yet received.
    #[error("parameters not yet available")]
    ParametersUnavailable,

    /// An input produced NaN/Inf.
    #[error("non-finite input: {0}")]
    NonFiniteInput(&'static str),

    /// An input has not produced any data yet.
    #[error("input not ready: {0}")]
    InputNotReady(&'static str),
}

/// One independently scheduled behaviour.
pub trait Controller: Send {
    /// Identifier used in logs and the aggregator registry.
    fn name(&self) -> &str;

    /// Compute the next command.
    fn step(&mut self) -> Result<WheelCommand, ControllerError>;

    /// Diagnostic flags raised by the last step.
    fn faults(&self) -> FaultFlags {
        FaultFlags::empty()
    }
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn step(&mut self) -> Result<WheelCommand, ControllerError> {
        (**self).step()
    }

    fn faults(&self) -> FaultFlags {
        (**self).faults()
    }
}

/// Latest command of one controller.
///
/// Single writer (the controller's task), any number of readers. Starts at
/// (0, 0) so a controller that has not stepped yet contributes nothing.
#[derive(Debug)]
pub struct ControllerOutput {
    name: String,
    latest: Slot<WheelCommand>,
}

impl ControllerOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latest: Slot::new(WheelCommand::ZERO),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overwrite with a freshly computed command.
    pub fn publish(&self, command: WheelCommand) {
        self.latest.store(command);
    }

    /// Last published command.
    pub fn latest(&self) -> WheelCommand {
        self.latest.load()
    }

    /// Number of publishes so far.
    pub fn version(&self) -> u64 {
        self.latest.version()
    }
}

impl OutputSource for ControllerOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn output(&self) -> Result<WheelCommand, SourceError> {
        Ok(self.latest.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(WheelCommand);

    impl Controller for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn step(&mut self) -> Result<WheelCommand, ControllerError> {
            Ok(self.0)
        }
    }

    #[test]
    fn output_starts_at_zero() {
        let out = ControllerOutput::new("balance");
        assert_eq!(out.latest(), WheelCommand::ZERO);
        assert_eq!(out.version(), 0);
        assert_eq!(OutputSource::name(&out), "balance");
    }

    #[test]
    fn output_is_last_write_wins() {
        let out = ControllerOutput::new("x");
        out.publish(WheelCommand::symmetric(1.0));
        out.publish(WheelCommand::new(2.0, -2.0));
        assert_eq!(out.output().unwrap(), WheelCommand::new(2.0, -2.0));
        assert_eq!(out.version(), 2);
    }

    #[test]
    fn boxed_controller_dispatches() {
        let mut c: Box<dyn Controller> = Box::new(Constant(WheelCommand::symmetric(3.0)));
        assert_eq!(c.name(), "constant");
        assert_eq!(c.step().unwrap(), WheelCommand::symmetric(3.0));
        assert!(c.faults().is_empty());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ControllerError::ParametersUnavailable.to_string(),
            "parameters not yet available"
        );
        assert!(
            ControllerError::NonFiniteInput("orientation")
                .to_string()
                .contains("orientation")
        );
    }
}
