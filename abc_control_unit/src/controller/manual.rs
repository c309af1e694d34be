//! Manual override: relays the command last set by a remote or UI.

use std::sync::Arc;

use abc_common::robot::types::WheelCommand;
use abc_common::slot::Slot;

use super::{Controller, ControllerError};

/// Command cell written by the external UI.
#[derive(Debug, Default)]
pub struct ManualInput {
    command: Slot<WheelCommand>,
}

impl ManualInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, command: WheelCommand) {
        self.command.store(command);
    }

    pub fn get(&self) -> WheelCommand {
        self.command.load()
    }
}

pub struct ManualController {
    input: Arc<ManualInput>,
}

impl ManualController {
    pub fn new(input: Arc<ManualInput>) -> Self {
        Self { input }
    }
}

impl Controller for ManualController {
    fn name(&self) -> &str {
        "manual"
    }

    fn step(&mut self) -> Result<WheelCommand, ControllerError> {
        let cmd = self.input.get();
        if !cmd.is_finite() {
            return Err(ControllerError::NonFiniteInput("manual command"));
        }
        Ok(cmd)
    }
}
