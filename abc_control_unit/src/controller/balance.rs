//! Balance controller: keeps the robot upright.
//!
//! Per iteration:
//! 1. Snapshot the PID parameters (one `Arc`, never torn).
//! 2. Read the orientation pair and the left wheel speed.
//! 3. Evaluate [`balance_compute`] and emit a symmetric command.
//!
//! Missing parameters or non-finite inputs return an error; the task holds
//! the previous output and retries on the next iteration. Leaving the tilt
//! band only raises [`FaultFlags::TILT_OUT_OF_BAND`], the law is unchanged.

use std::sync::Arc;

use abc_common::hal::driver::OrientationSource;
use abc_common::robot::error::FaultFlags;
use abc_common::robot::types::WheelCommand;
use tracing::debug;

use super::{Controller, ControllerError};
use crate::control::pid::{BalanceLawState, BalanceTerms, IntegralMode, balance_compute};
use crate::sensing::encoder::SharedWheelEncoder;
use crate::tuning::ParameterStore;

pub struct BalanceController {
    params: Arc<ParameterStore>,
    orientation: Arc<dyn OrientationSource>,
    wheels: Arc<SharedWheelEncoder>,
    law: BalanceLawState,
    mode: IntegralMode,
    faults: FaultFlags,
    last_terms: BalanceTerms,
}

impl BalanceController {
    pub fn new(
        params: Arc<ParameterStore>,
        orientation: Arc<dyn OrientationSource>,
        wheels: Arc<SharedWheelEncoder>,
        mode: IntegralMode,
    ) -> Self {
        Self {
            params,
            orientation,
            wheels,
            law: BalanceLawState::default(),
            mode,
            faults: FaultFlags::empty(),
            last_terms: BalanceTerms::default(),
        }
    }

    /// Current tilt-error accumulator.
    pub fn integral(&self) -> f64 {
        self.law.integral()
    }

    /// Terms of the last successful evaluation.
    pub fn last_terms(&self) -> BalanceTerms {
        self.last_terms
    }

    pub fn integral_mode(&self) -> IntegralMode {
        self.mode
    }

    /// Clear the accumulator.
    pub fn reset(&mut self) {
        self.law.reset();
        self.last_terms = BalanceTerms::default();
    }
}

impl Controller for BalanceController {
    fn name(&self) -> &str {
        "balance"
    }

    fn step(&mut self) -> Result<WheelCommand, ControllerError> {
        self.faults = FaultFlags::empty();

        let Some(params) = self.params.snapshot() else {
            self.faults |= FaultFlags::PARAMS_UNAVAILABLE;
            return Err(ControllerError::ParametersUnavailable);
        };

        let orientation = self.orientation.sample();
        if !orientation.is_finite() {
            return Err(ControllerError::NonFiniteInput("orientation"));
        }
        let speed_l = self.wheels.snapshot().speed_l;
        if !speed_l.is_finite() {
            return Err(ControllerError::NonFiniteInput("left wheel speed"));
        }

        if !params.in_band(orientation.theta_deg) {
            self.faults |= FaultFlags::TILT_OUT_OF_BAND;
        }

        let terms = balance_compute(&mut self.law, &params, self.mode, &orientation, speed_l);
        self.last_terms = terms;
        debug!(
            theta = orientation.theta_deg,
            theta_dot = orientation.theta_deg_dot,
            speed_l,
            tilt_error = terms.tilt_error,
            integral = terms.integral,
            output = terms.output,
            "Balance step"
        );

        Ok(WheelCommand::symmetric(terms.output))
    }

    fn faults(&self) -> FaultFlags {
        self.faults
    }
}
