//! External collaborator traits and HAL error type.
//!
//! This module defines:
//! - `OrientationSource` - pull-based tilt provider read once per balance iteration
//! - `WheelDataListener` - push-based sink for encoder readings from the I/O link
//! - `ImuListener` - push-based sink for inertial samples
//! - `ActuatorSink` - receiver of the final (left, right) wheel command
//! - `HalError` - error type for sink and link operations

use thiserror::Error;

use super::types::ImuSample;
use crate::robot::types::{EncoderSample, OrientationSample, WheelCommand};

/// Error types for hardware boundary operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Link not attached yet, or already detached.
    #[error("I/O link not attached: {0}")]
    NotAttached(String),

    /// Hardware communication error.
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Command rejected by the actuator.
    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// Tilt provider.
///
/// Owned by the external orientation pipeline; the core never mutates it.
pub trait OrientationSource: Send + Sync {
    /// Tilt from vertical [deg].
    fn theta_deg(&self) -> f64;

    /// Angular velocity [deg/s].
    fn theta_deg_dot(&self) -> f64;

    /// Both values from the same instant.
    ///
    /// The default reads the two getters separately; implementations backed
    /// by a single cell should override it to return a consistent pair.
    fn sample(&self) -> OrientationSample {
        OrientationSample {
            theta_deg: self.theta_deg(),
            theta_deg_dot: self.theta_deg_dot(),
        }
    }
}

/// Receiver of encoder readings pushed by the hardware link.
///
/// Called whenever a reading arrives; the rate is hardware-determined.
pub trait WheelDataListener: Send + Sync {
    fn on_wheel_data_update(&self, timestamp_nanos: i64, count_left: i64, count_right: i64);

    /// Convenience wrapper taking a recorded sample.
    fn on_sample(&self, sample: &EncoderSample) {
        self.on_wheel_data_update(sample.timestamp_nanos, sample.count_left, sample.count_right);
    }
}

/// Receiver of raw inertial samples (feeds tilt estimation).
pub trait ImuListener: Send + Sync {
    fn on_imu_sample(&self, sample: &ImuSample);
}

/// Receiver of the final wheel command, called once per aggregator tick.
///
/// Units and range are implementation-defined; clamping is done by the caller.
pub trait ActuatorSink: Send {
    /// Returns the sink's identifier (e.g., "simulation", "log").
    fn name(&self) -> &'static str;

    fn set_wheel_output(&mut self, left: f64, right: f64) -> Result<(), HalError>;

    /// Convenience wrapper taking a command.
    fn send(&mut self, command: WheelCommand) -> Result<(), HalError> {
        self.set_wheel_output(command.left, command.right)
    }
}

impl<S: ActuatorSink + ?Sized> ActuatorSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn set_wheel_output(&mut self, left: f64, right: f64) -> Result<(), HalError> {
        (**self).set_wheel_output(left, right)
    }
}
