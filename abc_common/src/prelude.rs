//! Prelude module for common re-exports.
//!
//! ```rust
//! use abc_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::robot::config::RobotConfig;

// ─── Data Model ─────────────────────────────────────────────────────
pub use crate::robot::error::FaultFlags;
pub use crate::robot::pid::{PidParameters, PidParametersPatch};
pub use crate::robot::types::{EncoderSample, OrientationSample, WheelCommand};

// ─── Hardware Boundary ──────────────────────────────────────────────
pub use crate::hal::driver::{
    ActuatorSink, HalError, ImuListener, OrientationSource, WheelDataListener,
};
pub use crate::hal::types::{ImuSample, TargetObservation};

// ─── Latest-Value Cells ─────────────────────────────────────────────
pub use crate::slot::{Slot, SlotValue};

/// Default aggregator tick as Duration.
pub const DEFAULT_CYCLE_TIME: Duration =
    Duration::from_micros(crate::consts::CYCLE_TIME_US);
