//! Raw readings delivered across the hardware boundary.

use serde::{Deserialize, Serialize};

/// One inertial measurement in the robot's sagittal plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuSample {
    /// Monotonic timestamp [ns].
    pub timestamp_nanos: i64,
    /// Acceleration along the forward axis [m/s²].
    pub accel_forward: f64,
    /// Acceleration along the body's vertical axis [m/s²].
    pub accel_vertical: f64,
    /// Pitch rate [deg/s].
    pub gyro_deg_s: f64,
}

/// Latest target seen by the external vision pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetObservation {
    /// Monotonic timestamp [ns].
    pub timestamp_nanos: i64,
    /// Normalised horizontal offset of the target centroid, -1 ..= 1, 0 = centred.
    /// A positive offset is corrected by driving the right wheel forward.
    pub offset: f64,
}
