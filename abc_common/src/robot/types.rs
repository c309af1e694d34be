//! Sensor samples and wheel commands.
//!
//! `WheelCommand` is both the per-controller output and the aggregated
//! command sent to the actuator. Units are duty-cycle-like and bounded by
//! the aggregator's output limit.

use core::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// One raw encoder reading pushed by the hardware link.
///
/// Counts are cumulative and direction-signed. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncoderSample {
    /// Monotonic timestamp [ns].
    pub timestamp_nanos: i64,
    /// Cumulative left wheel count.
    pub count_left: i64,
    /// Cumulative right wheel count.
    pub count_right: i64,
}

/// Tilt snapshot read once per balance iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationSample {
    /// Tilt from vertical [deg], 0 = upright.
    pub theta_deg: f64,
    /// Angular velocity [deg/s].
    pub theta_deg_dot: f64,
}

const_assert_eq!(core::mem::size_of::<OrientationSample>(), 16);

impl OrientationSample {
    /// Returns true if both fields are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.theta_deg.is_finite() && self.theta_deg_dot.is_finite()
    }
}

/// Differential wheel command (2 × f64 = 16 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelCommand {
    /// Left wheel command.
    pub left: f64,
    /// Right wheel command.
    pub right: f64,
}

const_assert_eq!(core::mem::size_of::<WheelCommand>(), 16);

impl WheelCommand {
    /// The fail-safe stop command.
    pub const ZERO: Self = Self {
        left: 0.0,
        right: 0.0,
    };

    /// Command with independent left/right values.
    #[inline]
    pub const fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Same value on both wheels (no turning component).
    #[inline]
    pub const fn symmetric(value: f64) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Returns true if both fields are finite (not NaN, not Inf).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }

    /// Clamp both wheels to `±limit`.
    #[inline]
    pub fn clamped(self, limit: f64) -> Self {
        Self {
            left: self.left.clamp(-limit, limit),
            right: self.right.clamp(-limit, limit),
        }
    }
}

impl Add for WheelCommand {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
        }
    }
}

impl AddAssign for WheelCommand {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}
