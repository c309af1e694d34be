//! Balance law: PID on tilt plus a proportional wheel-speed term.
//!
//! ```text
//! e_t    = set_point_deg - theta_deg
//! e_w    = 0 - speed_l
//! int_e += e_t
//! out    = p_tilt·e_t + p_wheel·e_w + i_tilt·int_e + d_tilt·theta_deg_dot
//! ```
//!
//! The integral is a plain per-iteration sum (no `dt` scaling) and is not
//! clamped unless [`IntegralMode::Clamped`] is selected.

use abc_common::robot::pid::PidParameters;
use abc_common::robot::types::OrientationSample;

/// Integral accumulation policy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum IntegralMode {
    /// Accumulate without bound.
    #[default]
    Unbounded,
    /// Keep the accumulator within `±limit`.
    Clamped { limit: f64 },
}

impl IntegralMode {
    /// Mode from an optional configured limit.
    pub fn from_limit(limit: Option<f64>) -> Self {
        match limit {
            Some(limit) => Self::Clamped { limit },
            None => Self::Unbounded,
        }
    }
}

/// Internal state of the balance law.
///
/// Preserves the tilt-error accumulator across iterations.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceLawState {
    /// Accumulated tilt error [deg·iterations].
    integral: f64,
}

impl BalanceLawState {
    /// Current accumulator value.
    #[inline]
    pub const fn integral(&self) -> f64 {
        self.integral
    }

    /// Reset all internal state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Individual terms of one evaluation, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BalanceTerms {
    /// Tilt error [deg].
    pub tilt_error: f64,
    /// Wheel-speed error [mm/s].
    pub wheel_error: f64,
    /// Accumulator after this iteration.
    pub integral: f64,
    /// Resulting symmetric command.
    pub output: f64,
}

/// Evaluate the balance law once.
///
/// # Arguments
/// - `state`: Mutable law state (integral accumulator).
/// - `params`: Consistent parameter snapshot for this iteration.
/// - `mode`: Integral accumulation policy.
/// - `orientation`: Tilt and tilt rate read at the start of the iteration.
/// - `speed_l`: Left wheel speed [mm/s].
#[inline]
pub fn balance_compute(
    state: &mut BalanceLawState,
    params: &PidParameters,
    mode: IntegralMode,
    orientation: &OrientationSample,
    speed_l: f64,
) -> BalanceTerms {
    let tilt_error = params.set_point_deg - orientation.theta_deg;
    let wheel_error = 0.0 - speed_l;

    state.integral += tilt_error;
    if let IntegralMode::Clamped { limit } = mode {
        state.integral = state.integral.clamp(-limit, limit);
    }

    let output = params.p_tilt * tilt_error
        + params.p_wheel * wheel_error
        + params.i_tilt * state.integral
        + params.d_tilt * orientation.theta_deg_dot;

    BalanceTerms {
        tilt_error,
        wheel_error,
        integral: state.integral,
        output,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
