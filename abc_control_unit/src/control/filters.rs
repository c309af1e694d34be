//! Signal smoothing.
//!
//! Exponential moving average used for wheel distance, wheel speed and the
//! tilt rate:
//!
//! ```text
//! y[n] = (1 - w) · y[n-1] + w · x[n]
//! ```
//!
//! `w = 1` passes the input through unchanged; smaller weights trade latency
//! for noise rejection with O(1) memory.

/// Internal state of the exponential moving average.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmaState {
    /// Previous output.
    prev_output: f64,
}

impl EmaState {
    /// State seeded with an initial output.
    #[inline]
    pub const fn with_value(value: f64) -> Self {
        Self { prev_output: value }
    }

    /// Last output.
    #[inline]
    pub const fn value(&self) -> f64 {
        self.prev_output
    }

    /// Reset filter state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Apply one sample through the moving average.
///
/// A weight of exactly 1 returns `input` bit-for-bit.
#[inline]
pub fn ema_apply(state: &mut EmaState, weight: f64, input: f64) -> f64 {
    let output = if weight >= 1.0 {
        input
    } else {
        (1.0 - weight) * state.prev_output + weight * input
    };
    state.prev_output = output;
    output
}

// ─── Tests ──────────────────────────────────────────────────────────
