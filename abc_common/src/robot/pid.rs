//! Balance controller tuning parameters.
//!
//! `PidParameters` is replaced as a whole on every tuning update; readers
//! always see one complete snapshot. `PidParametersPatch` carries a partial
//! update from the tuning channel.

use serde::{Deserialize, Serialize};

/// Gains and tilt band for the balance law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidParameters {
    /// Proportional gain on tilt error.
    #[serde(default, alias = "pTilt")]
    pub p_tilt: f64,
    /// Integral gain on accumulated tilt error.
    #[serde(default, alias = "iTilt")]
    pub i_tilt: f64,
    /// Gain on tilt angular velocity.
    #[serde(default, alias = "dTilt")]
    pub d_tilt: f64,
    /// Proportional gain on wheel-speed error.
    #[serde(default, alias = "pWheel")]
    pub p_wheel: f64,
    /// Target tilt [deg].
    #[serde(default, alias = "setPointDeg")]
    pub set_point_deg: f64,
    /// Half-width of the legal tilt band around the setpoint [deg].
    #[serde(default = "default_max_abs_tilt_deg", alias = "maxAbsTiltDeg")]
    pub max_abs_tilt_deg: f64,
}

fn default_max_abs_tilt_deg() -> f64 {
    20.0
}

impl Default for PidParameters {
    fn default() -> Self {
        Self {
            p_tilt: 0.0,
            i_tilt: 0.0,
            d_tilt: 0.0,
            p_wheel: 0.0,
            set_point_deg: 0.0,
            max_abs_tilt_deg: default_max_abs_tilt_deg(),
        }
    }
}

impl PidParameters {
    /// Check that every field is finite and the tilt band is non-negative.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("p_tilt", self.p_tilt),
            ("i_tilt", self.i_tilt),
            ("d_tilt", self.d_tilt),
            ("p_wheel", self.p_wheel),
            ("set_point_deg", self.set_point_deg),
            ("max_abs_tilt_deg", self.max_abs_tilt_deg),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(format!("{name} must be finite, got {value}"));
            }
        }
        if self.max_abs_tilt_deg < 0.0 {
            return Err(format!(
                "max_abs_tilt_deg must be >= 0, got {}",
                self.max_abs_tilt_deg
            ));
        }
        Ok(())
    }

    /// Legal tilt band `[setpoint - max, setpoint + max]`.
    #[inline]
    pub fn tilt_band(&self) -> (f64, f64) {
        (
            self.set_point_deg - self.max_abs_tilt_deg,
            self.set_point_deg + self.max_abs_tilt_deg,
        )
    }

    /// Returns true if `theta_deg` lies inside the tilt band.
    #[inline]
    pub fn in_band(&self, theta_deg: f64) -> bool {
        let (lo, hi) = self.tilt_band();
        theta_deg >= lo && theta_deg <= hi
    }

    /// Apply a partial update, returning the merged snapshot.
    pub fn merged(&self, patch: &PidParametersPatch) -> Self {
        Self {
            p_tilt: patch.p_tilt.unwrap_or(self.p_tilt),
            i_tilt: patch.i_tilt.unwrap_or(self.i_tilt),
            d_tilt: patch.d_tilt.unwrap_or(self.d_tilt),
            p_wheel: patch.p_wheel.unwrap_or(self.p_wheel),
            set_point_deg: patch.set_point_deg.unwrap_or(self.set_point_deg),
            max_abs_tilt_deg: patch.max_abs_tilt_deg.unwrap_or(self.max_abs_tilt_deg),
        }
    }
}

/// Partial parameter update. Absent fields keep their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PidParametersPatch {
    #[serde(default, alias = "pTilt")]
    pub p_tilt: Option<f64>,
    #[serde(default, alias = "iTilt")]
    pub i_tilt: Option<f64>,
    #[serde(default, alias = "dTilt")]
    pub d_tilt: Option<f64>,
    #[serde(default, alias = "pWheel")]
    pub p_wheel: Option<f64>,
    #[serde(default, alias = "setPointDeg")]
    pub set_point_deg: Option<f64>,
    #[serde(default, alias = "maxAbsTiltDeg")]
    pub max_abs_tilt_deg: Option<f64>,
}

impl PidParametersPatch {
    /// Returns true if the patch carries no field.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
