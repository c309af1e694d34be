//! Wheeled inverted pendulum.
//!
//! ```text
//! a         = accel_per_unit · (u_left + u_right) / 2        [mm/s²]
//! theta_ddot = (g / L) · sin(theta) + (a / 1000 / L) · cos(theta)
//! ```
//!
//! Positive theta leans the body backward, toward negative wheel travel:
//! driving the wheels forward pushes the body back. A positive `p_tilt`
//! therefore restores and `d_tilt` must be negative to damp.
//!
//! Integration is semi-implicit Euler. The body rests on the ground once
//! `|theta|` reaches 90°.

use core::f64::consts::FRAC_PI_2;

use abc_common::hal::types::ImuSample;
use abc_common::robot::config::{SimulationConfig, WheelConfig};
use abc_common::robot::types::WheelCommand;
use tracing::warn;

/// Standard gravity [m/s²].
pub const GRAVITY: f64 = 9.81;

/// Pendulum body on two independently driven wheels.
#[derive(Debug, Clone)]
pub struct PendulumPlant {
    length_m: f64,
    accel_per_unit: f64,
    mm_per_count: f64,
    /// Tilt [rad].
    theta: f64,
    /// Tilt rate [rad/s].
    theta_dot: f64,
    /// Wheel travel [mm], (left, right).
    position_mm: [f64; 2],
    /// Wheel speed [mm/s], (left, right).
    velocity_mm_s: [f64; 2],
    time_nanos: i64,
    fallen: bool,
}

impl PendulumPlant {
    pub fn new(sim: &SimulationConfig, wheel: &WheelConfig) -> Self {
        Self {
            length_m: sim.pendulum_length_m,
            accel_per_unit: sim.accel_per_unit_mm_s2,
            mm_per_count: wheel.mm_per_count(),
            theta: sim.initial_tilt_deg.to_radians(),
            theta_dot: 0.0,
            position_mm: [0.0; 2],
            velocity_mm_s: [0.0; 2],
            time_nanos: 0,
            fallen: false,
        }
    }

    /// Advance by `dt_nanos` under `command`. Non-finite commands act as zero.
    pub fn step(&mut self, command: WheelCommand, dt_nanos: i64) {
        if dt_nanos <= 0 {
            return;
        }
        let dt = dt_nanos as f64 * 1e-9;
        let command = if command.is_finite() {
            command
        } else {
            WheelCommand::ZERO
        };
        let accel = [
            self.accel_per_unit * command.left,
            self.accel_per_unit * command.right,
        ];

        if !self.fallen {
            let a = (accel[0] + accel[1]) / 2.0 / 1000.0;
            let theta_ddot = (GRAVITY / self.length_m) * self.theta.sin()
                + (a / self.length_m) * self.theta.cos();
            self.theta_dot += theta_ddot * dt;
            self.theta += self.theta_dot * dt;
            if self.theta.abs() >= FRAC_PI_2 {
                self.theta = self.theta.clamp(-FRAC_PI_2, FRAC_PI_2);
                self.theta_dot = 0.0;
                self.fallen = true;
                warn!(
                    t_ms = self.time_nanos / 1_000_000,
                    theta_deg = self.theta.to_degrees(),
                    "Simulated robot fell over"
                );
            }
        }

        for (v, (p, a)) in self
            .velocity_mm_s
            .iter_mut()
            .zip(self.position_mm.iter_mut().zip(accel))
        {
            *v += a * dt;
            *p += *v * dt;
        }
        self.time_nanos += dt_nanos;
    }

    /// Cumulative encoder counts, (left, right).
    pub fn encoder_counts(&self) -> (i64, i64) {
        (
            (self.position_mm[0] / self.mm_per_count).round() as i64,
            (self.position_mm[1] / self.mm_per_count).round() as i64,
        )
    }

    /// IMU reading consistent with the current tilt.
    ///
    /// The accelerometer sees gravity only, so its angle equals the true tilt.
    pub fn imu(&self) -> ImuSample {
        ImuSample {
            timestamp_nanos: self.time_nanos,
            accel_forward: GRAVITY * self.theta.sin(),
            accel_vertical: GRAVITY * self.theta.cos(),
            gyro_deg_s: self.theta_dot.to_degrees(),
        }
    }

    pub fn theta_deg(&self) -> f64 {
        self.theta.to_degrees()
    }

    pub fn theta_dot_deg(&self) -> f64 {
        self.theta_dot.to_degrees()
    }

    pub fn position_mm(&self) -> (f64, f64) {
        (self.position_mm[0], self.position_mm[1])
    }

    pub fn velocity_mm_s(&self) -> (f64, f64) {
        (self.velocity_mm_s[0], self.velocity_mm_s[1])
    }

    pub fn time_nanos(&self) -> i64 {
        self.time_nanos
    }

    pub fn has_fallen(&self) -> bool {
        self.fallen
    }
}
