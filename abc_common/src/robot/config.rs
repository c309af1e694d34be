//! Robot configuration (immutable after startup).
//!
//! One TOML document describes the whole robot. Which controllers exist is
//! decided here, once, and the resulting struct is passed by reference into
//! every component constructor.
//!
//! All sections are optional; every numeric field has a default and is
//! bounds-checked by [`RobotConfig::validate`].

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    COUNTS_PER_REVOLUTION, CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN,
    DISTANCE_EMA_WEIGHT, ENCODER_WINDOW_LEN, ENCODER_WINDOW_MAX, MAX_PATH_SEGMENTS,
    OUTPUT_LIMIT, SPEED_EMA_WEIGHT, WHEEL_RADIUS_MM,
};

use super::pid::PidParameters;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete robot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RobotConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub wheel: WheelConfig,
    #[serde(default)]
    pub orientation: OrientationConfig,
    #[serde(default)]
    pub balance: BalanceConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub controllers: ControllersConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl RobotConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.wheel.validate().map_err(ConfigError::ValidationError)?;
        self.orientation
            .validate()
            .map_err(ConfigError::ValidationError)?;
        self.balance.validate().map_err(ConfigError::ValidationError)?;
        self.aggregator
            .validate()
            .map_err(ConfigError::ValidationError)?;
        self.controllers
            .validate()
            .map_err(ConfigError::ValidationError)?;
        self.simulation
            .validate()
            .map_err(ConfigError::ValidationError)?;
        Ok(())
    }
}

/// Check a loop period. `allow_zero` admits free-running loops.
fn check_period(name: &str, period_us: u64, allow_zero: bool) -> Result<(), String> {
    if allow_zero && period_us == 0 {
        return Ok(());
    }
    if !(CYCLE_TIME_US_MIN..=CYCLE_TIME_US_MAX).contains(&period_us) {
        return Err(format!(
            "{name} {period_us} out of range [{CYCLE_TIME_US_MIN}, {CYCLE_TIME_US_MAX}]"
        ));
    }
    Ok(())
}

fn check_weight(name: &str, w: f64) -> Result<(), String> {
    if !(w > 0.0 && w <= 1.0) {
        return Err(format!("{name} {w} out of range (0, 1]"));
    }
    Ok(())
}

fn check_finite(name: &str, v: f64) -> Result<(), String> {
    if !v.is_finite() {
        return Err(format!("{name} must be finite, got {v}"));
    }
    Ok(())
}

// ─── Wheel / Encoder ────────────────────────────────────────────────

/// Wheel geometry and encoder signal processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WheelConfig {
    /// Wheel radius [mm].
    #[serde(default = "default_radius")]
    pub radius_mm: f64,
    /// Encoder counts per wheel revolution.
    #[serde(default = "default_cpr")]
    pub counts_per_revolution: u32,
    /// Timestamp window length (ring size).
    #[serde(default = "default_window")]
    pub window_len: usize,
    /// EMA weight for distance (1.0 = unsmoothed).
    #[serde(default = "default_distance_w")]
    pub distance_ema_weight: f64,
    /// EMA weight for speed.
    #[serde(default = "default_speed_w")]
    pub speed_ema_weight: f64,
}

fn default_radius() -> f64 {
    WHEEL_RADIUS_MM
}
fn default_cpr() -> u32 {
    COUNTS_PER_REVOLUTION
}
fn default_window() -> usize {
    ENCODER_WINDOW_LEN
}
fn default_distance_w() -> f64 {
    DISTANCE_EMA_WEIGHT
}
fn default_speed_w() -> f64 {
    SPEED_EMA_WEIGHT
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            radius_mm: WHEEL_RADIUS_MM,
            counts_per_revolution: COUNTS_PER_REVOLUTION,
            window_len: ENCODER_WINDOW_LEN,
            distance_ema_weight: DISTANCE_EMA_WEIGHT,
            speed_ema_weight: SPEED_EMA_WEIGHT,
        }
    }
}

impl WheelConfig {
    /// Distance travelled per encoder count [mm].
    #[inline]
    pub fn mm_per_count(&self) -> f64 {
        2.0 * core::f64::consts::PI * self.radius_mm / self.counts_per_revolution as f64
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.radius_mm.is_finite() && self.radius_mm > 0.0) {
            return Err(format!("wheel.radius_mm must be > 0, got {}", self.radius_mm));
        }
        if self.counts_per_revolution == 0 {
            return Err("wheel.counts_per_revolution must be > 0".to_string());
        }
        if self.window_len < 2 || self.window_len > ENCODER_WINDOW_MAX {
            return Err(format!(
                "wheel.window_len {} out of range [2, {ENCODER_WINDOW_MAX}]",
                self.window_len
            ));
        }
        check_weight("wheel.distance_ema_weight", self.distance_ema_weight)?;
        check_weight("wheel.speed_ema_weight", self.speed_ema_weight)?;
        Ok(())
    }
}

// ─── Orientation ────────────────────────────────────────────────────

/// Tilt estimator tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrientationConfig {
    /// Complementary filter weight given to the integrated gyro.
    #[serde(default = "default_alpha")]
    pub complementary_alpha: f64,
    /// EMA weight applied to the gyro rate reported as `theta_deg_dot`.
    #[serde(default = "default_rate_w")]
    pub rate_ema_weight: f64,
}

fn default_alpha() -> f64 {
    0.98
}
fn default_rate_w() -> f64 {
    1.0
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            complementary_alpha: default_alpha(),
            rate_ema_weight: default_rate_w(),
        }
    }
}

impl OrientationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.complementary_alpha) {
            return Err(format!(
                "orientation.complementary_alpha {} out of range [0, 1]",
                self.complementary_alpha
            ));
        }
        check_weight("orientation.rate_ema_weight", self.rate_ema_weight)
    }
}

// ─── Balance ────────────────────────────────────────────────────────

/// Balance controller task settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceConfig {
    /// Loop period [µs]; 0 = as fast as the scheduler allows.
    #[serde(default = "default_balance_period")]
    pub period_us: u64,
    /// Warn if the I/O link is not attached after this long [ms].
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,
    /// Parameters in force before the tuning channel sends any.
    /// Absent = "not yet received": the controller holds its output.
    #[serde(default)]
    pub initial_parameters: Option<PidParameters>,
    /// Optional integral clamp. Absent = unbounded accumulation.
    #[serde(default)]
    pub integral_limit: Option<f64>,
}

fn default_balance_period() -> u64 {
    5_000
}
fn default_ready_timeout() -> u64 {
    5_000
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            period_us: default_balance_period(),
            ready_timeout_ms: default_ready_timeout(),
            initial_parameters: None,
            integral_limit: None,
        }
    }
}

impl BalanceConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_period("balance.period_us", self.period_us, true)?;
        if self.ready_timeout_ms == 0 {
            return Err("balance.ready_timeout_ms must be > 0".to_string());
        }
        if let Some(params) = &self.initial_parameters {
            params
                .validate()
                .map_err(|e| format!("balance.initial_parameters: {e}"))?;
        }
        if let Some(limit) = self.integral_limit {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(format!("balance.integral_limit must be > 0, got {limit}"));
            }
        }
        Ok(())
    }
}

// ─── Aggregator ─────────────────────────────────────────────────────

/// Grand controller tick settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregatorConfig {
    /// Tick period [µs].
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u64,
    /// Symmetric clamp on the summed command.
    #[serde(default = "default_output_limit")]
    pub output_limit: f64,
    /// CPU core for the tick thread (`rt` feature only).
    #[serde(default)]
    pub cpu_core: Option<usize>,
}

fn default_cycle_time_us() -> u64 {
    CYCLE_TIME_US
}
fn default_output_limit() -> f64 {
    OUTPUT_LIMIT
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            output_limit: OUTPUT_LIMIT,
            cpu_core: None,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_period("aggregator.cycle_time_us", self.cycle_time_us, false)?;
        if !(self.output_limit.is_finite() && self.output_limit > 0.0) {
            return Err(format!(
                "aggregator.output_limit must be > 0, got {}",
                self.output_limit
            ));
        }
        Ok(())
    }
}

// ─── Controllers ────────────────────────────────────────────────────

/// Which behaviour controllers exist, and their settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllersConfig {
    /// Run the balance controller.
    #[serde(default = "default_true")]
    pub balance: bool,
    #[serde(default)]
    pub centering: Option<CenteringConfig>,
    #[serde(default)]
    pub scripted_path: Option<ScriptedPathConfig>,
    #[serde(default)]
    pub back_and_forth: Option<BackAndForthConfig>,
    #[serde(default)]
    pub manual: Option<ManualConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            balance: true,
            centering: None,
            scripted_path: None,
            back_and_forth: None,
            manual: None,
        }
    }
}

impl ControllersConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(c) = &self.centering {
            c.validate()?;
        }
        if let Some(c) = &self.scripted_path {
            c.validate()?;
        }
        if let Some(c) = &self.back_and_forth {
            c.validate()?;
        }
        if let Some(c) = &self.manual {
            check_period("controllers.manual.period_us", c.period_us, false)?;
        }
        Ok(())
    }
}

fn default_aux_period() -> u64 {
    20_000
}

/// Vision-centroid tracking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CenteringConfig {
    #[serde(default = "default_aux_period")]
    pub period_us: u64,
    /// Differential gain applied to the normalised target offset.
    #[serde(default = "default_turn_gain")]
    pub turn_gain: f64,
    /// Common-mode command while a target is tracked.
    #[serde(default)]
    pub forward_bias: f64,
    /// Observation age after which the target counts as lost [ms].
    #[serde(default = "default_lost_after")]
    pub lost_after_ms: u64,
    /// Spin command while searching for a target.
    #[serde(default = "default_search_speed")]
    pub search_speed: f64,
}

fn default_turn_gain() -> f64 {
    10.0
}
fn default_lost_after() -> u64 {
    500
}
fn default_search_speed() -> f64 {
    5.0
}

impl Default for CenteringConfig {
    fn default() -> Self {
        Self {
            period_us: default_aux_period(),
            turn_gain: default_turn_gain(),
            forward_bias: 0.0,
            lost_after_ms: default_lost_after(),
            search_speed: default_search_speed(),
        }
    }
}

impl CenteringConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_period("controllers.centering.period_us", self.period_us, false)?;
        check_finite("controllers.centering.turn_gain", self.turn_gain)?;
        check_finite("controllers.centering.forward_bias", self.forward_bias)?;
        check_finite("controllers.centering.search_speed", self.search_speed)?;
        if self.lost_after_ms == 0 {
            return Err("controllers.centering.lost_after_ms must be > 0".to_string());
        }
        Ok(())
    }
}

/// One timed segment of a scripted path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathSegment {
    /// Segment duration [ms].
    pub duration_ms: u64,
    pub left: f64,
    pub right: f64,
}

/// Fixed sequence of timed wheel commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedPathConfig {
    #[serde(default = "default_aux_period")]
    pub period_us: u64,
    /// Restart from the first segment after the last one.
    #[serde(default)]
    pub looped: bool,
    pub segments: heapless::Vec<PathSegment, MAX_PATH_SEGMENTS>,
}

impl ScriptedPathConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_period("controllers.scripted_path.period_us", self.period_us, false)?;
        if self.segments.is_empty() {
            return Err("controllers.scripted_path.segments must not be empty".to_string());
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.duration_ms == 0 {
                return Err(format!(
                    "controllers.scripted_path.segments[{i}].duration_ms must be > 0"
                ));
            }
            check_finite("controllers.scripted_path.segments.left", seg.left)?;
            check_finite("controllers.scripted_path.segments.right", seg.right)?;
        }
        Ok(())
    }
}

/// Alternating forward/backward drive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackAndForthConfig {
    #[serde(default = "default_aux_period")]
    pub period_us: u64,
    pub speed: f64,
    /// Time spent in each direction [ms].
    pub half_period_ms: u64,
}

impl BackAndForthConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_period("controllers.back_and_forth.period_us", self.period_us, false)?;
        check_finite("controllers.back_and_forth.speed", self.speed)?;
        if self.half_period_ms == 0 {
            return Err("controllers.back_and_forth.half_period_ms must be > 0".to_string());
        }
        Ok(())
    }
}

/// Relay of an externally set manual command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualConfig {
    #[serde(default = "default_aux_period")]
    pub period_us: u64,
}

// ─── Simulation ─────────────────────────────────────────────────────

/// Wheeled inverted pendulum used in place of the hardware link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Physics step [µs].
    #[serde(default = "default_sim_step")]
    pub step_us: u64,
    /// Encoder report period [µs].
    #[serde(default = "default_encoder_period")]
    pub encoder_period_us: u64,
    /// IMU report period [µs].
    #[serde(default = "default_imu_period")]
    pub imu_period_us: u64,
    /// Distance from axle to centre of mass [m].
    #[serde(default = "default_length")]
    pub pendulum_length_m: f64,
    /// Wheel acceleration per unit of command [mm/s²].
    #[serde(default = "default_accel_per_unit")]
    pub accel_per_unit_mm_s2: f64,
    /// Initial tilt [deg].
    #[serde(default = "default_initial_tilt")]
    pub initial_tilt_deg: f64,
    /// Delay before the link reports itself attached [ms].
    #[serde(default = "default_attach_delay")]
    pub attach_delay_ms: u64,
}

fn default_sim_step() -> u64 {
    1_000
}
fn default_encoder_period() -> u64 {
    5_000
}
fn default_imu_period() -> u64 {
    2_000
}
fn default_length() -> f64 {
    0.1
}
fn default_accel_per_unit() -> f64 {
    100.0
}
fn default_initial_tilt() -> f64 {
    3.0
}
fn default_attach_delay() -> u64 {
    200
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_us: default_sim_step(),
            encoder_period_us: default_encoder_period(),
            imu_period_us: default_imu_period(),
            pendulum_length_m: default_length(),
            accel_per_unit_mm_s2: default_accel_per_unit(),
            initial_tilt_deg: default_initial_tilt(),
            attach_delay_ms: default_attach_delay(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_period("simulation.step_us", self.step_us, false)?;
        check_period("simulation.encoder_period_us", self.encoder_period_us, false)?;
        check_period("simulation.imu_period_us", self.imu_period_us, false)?;
        if !(self.pendulum_length_m.is_finite() && self.pendulum_length_m > 0.0) {
            return Err(format!(
                "simulation.pendulum_length_m must be > 0, got {}",
                self.pendulum_length_m
            ));
        }
        check_finite("simulation.accel_per_unit_mm_s2", self.accel_per_unit_mm_s2)?;
        check_finite("simulation.initial_tilt_deg", self.initial_tilt_deg)?;
        Ok(())
    }
}
