//! System-wide constants for the balance-bot workspace.
//!
//! Single source of truth for numeric limits and defaults.
//! Imported by all crates; do not duplicate these values elsewhere.

/// Default aggregator cycle time in microseconds (1 kHz = 1000 µs).
pub const CYCLE_TIME_US: u64 = 1000;

/// Lower bound for any configured loop period [µs].
pub const CYCLE_TIME_US_MIN: u64 = 100;

/// Upper bound for any configured loop period [µs] (1 s).
pub const CYCLE_TIME_US_MAX: u64 = 1_000_000;

/// Default length of the encoder timestamp window.
pub const ENCODER_WINDOW_LEN: usize = 5;

/// Capacity of the fixed-size encoder timestamp window.
pub const ENCODER_WINDOW_MAX: usize = 16;

/// Default wheel radius [mm].
pub const WHEEL_RADIUS_MM: f64 = 30.0;

/// Default encoder resolution [counts per wheel revolution].
pub const COUNTS_PER_REVOLUTION: u32 = 128;

/// Default EMA weight for wheel distance (1.0 = unsmoothed).
pub const DISTANCE_EMA_WEIGHT: f64 = 1.0;

/// Default EMA weight for wheel speed.
pub const SPEED_EMA_WEIGHT: f64 = 0.05;

/// Default symmetric limit applied to the aggregated wheel command.
pub const OUTPUT_LIMIT: f64 = 100.0;

/// Maximum number of segments in a scripted path.
pub const MAX_PATH_SEGMENTS: usize = 32;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/robot.toml";
