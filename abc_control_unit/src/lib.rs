//! # Balance-bot Control Unit Library
//!
//! Control core of a two-wheeled self-balancing robot. Encoder and IMU
//! readings are pushed in by the hardware link; independent controllers
//! compute wheel commands on their own threads; a fixed-tick aggregator sums
//! their latest outputs and drives the actuator.
//!
//! ## Data Flow
//!
//! ```text
//!  encoder ──► WheelEncoderTracker ─┐
//!  IMU ──────► TiltEstimator ───────┼─► BalanceController ──► output slot ─┐
//!  tuning ───► ParameterStore ──────┘                                      │
//!  vision ───► TargetFeed ────────────► CenteringController ─► output slot ─┼─► Aggregator ─► ActuatorSink
//!  clock ─────────────────────────────► Scripted / BackAndForth ► slots ───┤
//!  UI ───────► ManualInput ───────────► ManualController ────► output slot ─┘
//! ```
//!
//! ## Concurrency
//!
//! Controller outputs are single-writer latest-value slots; the aggregator
//! never waits on a controller and accepts that outputs stem from different
//! instants. Tuning parameters are swapped as whole immutable snapshots.

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod control;
pub mod controller;
pub mod cycle;
pub mod sensing;
pub mod state;
pub mod system;
pub mod task;
pub mod tuning;
