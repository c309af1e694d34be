//! # Balance-bot HAL Library
//!
//! Actuator sinks and the simulated hardware link.
//!
//! Every sink implements `ActuatorSink` from `abc_common::hal::driver`; the
//! simulation additionally plays the part of the microcontroller link by
//! pushing encoder and IMU readings into the control core.
//!
//! # Module Structure
//!
//! - [`drivers`] - Sink implementations and the wheeled inverted-pendulum simulation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          abc_hal                             │
//! │  ┌──────────────┐   command    ┌──────────────────────────┐  │
//! │  │ Simulation   │◄─────────────│  SimulationDriver        │◄─┼── aggregator
//! │  │ Runner       │              │  (ActuatorSink)          │  │
//! │  │  └ Pendulum  │              └──────────────────────────┘  │
//! │  │    Plant     │── encoder counts ──► WheelDataListener ────┼─► tracker
//! │  │              │── IMU samples ─────► ImuListener ──────────┼─► tilt estimator
//! │  └──────────────┘                                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod drivers;

pub use drivers::logging::LoggingSink;
pub use drivers::recording::RecordingSink;
pub use drivers::simulation::{
    PendulumPlant, SimLink, Simulation, SimulationDriver, SimulationHandle, SimulationRunner,
    SimulationSummary,
};
