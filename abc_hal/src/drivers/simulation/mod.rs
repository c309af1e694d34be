//! Simulation driver module.
//!
//! Stands in for the microcontroller link during development and testing:
//! a wheeled inverted pendulum driven by the aggregated wheel command.

mod driver;
mod physics;
mod runner;

pub use driver::{SimLink, SimulationDriver};
pub use physics::{GRAVITY, PendulumPlant};
pub use runner::{Simulation, SimulationHandle, SimulationRunner, SimulationSummary};
