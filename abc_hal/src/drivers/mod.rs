//! Actuator sink implementations.

pub mod logging;
pub mod recording;
pub mod simulation;
