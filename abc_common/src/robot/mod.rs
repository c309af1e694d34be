//! Robot domain types shared by the control unit and the HAL.
//!
//! - [`types`] - encoder/orientation samples and wheel commands
//! - [`pid`] - balance tuning parameters
//! - [`config`] - immutable robot configuration
//! - [`error`] - fault bitflags

pub mod config;
pub mod error;
pub mod pid;
pub mod types;
