//! Balance-bot Common Library
//!
//! Shared data model, configuration loading and hardware contracts for all
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`robot`] - Samples, wheel commands, tuning parameters, robot config, fault flags
//! - [`hal`] - Orientation source, wheel data listener and actuator sink traits
//! - [`slot`] - Single-slot latest-value cell
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide constants
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod robot;
pub mod slot;
