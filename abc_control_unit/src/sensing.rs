//! Sensing pipeline root.
//!
//! Wheel encoder tracking and tilt estimation. Both are fed by the hardware
//! link through the listener traits in `abc_common::hal::driver` and read by
//! controllers once per iteration.

pub mod encoder;
pub mod orientation;
