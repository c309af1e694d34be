//! Control law root.
//!
//! Balance law (tilt PID + wheel-speed term) and the moving-average filter
//! shared by the sensing pipeline.

pub mod filters;
pub mod pid;
