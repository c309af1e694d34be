//! Hardware boundary: the contracts the control core consumes and drives.

pub mod driver;
pub mod types;
