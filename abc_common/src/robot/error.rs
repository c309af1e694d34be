//! Fault bitflags reported by controllers and the aggregator.
//!
//! None of these are fatal. They are collected per iteration or per tick for
//! diagnostics and logging only.

use bitflags::bitflags;

bitflags! {
    /// Per-tick / per-iteration fault flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultFlags: u16 {
        /// An output source returned an error this tick.
        const SOURCE_ERROR        = 0x0001;
        /// An output source panicked while being read.
        const SOURCE_PANIC        = 0x0002;
        /// An output source produced NaN/Inf.
        const NON_FINITE_OUTPUT   = 0x0004;
        /// The aggregated sum exceeded the output limit and was clamped.
        const OUTPUT_CLAMPED      = 0x0008;
        /// Tilt left the `setpoint ± max_abs_tilt` band.
        const TILT_OUT_OF_BAND    = 0x0010;
        /// Parameters not yet received from the tuning channel.
        const PARAMS_UNAVAILABLE  = 0x0020;
        /// Tick body exceeded the configured cycle time.
        const CYCLE_OVERRUN       = 0x0040;
        /// The actuator sink rejected the command.
        const SINK_ERROR          = 0x0080;
    }
}

impl FaultFlags {
    /// Flags that mean a contribution was dropped from this tick's sum.
    pub const DROPPED_CONTRIBUTION: Self = Self::from_bits_truncate(
        Self::SOURCE_ERROR.bits() | Self::SOURCE_PANIC.bits() | Self::NON_FINITE_OUTPUT.bits(),
    );

    /// Returns true if any contribution was dropped.
    #[inline]
    pub const fn dropped_contribution(&self) -> bool {
        self.intersects(Self::DROPPED_CONTRIBUTION)
    }
}

impl Default for FaultFlags {
    fn default() -> Self {
        Self::empty()
    }
}
