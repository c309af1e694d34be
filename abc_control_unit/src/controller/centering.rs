//! Vision-centroid tracking.
//!
//! An external vision pipeline pushes [`TargetObservation`]s into a
//! [`TargetFeed`]. While the latest observation is fresh the controller
//! turns toward it:
//!
//! ```text
//! left  = bias - gain·offset
//! right = bias + gain·offset
//! ```
//!
//! Once the observation is older than `lost_after` the controller spins in
//! place, `(search_speed, -search_speed)`, until a target shows up again.

use std::sync::Arc;

use abc_common::hal::types::TargetObservation;
use abc_common::robot::config::CenteringConfig;
use abc_common::robot::types::WheelCommand;
use parking_lot::Mutex;
use tracing::info;

use super::{Controller, ControllerError};
use crate::clock::Clock;

/// Latest target reported by the vision pipeline.
#[derive(Debug, Default)]
pub struct TargetFeed {
    latest: Mutex<Option<TargetObservation>>,
}

impl TargetFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held observation.
    pub fn push(&self, observation: TargetObservation) {
        *self.latest.lock() = Some(observation);
    }

    pub fn latest(&self) -> Option<TargetObservation> {
        *self.latest.lock()
    }

    /// Forget the held observation.
    pub fn clear(&self) {
        *self.latest.lock() = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Tracking,
    Searching,
}

pub struct CenteringController {
    config: CenteringConfig,
    feed: Arc<TargetFeed>,
    clock: Arc<dyn Clock>,
    mode: Mode,
}

impl CenteringController {
    pub fn new(config: CenteringConfig, feed: Arc<TargetFeed>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            feed,
            clock,
            mode: Mode::Searching,
        }
    }

    /// True while a fresh target is being tracked.
    pub fn is_tracking(&self) -> bool {
        self.mode == Mode::Tracking
    }

    fn fresh_offset(&self) -> Option<f64> {
        let obs = self.feed.latest()?;
        let age = self.clock.now_nanos() - obs.timestamp_nanos;
        let lost_after = self.config.lost_after_ms as i64 * 1_000_000;
        (age <= lost_after && obs.offset.is_finite()).then(|| obs.offset.clamp(-1.0, 1.0))
    }
}

impl Controller for CenteringController {
    fn name(&self) -> &str {
        "centering"
    }

    fn step(&mut self) -> Result<WheelCommand, ControllerError> {
        match self.fresh_offset() {
            Some(offset) => {
                if self.mode == Mode::Searching {
                    info!(offset, "Target acquired");
                    self.mode = Mode::Tracking;
                }
                let turn = self.config.turn_gain * offset;
                let bias = self.config.forward_bias;
                Ok(WheelCommand::new(bias - turn, bias + turn))
            }
            None => {
                if self.mode == Mode::Tracking {
                    info!("Target lost, searching");
                    self.mode = Mode::Searching;
                }
                let s = self.config.search_speed;
                Ok(WheelCommand::new(s, -s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const MS: i64 = 1_000_000;

    fn setup(config: CenteringConfig) -> (CenteringController, Arc<TargetFeed>, Arc<ManualClock>) {
        let feed = Arc::new(TargetFeed::new());
        let clock = Arc::new(ManualClock::new(1_000 * MS));
        let c = CenteringController::new(config, Arc::clone(&feed), clock.clone());
        (c, feed, clock)
    }

    fn seen(at: i64, offset: f64) -> TargetObservation {
        TargetObservation {
            timestamp_nanos: at,
            offset,
        }
    }

    #[test]
    fn searches_without_target() {
        let (mut c, _, _) = setup(CenteringConfig::default());
        assert_eq!(c.step().unwrap(), WheelCommand::new(5.0, -5.0));
        assert!(!c.is_tracking());
    }

    #[test]
    fn turns_toward_fresh_target() {
        let (mut c, feed, _) = setup(CenteringConfig {
            forward_bias: 2.0,
            ..Default::default()
        });
        feed.push(seen(1_000 * MS, 0.5));
        assert_eq!(c.step().unwrap(), WheelCommand::new(2.0 - 5.0, 2.0 + 5.0));
        assert!(c.is_tracking());

        feed.push(seen(1_000 * MS, 0.0));
        assert_eq!(c.step().unwrap(), WheelCommand::symmetric(2.0));
    }

    #[test]
    fn offset_is_clamped_to_unit_range() {
        let (mut c, feed, _) = setup(CenteringConfig::default());
        feed.push(seen(1_000 * MS, -4.0));
        assert_eq!(c.step().unwrap(), WheelCommand::new(10.0, -10.0));
    }

    #[test]
    fn stale_target_falls_back_to_search() {
        let (mut c, feed, clock) = setup(CenteringConfig::default());
        feed.push(seen(1_000 * MS, 0.2));
        c.step().unwrap();
        assert!(c.is_tracking());

        clock.advance(500 * MS);
        c.step().unwrap();
        assert!(c.is_tracking());

        clock.advance(1);
        assert_eq!(c.step().unwrap(), WheelCommand::new(5.0, -5.0));
        assert!(!c.is_tracking());
    }

    #[test]
    fn non_finite_offset_counts_as_lost() {
        let (mut c, feed, _) = setup(CenteringConfig::default());
        feed.push(seen(1_000 * MS, f64::NAN));
        assert_eq!(c.step().unwrap(), WheelCommand::new(5.0, -5.0));
        feed.clear();
        assert!(feed.latest().is_none());
    }
}
