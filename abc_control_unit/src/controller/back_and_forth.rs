//! Alternating forward/backward drive, switching every half period.

use std::sync::Arc;

use abc_common::robot::config::BackAndForthConfig;
use abc_common::robot::types::WheelCommand;

use super::{Controller, ControllerError};
use crate::clock::Clock;

pub struct BackAndForthController {
    speed: f64,
    half_period_nanos: i64,
    clock: Arc<dyn Clock>,
    started_at: Option<i64>,
}

impl BackAndForthController {
    pub fn new(config: &BackAndForthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            speed: config.speed,
            half_period_nanos: (config.half_period_ms as i64 * 1_000_000).max(1),
            clock,
            started_at: None,
        }
    }
}

impl Controller for BackAndForthController {
    fn name(&self) -> &str {
        "back_and_forth"
    }

    fn step(&mut self) -> Result<WheelCommand, ControllerError> {
        let now = self.clock.now_nanos();
        let start = *self.started_at.get_or_insert(now);
        let half = (now - start).max(0) / self.half_period_nanos;
        let v = if half % 2 == 0 { self.speed } else { -self.speed };
        Ok(WheelCommand::symmetric(v))
    }
}
