//! Scripted path: a fixed sequence of timed wheel commands.
//!
//! Time starts at the first step. After the last segment the controller
//! outputs (0, 0), or restarts from the first segment when looped.

use std::sync::Arc;

use abc_common::consts::MAX_PATH_SEGMENTS;
use abc_common::robot::config::{PathSegment, ScriptedPathConfig};
use abc_common::robot::types::WheelCommand;
use tracing::info;

use super::{Controller, ControllerError};
use crate::clock::Clock;

pub struct ScriptedPathController {
    segments: heapless::Vec<PathSegment, MAX_PATH_SEGMENTS>,
    looped: bool,
    total_nanos: i64,
    clock: Arc<dyn Clock>,
    started_at: Option<i64>,
    finished: bool,
}

impl ScriptedPathController {
    pub fn new(config: &ScriptedPathConfig, clock: Arc<dyn Clock>) -> Self {
        let total_nanos = config
            .segments
            .iter()
            .map(|s| s.duration_ms as i64 * 1_000_000)
            .sum();
        Self {
            segments: config.segments.clone(),
            looped: config.looped,
            total_nanos,
            clock,
            started_at: None,
            finished: false,
        }
    }

    /// True once a non-looped path has played out.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Segment active `elapsed` ns after the start, `None` past the end.
    fn segment_at(&self, elapsed: i64) -> Option<&PathSegment> {
        let mut end = 0i64;
        for seg in &self.segments {
            end += seg.duration_ms as i64 * 1_000_000;
            if elapsed < end {
                return Some(seg);
            }
        }
        None
    }
}

impl Controller for ScriptedPathController {
    fn name(&self) -> &str {
        "scripted_path"
    }

    fn step(&mut self) -> Result<WheelCommand, ControllerError> {
        if self.finished {
            return Ok(WheelCommand::ZERO);
        }
        let now = self.clock.now_nanos();
        let start = *self.started_at.get_or_insert(now);

        let mut elapsed = (now - start).max(0);
        if self.looped && self.total_nanos > 0 {
            elapsed %= self.total_nanos;
        }

        match self.segment_at(elapsed) {
            Some(seg) => Ok(WheelCommand::new(seg.left, seg.right)),
            None => {
                self.finished = true;
                info!(segments = self.segments.len(), "Scripted path finished");
                Ok(WheelCommand::ZERO)
            }
        }
    }
}
