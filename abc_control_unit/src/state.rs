//! Controller task lifecycle.
//!
//! WaitingForStart → Running → Stopped. Stopped is terminal: a task is never
//! restarted, a new one is spawned instead.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a controller task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TaskState {
    /// Blocked on the readiness gate.
    #[default]
    WaitingForStart = 0,
    /// Executing one step per iteration.
    Running = 1,
    /// Loop exited (terminal).
    Stopped = 2,
}

impl TaskState {
    /// Decode from the atomic representation.
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::WaitingForStart),
            1 => Some(Self::Running),
            2 => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// Event that can trigger a task state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    /// Readiness gate opened.
    Ready,
    /// Cooperative stop requested.
    Stop,
}

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded, new state.
    Ok(TaskState),
    /// Transition rejected, reason.
    Rejected(&'static str),
}

/// Task state machine.
///
/// The current state lives in an atomic so that handles on other threads can
/// observe it without locking.
#[derive(Debug, Default)]
pub struct TaskStateMachine {
    state: AtomicU8,
}

impl TaskStateMachine {
    /// Create a state machine in WaitingForStart.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::WaitingForStart as u8),
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(TaskState::Stopped)
    }

    /// Attempt a transition given an event.
    pub fn handle_event(&self, event: TaskEvent) -> TransitionResult {
        use TaskEvent::*;
        use TaskState::*;

        let next = match (self.state(), event) {
            (WaitingForStart, Ready) => Running,
            (WaitingForStart, Stop) | (Running, Stop) => Stopped,
            (Running, Ready) => return TransitionResult::Rejected("already running"),
            (Stopped, _) => return TransitionResult::Rejected("task stopped (terminal)"),
        };

        self.state.store(next as u8, Ordering::Release);
        TransitionResult::Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_waiting() {
        let sm = TaskStateMachine::new();
        assert_eq!(sm.state(), TaskState::WaitingForStart);
    }

    #[test]
    fn ready_then_stop() {
        let sm = TaskStateMachine::new();
        assert_eq!(
            sm.handle_event(TaskEvent::Ready),
            TransitionResult::Ok(TaskState::Running)
        );
        assert_eq!(
            sm.handle_event(TaskEvent::Stop),
            TransitionResult::Ok(TaskState::Stopped)
        );
    }

    #[test]
    fn stop_while_waiting() {
        let sm = TaskStateMachine::new();
        assert_eq!(
            sm.handle_event(TaskEvent::Stop),
            TransitionResult::Ok(TaskState::Stopped)
        );
    }

    #[test]
    fn stopped_is_terminal() {
        let sm = TaskStateMachine::new();
        sm.handle_event(TaskEvent::Stop);
        assert!(matches!(
            sm.handle_event(TaskEvent::Ready),
            TransitionResult::Rejected(_)
        ));
        assert!(matches!(
            sm.handle_event(TaskEvent::Stop),
            TransitionResult::Rejected(_)
        ));
        assert_eq!(sm.state(), TaskState::Stopped);
    }

    #[test]
    fn double_ready_rejected() {
        let sm = TaskStateMachine::new();
        sm.handle_event(TaskEvent::Ready);
        assert!(matches!(
            sm.handle_event(TaskEvent::Ready),
            TransitionResult::Rejected(_)
        ));
        assert_eq!(sm.state(), TaskState::Running);
    }

    #[test]
    fn decode_round_trip() {
        for s in [TaskState::WaitingForStart, TaskState::Running, TaskState::Stopped] {
            assert_eq!(TaskState::from_u8(s as u8), Some(s));
        }
        assert_eq!(TaskState::from_u8(9), None);
    }
}
