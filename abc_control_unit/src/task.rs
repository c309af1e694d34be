//! Controller task runner.
//!
//! Each controller runs on its own thread with its own period:
//!
//! ```text
//! WaitingForStart ──(gate ready)──► Running ──(stop)──► Stopped
//!        └──────────────(stop)───────────────────────────┘
//! ```
//!
//! The readiness gate is a condition variable with bounded waits; a wait
//! that times out is logged and retried until the gate opens or the task is
//! stopped. While running, every successful step is published into the
//! task's [`ControllerOutput`]. Errors and panics inside `step()` are logged
//! and the previous output is held.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::controller::{Controller, ControllerOutput};
use crate::cycle::{LogThrottle, Pacer};
use crate::state::{TaskEvent, TaskState, TaskStateMachine};

/// Task start-up failure.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to spawn controller thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

// ─── Stop Token ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StopInner {
    stopped: Mutex<bool>,
    cv: Condvar,
}

/// Cooperative cancellation flag with an interruptible sleep.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop and wake any sleeper.
    pub fn stop(&self) {
        *self.inner.stopped.lock() = true;
        self.inner.cv.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Sleep for `duration` unless stopped first. Returns true if stopped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut stopped = self.inner.stopped.lock();
        while !*stopped {
            if self.inner.cv.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

// ─── Ready Gate ─────────────────────────────────────────────────────

/// Outcome of one bounded wait on the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateWait {
    Ready,
    TimedOut,
    Cancelled,
}

/// One-shot readiness signal ("I/O subsystem attached").
#[derive(Debug, Default)]
pub struct ReadyGate {
    ready: Mutex<bool>,
    cv: Condvar,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate and release every waiter.
    pub fn set_ready(&self) {
        *self.ready.lock() = true;
        self.cv.notify_all();
        info!("Ready gate opened");
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.lock()
    }

    /// Block until ready, `timeout` elapsed, or `stop` was requested.
    ///
    /// `stop` must be followed by [`ReadyGate::wake_all`] for a waiter to
    /// observe it before the timeout.
    pub fn wait_ready(&self, timeout: Duration, stop: &StopToken) -> GateWait {
        let deadline = Instant::now() + timeout;
        let mut ready = self.ready.lock();
        loop {
            if *ready {
                return GateWait::Ready;
            }
            if stop.is_stopped() {
                return GateWait::Cancelled;
            }
            if self.cv.wait_until(&mut ready, deadline).timed_out() {
                return if *ready {
                    GateWait::Ready
                } else if stop.is_stopped() {
                    GateWait::Cancelled
                } else {
                    GateWait::TimedOut
                };
            }
        }
    }

    /// Wake waiters so they re-check their stop tokens.
    pub fn wake_all(&self) {
        let _guard = self.ready.lock();
        self.cv.notify_all();
    }
}

// ─── Task ───────────────────────────────────────────────────────────

/// Scheduling parameters of one controller task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    /// Step period; zero runs as fast as possible.
    pub period: Duration,
    /// Bound of a single wait on the ready gate.
    pub ready_timeout: Duration,
}

impl TaskConfig {
    pub fn from_period_us(period_us: u64, ready_timeout_ms: u64) -> Self {
        Self {
            period: Duration::from_micros(period_us),
            ready_timeout: Duration::from_millis(ready_timeout_ms),
        }
    }
}

/// Counters of a finished task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub iterations: u64,
    /// Steps that returned an error or a non-finite command.
    pub errors: u64,
    pub panics: u64,
}

struct TaskContext {
    state: Arc<TaskStateMachine>,
    output: Arc<ControllerOutput>,
    stop: StopToken,
    gate: Arc<ReadyGate>,
    config: TaskConfig,
}

/// Spawn `controller` on its own thread.
///
/// The returned handle exposes the task's output for registration with the
/// aggregator.
pub fn spawn_controller_task(
    controller: Box<dyn Controller>,
    gate: Arc<ReadyGate>,
    config: TaskConfig,
) -> Result<TaskHandle, TaskError> {
    let name = controller.name().to_string();
    let state = Arc::new(TaskStateMachine::new());
    let output = Arc::new(ControllerOutput::new(name.clone()));
    let stop = StopToken::new();

    let ctx = TaskContext {
        state: Arc::clone(&state),
        output: Arc::clone(&output),
        stop: stop.clone(),
        gate: Arc::clone(&gate),
        config,
    };

    let join = std::thread::Builder::new()
        .name(format!("abc-ctl-{name}"))
        .spawn(move || run_task(controller, ctx))
        .map_err(|source| TaskError::Spawn {
            name: name.clone(),
            source,
        })?;

    debug!(controller = %name, "Controller task spawned");
    Ok(TaskHandle {
        name,
        state,
        output,
        stop,
        gate,
        join: Some(join),
    })
}

fn run_task(mut controller: Box<dyn Controller>, ctx: TaskContext) -> TaskSummary {
    let mut summary = TaskSummary::default();
    let name = controller.name().to_string();

    loop {
        match ctx.gate.wait_ready(ctx.config.ready_timeout, &ctx.stop) {
            GateWait::Ready => break,
            GateWait::TimedOut => warn!(
                controller = %name,
                timeout_ms = ctx.config.ready_timeout.as_millis() as u64,
                "Still waiting for I/O to attach"
            ),
            GateWait::Cancelled => {
                ctx.state.handle_event(TaskEvent::Stop);
                info!(controller = %name, "Stopped before start");
                return summary;
            }
        }
    }

    ctx.state.handle_event(TaskEvent::Ready);
    info!(
        controller = %name,
        period_us = ctx.config.period.as_micros() as u64,
        "Controller running"
    );

    let mut pacer = (!ctx.config.period.is_zero()).then(|| Pacer::new(ctx.config.period));
    let mut fault_log = LogThrottle::default();

    while !ctx.stop.is_stopped() {
        summary.iterations += 1;

        let fault = match catch_unwind(AssertUnwindSafe(|| controller.step())) {
            Ok(Ok(cmd)) if cmd.is_finite() => {
                ctx.output.publish(cmd);
                None
            }
            Ok(Ok(cmd)) => {
                summary.errors += 1;
                Some(format!("non-finite command {cmd:?}"))
            }
            Ok(Err(e)) => {
                summary.errors += 1;
                Some(e.to_string())
            }
            Err(_) => {
                summary.panics += 1;
                Some("step panicked".to_string())
            }
        };
        if let Some(reason) = fault {
            if fault_log.hit() {
                warn!(
                    controller = %name,
                    occurrences = fault_log.count(),
                    "Holding previous output: {reason}"
                );
            }
        }

        match pacer.as_mut() {
            None => std::thread::yield_now(),
            Some(p) => {
                if let Some(wait) = p.next_wait() {
                    if ctx.stop.sleep(wait) {
                        break;
                    }
                }
            }
        }
    }

    ctx.state.handle_event(TaskEvent::Stop);
    info!(
        controller = %name,
        iterations = summary.iterations,
        errors = summary.errors,
        panics = summary.panics,
        "Controller stopped"
    );
    summary
}

/// Handle to a running controller task. Dropping it stops the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    state: Arc<TaskStateMachine>,
    output: Arc<ControllerOutput>,
    stop: StopToken,
    gate: Arc<ReadyGate>,
    join: Option<JoinHandle<TaskSummary>>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.state.state()
    }

    /// The task's output cell.
    pub fn output(&self) -> &Arc<ControllerOutput> {
        &self.output
    }

    /// Request stop, wake the gate and join the thread.
    pub fn stop(mut self) -> TaskSummary {
        self.shutdown()
    }

    fn shutdown(&mut self) -> TaskSummary {
        self.stop.stop();
        self.gate.wake_all();
        match self.join.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                error!(controller = %self.name, "Controller thread panicked");
                TaskSummary::default()
            }
            None => TaskSummary::default(),
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.shutdown();
        }
    }
}
