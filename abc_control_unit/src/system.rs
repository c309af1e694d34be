//! Assembly of the control core from one [`RobotConfig`].
//!
//! [`ControlSystem::new`] builds the shared inputs (encoder tracker,
//! orientation cell, parameter store, target feed, manual input, ready gate)
//! and the aggregator. [`ControlSystem::start`] spawns the aggregator loop
//! and one task per enabled controller, registering each task's output.
//!
//! Shutdown order: controller tasks first, then the aggregator, whose last
//! act is the (0, 0) command.

use std::sync::Arc;

use abc_common::hal::driver::{ActuatorSink, OrientationSource};
use abc_common::robot::config::RobotConfig;
use thiserror::Error;
use tracing::info;

use crate::aggregator::{Aggregator, AggregatorHandle, AggregatorSummary, SourceId};
use crate::clock::{Clock, MonotonicClock};
use crate::control::pid::IntegralMode;
use crate::controller::Controller;
use crate::controller::back_and_forth::BackAndForthController;
use crate::controller::balance::BalanceController;
use crate::controller::centering::{CenteringController, TargetFeed};
use crate::controller::manual::{ManualController, ManualInput};
use crate::controller::scripted::ScriptedPathController;
use crate::cycle::CycleError;
use crate::sensing::encoder::SharedWheelEncoder;
use crate::sensing::orientation::SharedOrientation;
use crate::task::{ReadyGate, TaskConfig, TaskError, TaskHandle, TaskSummary, spawn_controller_task};
use crate::tuning::{ParameterStore, TuningChannel};

/// Start-up failure of the control core.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("aggregator: {0}")]
    Aggregator(#[from] CycleError),
}

/// Inputs the hardware link, vision pipeline and UI write into.
#[derive(Debug, Clone)]
pub struct ControlInputs {
    pub wheels: Arc<SharedWheelEncoder>,
    pub orientation: Arc<SharedOrientation>,
    pub parameters: Arc<ParameterStore>,
    pub tuning: Arc<TuningChannel>,
    pub targets: Arc<TargetFeed>,
    pub manual: Arc<ManualInput>,
    pub gate: Arc<ReadyGate>,
}

/// Control core before start.
pub struct ControlSystem {
    config: RobotConfig,
    inputs: ControlInputs,
    aggregator: Arc<Aggregator>,
    clock: Arc<dyn Clock>,
}

impl ControlSystem {
    pub fn new(config: RobotConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    /// Build with an explicit time source for the time-driven controllers.
    pub fn with_clock(config: RobotConfig, clock: Arc<dyn Clock>) -> Self {
        let parameters = Arc::new(ParameterStore::new(config.balance.initial_parameters));
        let inputs = ControlInputs {
            wheels: Arc::new(SharedWheelEncoder::new(&config.wheel)),
            orientation: Arc::new(SharedOrientation::new(&config.orientation)),
            tuning: Arc::new(TuningChannel::new(Arc::clone(&parameters))),
            parameters,
            targets: Arc::new(TargetFeed::new()),
            manual: Arc::new(ManualInput::new()),
            gate: Arc::new(ReadyGate::new()),
        };
        let aggregator = Arc::new(Aggregator::new(&config.aggregator));
        Self {
            config,
            inputs,
            aggregator,
            clock,
        }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn inputs(&self) -> &ControlInputs {
        &self.inputs
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// One controller per enabled `[controllers]` entry, with its schedule.
    pub fn build_controllers(&self) -> Vec<(Box<dyn Controller>, TaskConfig)> {
        let c = &self.config.controllers;
        let ready_ms = self.config.balance.ready_timeout_ms;
        let task = |period_us| TaskConfig::from_period_us(period_us, ready_ms);
        let mut out: Vec<(Box<dyn Controller>, TaskConfig)> = Vec::new();

        if c.balance {
            let orientation: Arc<dyn OrientationSource> = self.inputs.orientation.clone();
            out.push((
                Box::new(BalanceController::new(
                    Arc::clone(&self.inputs.parameters),
                    orientation,
                    Arc::clone(&self.inputs.wheels),
                    IntegralMode::from_limit(self.config.balance.integral_limit),
                )),
                task(self.config.balance.period_us),
            ));
        }
        if let Some(cfg) = c.centering {
            out.push((
                Box::new(CenteringController::new(
                    cfg,
                    Arc::clone(&self.inputs.targets),
                    Arc::clone(&self.clock),
                )),
                task(cfg.period_us),
            ));
        }
        if let Some(cfg) = &c.scripted_path {
            out.push((
                Box::new(ScriptedPathController::new(cfg, Arc::clone(&self.clock))),
                task(cfg.period_us),
            ));
        }
        if let Some(cfg) = &c.back_and_forth {
            out.push((
                Box::new(BackAndForthController::new(cfg, Arc::clone(&self.clock))),
                task(cfg.period_us),
            ));
        }
        if let Some(cfg) = &c.manual {
            out.push((
                Box::new(ManualController::new(Arc::clone(&self.inputs.manual))),
                task(cfg.period_us),
            ));
        }
        out
    }

    /// Spawn the aggregator driving `sink` and every configured controller.
    pub fn start<S: ActuatorSink + 'static>(&self, sink: S) -> Result<RunningSystem, SystemError> {
        let aggregator_handle = self.aggregator.spawn(sink)?;
        let mut running = RunningSystem {
            aggregator: Arc::clone(&self.aggregator),
            aggregator_handle: Some(aggregator_handle),
            gate: Arc::clone(&self.inputs.gate),
            tasks: Vec::new(),
        };
        for (controller, task) in self.build_controllers() {
            running.add_controller(controller, task)?;
        }
        info!(
            controllers = ?self.aggregator.names(),
            cycle_us = self.aggregator.cycle_time().as_micros() as u64,
            "Control system started"
        );
        Ok(running)
    }
}

/// Counters collected at shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub tasks: Vec<(String, TaskSummary)>,
    pub aggregator: AggregatorSummary,
}

/// Control core after start. Dropping it performs the shutdown sequence.
pub struct RunningSystem {
    aggregator: Arc<Aggregator>,
    aggregator_handle: Option<AggregatorHandle>,
    gate: Arc<ReadyGate>,
    tasks: Vec<(TaskHandle, SourceId)>,
}

impl RunningSystem {
    /// Spawn and register one more controller while the aggregator runs.
    pub fn add_controller(
        &mut self,
        controller: Box<dyn Controller>,
        task: TaskConfig,
    ) -> Result<SourceId, SystemError> {
        let handle = spawn_controller_task(controller, Arc::clone(&self.gate), task)?;
        let id = self.aggregator.add_controller(handle.output().clone());
        self.tasks.push((handle, id));
        Ok(id)
    }

    /// Stop one controller and drop its contribution. `None` if unknown.
    pub fn remove_controller(&mut self, id: SourceId) -> Option<TaskSummary> {
        let pos = self.tasks.iter().position(|(_, sid)| *sid == id)?;
        let (handle, _) = self.tasks.remove(pos);
        self.aggregator.remove_controller(id);
        Some(handle.stop())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskHandle> {
        self.tasks.iter().map(|(h, _)| h)
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Stop every task, then the aggregator (final zero command).
    pub fn shutdown(mut self) -> ShutdownReport {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for (handle, id) in self.tasks.drain(..) {
            let name = handle.name().to_string();
            report.tasks.push((name, handle.stop()));
            self.aggregator.remove_controller(id);
        }
        if let Some(handle) = self.aggregator_handle.take() {
            report.aggregator = handle.stop();
        }
        report
    }
}

impl Drop for RunningSystem {
    fn drop(&mut self) {
        if self.aggregator_handle.is_some() {
            self.shutdown_inner();
        }
    }
}
