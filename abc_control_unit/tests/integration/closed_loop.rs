//! Closed-loop balance against the simulated pendulum, in lockstep.
//!
//! Each physics step: the balance controller runs when its period is due,
//! the aggregator ticks, and the aggregated command drives the plant. No
//! threads, so the outcome is deterministic.

use std::sync::Arc;

use abc_common::hal::driver::OrientationSource;
use abc_common::robot::config::{
    AggregatorConfig, OrientationConfig, SimulationConfig, WheelConfig,
};
use abc_common::robot::pid::PidParameters;
use abc_common::robot::types::WheelCommand;
use abc_control_unit::aggregator::Aggregator;
use abc_control_unit::control::pid::IntegralMode;
use abc_control_unit::controller::balance::BalanceController;
use abc_control_unit::controller::{Controller, ControllerOutput};
use abc_control_unit::sensing::encoder::SharedWheelEncoder;
use abc_control_unit::sensing::orientation::SharedOrientation;
use abc_control_unit::tuning::{ParameterStore, TuningChannel};
use abc_hal::{Simulation, SimulationSummary};

/// Balance period in physics steps (5 ms at 1 ms steps).
const BALANCE_EVERY: u64 = 5;

struct Loop {
    sim: Simulation,
    wheels: Arc<SharedWheelEncoder>,
    orientation: Arc<SharedOrientation>,
    store: Arc<ParameterStore>,
    balance: BalanceController,
    output: Arc<ControllerOutput>,
    aggregator: Aggregator,
    commands: Vec<WheelCommand>,
}

impl Loop {
    fn new(initial_tilt_deg: f64, params: Option<PidParameters>) -> Self {
        let wheel = WheelConfig::default();
        let sim_cfg = SimulationConfig {
            initial_tilt_deg,
            ..Default::default()
        };
        let wheels = Arc::new(SharedWheelEncoder::new(&wheel));
        let orientation = Arc::new(SharedOrientation::new(&OrientationConfig::default()));
        let store = Arc::new(ParameterStore::new(params));
        let source: Arc<dyn OrientationSource> = orientation.clone();
        let balance = BalanceController::new(
            Arc::clone(&store),
            source,
            Arc::clone(&wheels),
            IntegralMode::Unbounded,
        );
        let output = Arc::new(ControllerOutput::new(balance.name()));
        let aggregator = Aggregator::new(&AggregatorConfig::default());
        aggregator.add_controller(output.clone());

        let mut sim = Simulation::new(&sim_cfg, &wheel);
        sim.publish_due(&*wheels, &*orientation);

        Self {
            sim,
            wheels,
            orientation,
            store,
            balance,
            output,
            aggregator,
            commands: Vec::new(),
        }
    }

    fn run(&mut self, steps: u64) -> SimulationSummary {
        for _ in 0..steps {
            if self.sim.steps() % BALANCE_EVERY == 0 {
                if let Ok(cmd) = self.balance.step() {
                    self.output.publish(cmd);
                }
            }
            let report = self.aggregator.tick();
            self.commands.push(report.command);
            self.sim
                .step(report.command, &*self.wheels, &*self.orientation);
        }
        self.sim.summary()
    }
}

fn stabilising() -> PidParameters {
    PidParameters {
        p_tilt: 5.0,
        d_tilt: -0.5,
        ..Default::default()
    }
}

#[test]
fn recovers_from_initial_tilt() {
    let mut l = Loop::new(3.0, Some(stabilising()));
    let summary = l.run(2_000);

    assert!(!summary.fallen, "fell over: {summary:?}");
    assert!(summary.final_theta_deg.abs() < 0.5, "{summary:?}");
    assert!(summary.max_abs_theta_deg < 5.0, "{summary:?}");
    assert!(l.orientation.theta_deg().abs() < 0.5);
    assert!(l.commands.iter().all(|c| c.left == c.right));
}

#[test]
fn recovers_from_either_side() {
    let mut l = Loop::new(-3.0, Some(stabilising()));
    let summary = l.run(2_000);
    assert!(!summary.fallen, "fell over: {summary:?}");
    assert!(summary.final_theta_deg.abs() < 0.5, "{summary:?}");
}

#[test]
fn first_command_drives_against_the_tilt() {
    let mut l = Loop::new(3.0, Some(stabilising()));
    l.run(1);
    // θ > 0 leans backward; the correction drives the wheels backward too.
    assert!(l.commands[0].left < 0.0);
}

#[test]
fn without_parameters_the_robot_falls() {
    let mut l = Loop::new(3.0, None);
    let summary = l.run(2_000);

    assert!(summary.fallen);
    assert!(l.commands.iter().all(|c| *c == WheelCommand::ZERO));
    assert_eq!(l.output.version(), 0);
}

#[test]
fn parameters_arriving_late_take_effect() {
    let mut l = Loop::new(1.0, None);
    l.run(20);
    assert!(l.commands.iter().all(|c| *c == WheelCommand::ZERO));

    let tuning = TuningChannel::new(Arc::clone(&l.store));
    tuning
        .submit(r#"{"p_tilt": 5.0, "d_tilt": -0.5}"#)
        .unwrap();

    let summary = l.run(2_000);
    assert!(!summary.fallen, "fell over: {summary:?}");
    assert!(summary.final_theta_deg.abs() < 0.5, "{summary:?}");
}

#[test]
fn encoder_feedback_tracks_wheel_travel() {
    let mut l = Loop::new(3.0, Some(stabilising()));
    l.run(500);

    let snap = l.wheels.snapshot();
    let (pos_l, _) = l.sim.plant().position_mm();
    let mm_per_count = WheelConfig::default().mm_per_count();
    assert!(snap.samples > 90);
    assert!((snap.distance_l - pos_l).abs() <= mm_per_count + 1e-9);
    assert_eq!(snap.distance_l, snap.distance_r);
}
