//! Full control system on real threads: start, gate, dynamic add/remove,
//! shutdown with the final stop command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use abc_common::robot::config::{
    BalanceConfig, ControllersConfig, ManualConfig, RobotConfig, SimulationConfig,
};
use abc_common::robot::pid::PidParameters;
use abc_common::robot::types::WheelCommand;
use abc_control_unit::controller::manual::{ManualController, ManualInput};
use abc_control_unit::state::TaskState;
use abc_control_unit::system::ControlSystem;
use abc_control_unit::task::TaskConfig;
use abc_hal::{RecordingSink, SimLink, SimulationDriver, SimulationRunner};

fn manual_only() -> RobotConfig {
    RobotConfig {
        controllers: ControllersConfig {
            balance: false,
            manual: Some(ManualConfig { period_us: 1_000 }),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[test]
fn controllers_wait_for_the_gate() {
    let system = ControlSystem::new(manual_only());
    let sink = RecordingSink::new();
    let core = system.start(sink.clone()).unwrap();
    system.inputs().manual.set(WheelCommand::new(4.0, -4.0));

    std::thread::sleep(Duration::from_millis(30));
    assert!(core.tasks().all(|t| t.state() == TaskState::WaitingForStart));
    assert!(sink.commands().iter().all(|c| *c == WheelCommand::ZERO));

    system.inputs().gate.set_ready();
    assert!(wait_for(Duration::from_secs(2), || {
        sink.last() == Some(WheelCommand::new(4.0, -4.0))
    }));
    assert!(core.tasks().all(|t| t.state() == TaskState::Running));

    let report = core.shutdown();
    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].0, "manual");
    assert!(report.tasks[0].1.iterations > 0);
}

#[test]
fn shutdown_sends_exactly_one_final_stop() {
    let system = ControlSystem::new(manual_only());
    let sink = RecordingSink::new();
    let core = system.start(sink.clone()).unwrap();
    system.inputs().gate.set_ready();
    system.inputs().manual.set(WheelCommand::symmetric(12.0));
    assert!(wait_for(Duration::from_secs(2), || {
        sink.last() == Some(WheelCommand::symmetric(12.0))
    }));

    let report = core.shutdown();
    assert!(report.aggregator.final_stop_sent);
    assert_eq!(sink.last(), Some(WheelCommand::ZERO));
    // One send per tick plus the final stop.
    assert_eq!(sink.len() as u64, report.aggregator.stats.cycle_count + 1);
}

#[test]
fn controller_added_while_running_contributes() {
    let system = ControlSystem::new(manual_only());
    let sink = RecordingSink::new();
    let mut core = system.start(sink.clone()).unwrap();
    system.inputs().gate.set_ready();
    system.inputs().manual.set(WheelCommand::symmetric(10.0));
    assert!(wait_for(Duration::from_secs(2), || {
        sink.last() == Some(WheelCommand::symmetric(10.0))
    }));

    let extra = Arc::new(ManualInput::new());
    extra.set(WheelCommand::new(-2.0, 2.0));
    let id = core
        .add_controller(
            Box::new(ManualController::new(Arc::clone(&extra))),
            TaskConfig::from_period_us(1_000, 1_000),
        )
        .unwrap();
    assert_eq!(core.aggregator().len(), 2);
    assert!(wait_for(Duration::from_secs(2), || {
        sink.last() == Some(WheelCommand::new(8.0, 12.0))
    }));

    let summary = core.remove_controller(id).unwrap();
    assert!(summary.iterations > 0);
    assert_eq!(core.aggregator().len(), 1);
    assert!(wait_for(Duration::from_secs(2), || {
        sink.last() == Some(WheelCommand::symmetric(10.0))
    }));
    assert!(core.remove_controller(id).is_none());
}

#[test]
fn aggregated_command_is_clamped() {
    let system = ControlSystem::new(manual_only());
    let sink = RecordingSink::new();
    let core = system.start(sink.clone()).unwrap();
    system.inputs().gate.set_ready();
    system.inputs().manual.set(WheelCommand::new(250.0, -250.0));

    let limit = system.config().aggregator.output_limit;
    assert!(wait_for(Duration::from_secs(2), || {
        sink.last() == Some(WheelCommand::new(limit, -limit))
    }));
    drop(core);
    assert_eq!(sink.last(), Some(WheelCommand::ZERO));
}

#[test]
fn balances_the_simulated_robot_in_real_time() {
    let config = RobotConfig {
        balance: BalanceConfig {
            period_us: 2_000,
            initial_parameters: Some(PidParameters {
                p_tilt: 5.0,
                d_tilt: -0.5,
                ..Default::default()
            }),
            ..Default::default()
        },
        simulation: SimulationConfig {
            attach_delay_ms: 20,
            initial_tilt_deg: 2.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let system = ControlSystem::new(config);
    let link = Arc::new(SimLink::new());
    let core = system
        .start(SimulationDriver::new(Arc::clone(&link)))
        .unwrap();

    let inputs = system.inputs();
    let gate = Arc::clone(&inputs.gate);
    let sim = SimulationRunner::spawn(
        &system.config().simulation,
        &system.config().wheel,
        Arc::clone(&link),
        inputs.wheels.clone(),
        inputs.orientation.clone(),
        Box::new(move || gate.set_ready()),
    )
    .unwrap();

    assert!(wait_for(Duration::from_secs(2), || inputs.gate.is_ready()));
    std::thread::sleep(Duration::from_millis(500));

    let report = core.shutdown();
    let summary = sim.stop();
    assert!(report.aggregator.final_stop_sent);
    assert!(link.commands_received() > 0);
    assert!(!summary.fallen, "fell over: {summary:?}");
    assert!(summary.max_abs_theta_deg < 10.0, "{summary:?}");
}
