//! Reference numbers for the encoder tracker and the balance law, checked
//! through the public pipeline rather than the internal helpers.

use std::sync::Arc;

use abc_common::hal::driver::{OrientationSource, WheelDataListener};
use abc_common::robot::config::{AggregatorConfig, OrientationConfig, WheelConfig};
use abc_common::robot::pid::PidParameters;
use abc_common::robot::types::{OrientationSample, WheelCommand};
use abc_control_unit::aggregator::Aggregator;
use abc_control_unit::control::pid::IntegralMode;
use abc_control_unit::controller::balance::BalanceController;
use abc_control_unit::controller::{Controller, ControllerOutput};
use abc_control_unit::sensing::encoder::{SharedWheelEncoder, WheelEncoderTracker};
use abc_control_unit::sensing::orientation::SharedOrientation;
use abc_control_unit::tuning::ParameterStore;

fn reference_wheel() -> WheelConfig {
    WheelConfig {
        radius_mm: 30.0,
        counts_per_revolution: 128,
        distance_ema_weight: 1.0,
        ..Default::default()
    }
}

#[test]
fn encoder_reference_counts() {
    let mm_per_count = 2.0 * std::f64::consts::PI * 30.0 / 128.0;
    let mut tracker = WheelEncoderTracker::new(&reference_wheel());

    tracker.update(0, 0, 0);
    assert_eq!(tracker.distance_l(), 0.0);

    tracker.update(10_000_000, 10, 10);
    assert!((tracker.distance_l() - 10.0 * mm_per_count).abs() < 1e-9);
    assert!((tracker.speed_l() - 10.0 * mm_per_count / 0.01).abs() < 1e-6);

    tracker.update(20_000_000, 20, 20);
    assert!((tracker.distance_l() - 20.0 * mm_per_count).abs() < 1e-9);
    assert!((tracker.speed_l() - 10.0 * mm_per_count / 0.01).abs() < 1e-6);
    assert_eq!(tracker.distance_l(), tracker.distance_r());
}

#[test]
fn shared_encoder_matches_tracker() {
    let shared = SharedWheelEncoder::new(&reference_wheel());
    let mut tracker = WheelEncoderTracker::new(&reference_wheel());
    for (i, (l, r)) in [(0, 0), (10, 5), (20, 12), (27, 30)].into_iter().enumerate() {
        let ts = i as i64 * 10_000_000;
        shared.on_wheel_data_update(ts, l, r);
        tracker.update(ts, l, r);
    }
    let snap = shared.snapshot();
    assert_eq!(snap, tracker.snapshot());
    assert_eq!(snap.samples, 4);
}

/// p_tilt = 2, all other gains 0, set point 0, tilt 5° → contribution of
/// magnitude 10 that drives against the tilt.
#[test]
fn balance_reference_contribution_reaches_aggregator() {
    let params = Arc::new(ParameterStore::new(Some(PidParameters {
        p_tilt: 2.0,
        ..Default::default()
    })));
    let orientation = Arc::new(SharedOrientation::new(&OrientationConfig::default()));
    orientation.publish(OrientationSample {
        theta_deg: 5.0,
        theta_deg_dot: 0.0,
    });
    let source: Arc<dyn OrientationSource> = orientation.clone();
    let wheels = Arc::new(SharedWheelEncoder::new(&reference_wheel()));
    let mut balance = BalanceController::new(params, source, wheels, IntegralMode::Unbounded);

    let output = Arc::new(ControllerOutput::new(balance.name()));
    let aggregator = Aggregator::new(&AggregatorConfig::default());
    aggregator.add_controller(output.clone());

    output.publish(balance.step().unwrap());
    let report = aggregator.tick();
    assert_eq!(report.command, WheelCommand::symmetric(-10.0));
    assert_eq!(report.contributors, 1);
    assert!(report.faults.is_empty());

    // Mirror image.
    orientation.publish(OrientationSample {
        theta_deg: -5.0,
        theta_deg_dot: 0.0,
    });
    balance.reset();
    output.publish(balance.step().unwrap());
    assert_eq!(aggregator.tick().command, WheelCommand::symmetric(10.0));
}

#[test]
fn balance_plus_auxiliary_contributions_sum() {
    let params = Arc::new(ParameterStore::new(Some(PidParameters {
        p_tilt: 2.0,
        ..Default::default()
    })));
    let orientation = Arc::new(SharedOrientation::new(&OrientationConfig::default()));
    orientation.publish(OrientationSample {
        theta_deg: -5.0,
        theta_deg_dot: 0.0,
    });
    let source: Arc<dyn OrientationSource> = orientation;
    let wheels = Arc::new(SharedWheelEncoder::new(&reference_wheel()));
    let mut balance = BalanceController::new(params, source, wheels, IntegralMode::Unbounded);

    let balance_out = Arc::new(ControllerOutput::new("balance"));
    let turn_out = Arc::new(ControllerOutput::new("turn"));
    let aggregator = Aggregator::new(&AggregatorConfig::default());
    aggregator.add_controller(balance_out.clone());
    aggregator.add_controller(turn_out.clone());

    balance_out.publish(balance.step().unwrap());
    turn_out.publish(WheelCommand::new(-3.0, 3.0));
    let report = aggregator.tick();
    assert_eq!(report.command, WheelCommand::new(7.0, 13.0));
    assert_eq!(report.contributors, 2);
}
