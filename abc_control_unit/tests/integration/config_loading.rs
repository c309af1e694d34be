//! Configuration files on disk, including the shipped example.

use std::io::Write;
use std::path::Path;

use abc_common::config::ConfigError;
use abc_control_unit::config::{enabled_controllers, load_config, validate};
use abc_control_unit::controller::Controller;
use abc_control_unit::system::ControlSystem;

#[test]
fn shipped_config_loads_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/robot.toml");
    let config = load_config(&path).unwrap();
    validate(&config).unwrap();

    let params = config.balance.initial_parameters.unwrap();
    assert_eq!(params.p_tilt, 5.0);
    assert_eq!(params.d_tilt, -0.5);
    assert!(enabled_controllers(&config).contains(&"balance"));
}

#[test]
fn config_from_temp_file_builds_controllers() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[shared]
robot_name = "bench-bot"

[aggregator]
cycle_time_us = 2000
output_limit = 50.0

[controllers]
balance = false

[controllers.back_and_forth]
speed = 5.0
half_period_ms = 500

[controllers.scripted_path]
looped = true
segments = [
    {{ duration_ms = 100, left = 1.0, right = 1.0 }},
    {{ duration_ms = 100, left = -1.0, right = 1.0 }},
]
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.shared.robot_name, "bench-bot");
    assert_eq!(config.aggregator.output_limit, 50.0);
    assert_eq!(
        enabled_controllers(&config),
        vec!["scripted_path", "back_and_forth"]
    );

    let system = ControlSystem::new(config);
    let names: Vec<String> = system
        .build_controllers()
        .iter()
        .map(|(c, _)| c.name().to_string())
        .collect();
    assert_eq!(names, vec!["scripted_path", "back_and_forth"]);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound));
}

#[test]
fn malformed_file_names_the_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[aggregator]\ncycle_time_us = \"fast\"").unwrap();
    let err = load_config(file.path()).unwrap_err();
    match err {
        ConfigError::ParseError(msg) => {
            assert!(msg.contains(&file.path().display().to_string()), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn out_of_range_values_fail_validation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[aggregator]\ncycle_time_us = 10").unwrap();
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)), "{err:?}");
}
