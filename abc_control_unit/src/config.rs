//! TOML configuration loader with validation.
//!
//! Loads one [`RobotConfig`], runs the per-section bounds checks and then the
//! cross-section rules that only make sense for the control unit:
//! at least one controller must be enabled, and a pinned aggregator core
//! must exist on this machine.

use std::path::Path;

use abc_common::config::{ConfigError, ConfigLoader};
use abc_common::robot::config::RobotConfig;

/// Load and validate the robot configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RobotConfig, ConfigError> {
    let config = RobotConfig::load(path).map_err(|e| match e {
        ConfigError::ParseError(msg) => {
            ConfigError::ParseError(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(toml: &str) -> Result<RobotConfig, ConfigError> {
    let config = RobotConfig::from_toml_str(toml)?;
    validate(&config)?;
    Ok(config)
}

/// Section checks plus control-unit cross checks.
pub fn validate(config: &RobotConfig) -> Result<(), ConfigError> {
    config.validate()?;

    if enabled_controllers(config).is_empty() {
        return Err(ConfigError::ValidationError(
            "no controller enabled: set controllers.balance = true or add a [controllers.*] section"
                .to_string(),
        ));
    }

    if let Some(core) = config.aggregator.cpu_core {
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        if core >= available {
            return Err(ConfigError::ValidationError(format!(
                "aggregator.cpu_core {core} not available (cores: {available})"
            )));
        }
    }

    Ok(())
}

/// Names of the controllers the configuration enables, in start-up order.
pub fn enabled_controllers(config: &RobotConfig) -> Vec<&'static str> {
    let c = &config.controllers;
    let mut names = Vec::new();
    if c.balance {
        names.push("balance");
    }
    if c.centering.is_some() {
        names.push("centering");
    }
    if c.scripted_path.is_some() {
        names.push("scripted_path");
    }
    if c.back_and_forth.is_some() {
        names.push("back_and_forth");
    }
    if c.manual.is_some() {
        names.push("manual");
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_enables_balance_only() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(enabled_controllers(&config), vec!["balance"]);
    }

    #[test]
    fn no_controller_is_rejected() {
        let err = load_config_from_str("[controllers]\nbalance = false\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("no controller")));
    }

    #[test]
    fn auxiliary_only_is_accepted() {
        let config = load_config_from_str(
            "[controllers]\nbalance = false\n\n[controllers.manual]\nperiod_us = 10000\n",
        )
        .unwrap();
        assert_eq!(enabled_controllers(&config), vec!["manual"]);
    }

    #[test]
    fn missing_core_is_rejected() {
        let err = load_config_from_str("[aggregator]\ncpu_core = 100000\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("cpu_core")));
    }
}
