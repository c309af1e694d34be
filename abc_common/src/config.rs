//! Configuration loading traits and types.
//!
//! The control unit reads one TOML file at startup and turns it into an
//! immutable [`RobotConfig`](crate::robot::config::RobotConfig) handed to
//! each component's constructor. Nothing reads configuration after startup.
//!
//! ```rust,no_run
//! use abc_common::config::{ConfigError, ConfigLoader};
//! use abc_common::robot::config::RobotConfig;
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = RobotConfig::load(Path::new("config/robot.toml"))?;
//!     config.validate()?;
//!     println!("Robot: {}", config.shared.robot_name);
//!     Ok(())
//! }
//! ```

use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a configuration could not be used.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found")]
    FileNotFound,

    /// Unreadable file or invalid TOML / field types.
    #[error("invalid configuration: {0}")]
    ParseError(String),

    /// Well-formed but out of range or inconsistent.
    #[error("configuration rejected: {0}")]
    ValidationError(String),
}

/// `[shared] log_level`, spelled in lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, per-iteration detail.
    Trace,
    /// Debug information useful during tuning.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Isolated faults.
    Warn,
    /// Serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `[shared]` section.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// robot_name = "wobbler-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance name used in log output.
    #[serde(default = "default_robot_name")]
    pub robot_name: String,
}

fn default_robot_name() -> String {
    "balance-bot".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            robot_name: default_robot_name(),
        }
    }
}

impl SharedConfig {
    /// Rejects a blank `robot_name`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.robot_name.trim() {
            "" => Err(ConfigError::ValidationError(
                "shared.robot_name must not be blank".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// TOML loading for any deserializable configuration type.
///
/// Only parses; semantic checks are the caller's `validate()`.
pub trait ConfigLoader: Sized + DeserializeOwned {
    /// `FileNotFound` for a missing file, `ParseError` for anything else.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound,
            _ => ConfigError::ParseError(e.to_string()),
        })?;
        Self::from_toml_str(&text)
    }

    fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: DeserializeOwned> ConfigLoader for T {}
