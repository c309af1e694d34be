//! # Balance-bot Control Unit
//!
//! Loads the robot configuration, wires the control core to an actuator sink
//! and runs until Ctrl-C (or `--duration-s`).
//!
//! Sinks:
//! - **simulation** (default): a wheeled inverted pendulum stands in for the
//!   hardware link, pushing encoder and IMU readings into the core.
//! - **log**: commands are only logged; the ready gate opens immediately.
//!
//! With `--tuning-stdin`, each stdin line is applied as a JSON tuning update,
//! e.g. `{"p_tilt": 5.0, "d_tilt": -0.5}`.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use abc_common::config::{ConfigError, LogLevel};
use abc_common::consts::DEFAULT_CONFIG_PATH;
use abc_common::hal::driver::{ImuListener, WheelDataListener};
use abc_common::robot::config::RobotConfig;
use abc_control_unit::config::{enabled_controllers, load_config, validate};
use abc_control_unit::cycle::rt_enabled;
use abc_control_unit::system::{ControlSystem, RunningSystem, ShutdownReport};
use abc_hal::{LoggingSink, SimLink, SimulationDriver, SimulationHandle, SimulationRunner};
use clap::{Parser, ValueEnum};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Which actuator sink the aggregator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    Simulation,
    Log,
}

/// Balance-bot control core
#[derive(Parser, Debug)]
#[command(name = "abc_control_unit")]
#[command(version)]
#[command(about = "Balance, behaviour controllers and fixed-tick wheel command aggregation")]
struct Args {
    /// Path to the robot configuration TOML.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Actuator sink to drive.
    #[arg(long, value_enum, default_value_t = SinkKind::Simulation)]
    sink: SinkKind,

    /// Stop after this many seconds (default: run until Ctrl-C).
    #[arg(long, value_name = "SECONDS")]
    duration_s: Option<f64>,

    /// Read JSON tuning updates from stdin, one per line.
    #[arg(long)]
    tuning_stdin: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let loaded = load(&args.config);
    setup_tracing(&args, loaded.as_ref().ok().map(|c| c.shared.log_level));

    info!("Balance-bot control unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {}: {e}", args.config.display());
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Balance-bot control unit shutdown complete");
}

/// Load the configuration; a missing default file falls back to defaults.
fn load(path: &Path) -> Result<RobotConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::FileNotFound) if path == Path::new(DEFAULT_CONFIG_PATH) => {
            let config = RobotConfig::default();
            validate(&config)?;
            Ok(config)
        }
        other => other,
    }
}

fn run(args: &Args, config: RobotConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !args.config.exists() {
        warn!(
            "No configuration at '{}', using built-in defaults",
            args.config.display()
        );
    }
    info!(
        robot = %config.shared.robot_name,
        cycle_us = config.aggregator.cycle_time_us,
        output_limit = config.aggregator.output_limit,
        controllers = ?enabled_controllers(&config),
        rt = rt_enabled(),
        "Config OK"
    );
    if config.balance.initial_parameters.is_none() && config.controllers.balance {
        warn!("No initial PID parameters: balance output held until a tuning update arrives");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let system = ControlSystem::new(config);

    let (core, simulation) = match args.sink {
        SinkKind::Simulation => {
            let link = Arc::new(SimLink::new());
            let core = system.start(SimulationDriver::new(Arc::clone(&link)))?;
            let inputs = system.inputs();
            let gate = Arc::clone(&inputs.gate);
            let wheels: Arc<dyn WheelDataListener> = inputs.wheels.clone();
            let imu: Arc<dyn ImuListener> = inputs.orientation.clone();
            let sim = SimulationRunner::spawn(
                &system.config().simulation,
                &system.config().wheel,
                link,
                wheels,
                imu,
                Box::new(move || gate.set_ready()),
            )?;
            (core, Some(sim))
        }
        SinkKind::Log => {
            let core = system.start(LoggingSink::default())?;
            system.inputs().gate.set_ready();
            (core, None)
        }
    };

    if args.tuning_stdin {
        spawn_tuning_reader(&system, Arc::clone(&running))?;
    }

    supervise(&core, &running, args.duration_s);
    shutdown(core, simulation);
    Ok(())
}

/// Feed stdin lines into the tuning channel on a detached thread.
fn spawn_tuning_reader(
    system: &ControlSystem,
    running: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let tuning = Arc::clone(&system.inputs().tuning);
    std::thread::Builder::new()
        .name("abc-tuning".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let accepted = tuning.run_lines(stdin.lock(), || running.load(Ordering::SeqCst));
            info!(accepted, "Tuning input closed");
        })?;
    info!("Reading tuning updates from stdin");
    Ok(())
}

/// Block until stopped, logging the aggregated command once per second.
fn supervise(core: &RunningSystem, running: &AtomicBool, duration_s: Option<f64>) {
    let started = Instant::now();
    let limit = duration_s.and_then(|s| Duration::try_from_secs_f64(s).ok());
    let mut next_status = started + Duration::from_secs(1);

    while running.load(Ordering::SeqCst) {
        if limit.is_some_and(|l| started.elapsed() >= l) {
            info!("Run duration reached");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
        if Instant::now() >= next_status {
            next_status += Duration::from_secs(1);
            let report = core.aggregator().last_report();
            info!(
                left = report.command.left,
                right = report.command.right,
                contributors = report.contributors,
                faults = ?report.faults,
                "Status"
            );
        }
    }
}

fn shutdown(core: RunningSystem, simulation: Option<SimulationHandle>) {
    let ShutdownReport { tasks, aggregator } = core.shutdown();
    for (name, summary) in &tasks {
        info!(
            controller = %name,
            iterations = summary.iterations,
            errors = summary.errors,
            panics = summary.panics,
            "Controller summary"
        );
    }
    info!(
        cycles = aggregator.stats.cycle_count,
        avg_ns = aggregator.stats.avg_cycle_ns(),
        max_ns = aggregator.stats.max_cycle_ns,
        overruns = aggregator.stats.overruns,
        faulted_ticks = aggregator.faulted_ticks,
        final_stop_sent = aggregator.final_stop_sent,
        "Aggregator summary"
    );
    if !aggregator.final_stop_sent {
        warn!("Final stop command was not accepted by the sink");
    }

    if let Some(sim) = simulation {
        let summary = sim.stop();
        info!(
            sim_time_ms = summary.sim_time_nanos / 1_000_000,
            final_theta_deg = summary.final_theta_deg,
            max_abs_theta_deg = summary.max_abs_theta_deg,
            fallen = summary.fallen,
            "Simulation summary"
        );
    }
}

/// Setup tracing subscriber from CLI flags and the configured level.
fn setup_tracing(args: &Args, configured: Option<LogLevel>) {
    let directive: Directive = if args.verbose {
        Level::DEBUG.into()
    } else {
        match configured.unwrap_or_default().as_directive().parse() {
            Ok(d) => d,
            Err(_) => Level::INFO.into(),
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
