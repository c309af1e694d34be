//! Simulated hardware link.
//!
//! [`Simulation`] advances the plant one physics step at a time and pushes
//! encoder and IMU readings to their listeners when their report periods are
//! due. It is deterministic and used directly by lockstep tests.
//!
//! [`SimulationRunner`] drives a `Simulation` in real time on its own thread:
//! after `attach_delay` it reports itself attached (the readiness signal the
//! controllers wait for), then steps at `step_us` until stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use abc_common::hal::driver::{ImuListener, WheelDataListener};
use abc_common::robot::config::{SimulationConfig, WheelConfig};
use abc_common::robot::types::WheelCommand;
use tracing::{error, info};

use super::driver::SimLink;
use super::physics::PendulumPlant;

/// Plant plus sensor report scheduling.
#[derive(Debug, Clone)]
pub struct Simulation {
    plant: PendulumPlant,
    step_nanos: i64,
    encoder_period_nanos: i64,
    imu_period_nanos: i64,
    next_encoder_nanos: i64,
    next_imu_nanos: i64,
    steps: u64,
    max_abs_theta_deg: f64,
}

impl Simulation {
    pub fn new(sim: &SimulationConfig, wheel: &WheelConfig) -> Self {
        let plant = PendulumPlant::new(sim, wheel);
        let max_abs_theta_deg = plant.theta_deg().abs();
        Self {
            plant,
            step_nanos: sim.step_us as i64 * 1_000,
            encoder_period_nanos: sim.encoder_period_us as i64 * 1_000,
            imu_period_nanos: sim.imu_period_us as i64 * 1_000,
            next_encoder_nanos: 0,
            next_imu_nanos: 0,
            steps: 0,
            max_abs_theta_deg,
        }
    }

    pub fn plant(&self) -> &PendulumPlant {
        &self.plant
    }

    pub fn step_nanos(&self) -> i64 {
        self.step_nanos
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Largest |tilt| seen so far [deg].
    pub fn max_abs_theta_deg(&self) -> f64 {
        self.max_abs_theta_deg
    }

    /// Push every reading whose report time has come.
    pub fn publish_due(&mut self, wheels: &dyn WheelDataListener, imu: &dyn ImuListener) {
        let now = self.plant.time_nanos();
        if now >= self.next_encoder_nanos {
            let (left, right) = self.plant.encoder_counts();
            wheels.on_wheel_data_update(now, left, right);
            self.next_encoder_nanos = now + self.encoder_period_nanos;
        }
        if now >= self.next_imu_nanos {
            imu.on_imu_sample(&self.plant.imu());
            self.next_imu_nanos = now + self.imu_period_nanos;
        }
    }

    /// One physics step under `command`, then publish due readings.
    pub fn step(
        &mut self,
        command: WheelCommand,
        wheels: &dyn WheelDataListener,
        imu: &dyn ImuListener,
    ) {
        self.plant.step(command, self.step_nanos);
        self.steps += 1;
        self.max_abs_theta_deg = self.max_abs_theta_deg.max(self.plant.theta_deg().abs());
        self.publish_due(wheels, imu);
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            steps: self.steps,
            sim_time_nanos: self.plant.time_nanos(),
            final_theta_deg: self.plant.theta_deg(),
            max_abs_theta_deg: self.max_abs_theta_deg,
            fallen: self.plant.has_fallen(),
        }
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationSummary {
    pub steps: u64,
    pub sim_time_nanos: i64,
    pub final_theta_deg: f64,
    pub max_abs_theta_deg: f64,
    pub fallen: bool,
}

/// Real-time driver for a [`Simulation`].
pub struct SimulationRunner;

impl SimulationRunner {
    /// Start the simulated link on a dedicated thread.
    ///
    /// `on_attached` runs once, on the runner thread, when the link attaches.
    pub fn spawn(
        sim: &SimulationConfig,
        wheel: &WheelConfig,
        link: Arc<SimLink>,
        wheels: Arc<dyn WheelDataListener>,
        imu: Arc<dyn ImuListener>,
        on_attached: Box<dyn FnOnce() + Send>,
    ) -> std::io::Result<SimulationHandle> {
        let mut simulation = Simulation::new(sim, wheel);
        let attach_delay = Duration::from_millis(sim.attach_delay_ms);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let join = std::thread::Builder::new()
            .name("abc-sim".to_string())
            .spawn(move || {
                let attach_at = Instant::now() + attach_delay;
                while flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now >= attach_at {
                        break;
                    }
                    std::thread::sleep((attach_at - now).min(Duration::from_millis(5)));
                }
                if !flag.load(Ordering::Acquire) {
                    link.close();
                    return simulation.summary();
                }

                link.set_attached();
                simulation.publish_due(&*wheels, &*imu);
                info!(
                    initial_tilt_deg = simulation.plant().theta_deg(),
                    "Simulated link attached"
                );
                on_attached();

                let step = Duration::from_nanos(simulation.step_nanos() as u64);
                let mut deadline = Instant::now() + step;
                while flag.load(Ordering::Acquire) {
                    simulation.step(link.command(), &*wheels, &*imu);
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                        deadline += step;
                    } else {
                        deadline = now + step;
                    }
                }

                link.close();
                let summary = simulation.summary();
                info!(
                    steps = summary.steps,
                    final_theta_deg = summary.final_theta_deg,
                    max_abs_theta_deg = summary.max_abs_theta_deg,
                    fallen = summary.fallen,
                    "Simulated link detached"
                );
                summary
            })?;

        Ok(SimulationHandle {
            running,
            join: Some(join),
        })
    }
}

/// Handle to a running simulation. Dropping it stops the simulation.
#[derive(Debug)]
pub struct SimulationHandle {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<SimulationSummary>>,
}

impl SimulationHandle {
    pub fn stop(mut self) -> SimulationSummary {
        self.shutdown()
    }

    fn shutdown(&mut self) -> SimulationSummary {
        self.running.store(false, Ordering::Release);
        match self.join.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                error!("Simulation thread panicked");
                SimulationSummary::default()
            }
            None => SimulationSummary::default(),
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.shutdown();
        }
    }
}
