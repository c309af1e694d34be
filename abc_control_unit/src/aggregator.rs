//! Controller aggregator ("grand controller").
//!
//! Runs at a fixed tick. Each tick it reads the latest output of every
//! registered source, sums them componentwise, clamps the sum to
//! `±output_limit` and sends it to the actuator sink.
//!
//! ## Reads
//! Sources are read without waiting: a controller that stalled keeps
//! contributing its last value. Outputs of different controllers may stem
//! from different instants (accepted temporal skew).
//!
//! ## Registry
//! Copy-on-write list behind an atomic pointer. `add_controller` and
//! `remove_controller` may be called while the loop runs; a tick always
//! iterates one consistent version of the list, in insertion order.
//!
//! ## Fault Isolation
//! A source that errors, panics or yields NaN/Inf is skipped for that tick
//! and flagged in [`TickReport::faults`]; the other contributions still go
//! out.
//!
//! ## Shutdown
//! After the stop flag is observed the loop sends exactly one `(0, 0)`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use abc_common::hal::driver::ActuatorSink;
use abc_common::robot::config::AggregatorConfig;
use abc_common::robot::error::FaultFlags;
use abc_common::robot::types::WheelCommand;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cycle::{CycleError, CycleStats, LogThrottle, Pacer, RT_PRIORITY_DEFAULT, rt_setup};

/// Failure reported by an output source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("output unavailable: {0}")]
    Unavailable(String),
}

/// Anything the aggregator can read a wheel command from.
pub trait OutputSource: Send + Sync {
    fn name(&self) -> &str;

    /// Latest command. Must not block.
    fn output(&self) -> Result<WheelCommand, SourceError>;
}

/// Registry handle returned by [`Aggregator::add_controller`].
pub type SourceId = u64;

#[derive(Clone)]
struct Registered {
    id: SourceId,
    source: Arc<dyn OutputSource>,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    /// Exact componentwise sum of the accepted contributions.
    pub sum: WheelCommand,
    /// Command sent to the sink (`sum` clamped to the output limit).
    pub command: WheelCommand,
    pub faults: FaultFlags,
    /// Number of sources whose output went into `sum`.
    pub contributors: usize,
}

/// Result of a finished aggregator loop.
#[derive(Debug, Clone, Default)]
pub struct AggregatorSummary {
    pub stats: CycleStats,
    /// Ticks that raised at least one fault flag.
    pub faulted_ticks: u64,
    /// Whether the final (0, 0) was accepted by the sink.
    pub final_stop_sent: bool,
}

/// Fixed-tick summing scheduler.
pub struct Aggregator {
    registry: ArcSwap<Vec<Registered>>,
    next_id: AtomicU64,
    output_limit: f64,
    cycle_time: Duration,
    cpu_core: Option<usize>,
    source_faults: AtomicU64,
    last_report: Mutex<TickReport>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("sources", &self.names())
            .field("output_limit", &self.output_limit)
            .field("cycle_time", &self.cycle_time)
            .finish()
    }
}

impl Aggregator {
    /// Create an aggregator with an empty registry.
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            registry: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
            output_limit: config.output_limit,
            cycle_time: Duration::from_micros(config.cycle_time_us),
            cpu_core: config.cpu_core,
            source_faults: AtomicU64::new(0),
            last_report: Mutex::new(TickReport::default()),
        }
    }

    /// Register a source. Safe while the loop is running.
    pub fn add_controller(&self, source: Arc<dyn OutputSource>) -> SourceId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = source.name().to_string();
        self.registry.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Registered {
                id,
                source: Arc::clone(&source),
            });
            next
        });
        info!(source = %name, id, "Controller registered");
        id
    }

    /// Unregister a source. Returns false if `id` is unknown.
    pub fn remove_controller(&self, id: SourceId) -> bool {
        let mut removed = false;
        self.registry.rcu(|current| {
            removed = current.iter().any(|r| r.id == id);
            current
                .iter()
                .filter(|r| r.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        if removed {
            info!(id, "Controller removed");
        }
        removed
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.registry.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered source names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.registry
            .load()
            .iter()
            .map(|r| r.source.name().to_string())
            .collect()
    }

    #[inline]
    pub fn output_limit(&self) -> f64 {
        self.output_limit
    }

    #[inline]
    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    /// Report of the most recent tick executed by the loop.
    pub fn last_report(&self) -> TickReport {
        *self.last_report.lock()
    }

    /// Read and sum all sources once. Does not touch the sink.
    pub fn tick(&self) -> TickReport {
        let registry = self.registry.load();
        let mut report = TickReport::default();

        for entry in registry.iter() {
            let read = catch_unwind(AssertUnwindSafe(|| entry.source.output()));
            let fault = match read {
                Ok(Ok(cmd)) if cmd.is_finite() => {
                    report.sum += cmd;
                    report.contributors += 1;
                    continue;
                }
                Ok(Ok(cmd)) => {
                    report.faults |= FaultFlags::NON_FINITE_OUTPUT;
                    format!("non-finite output {cmd:?}")
                }
                Ok(Err(e)) => {
                    report.faults |= FaultFlags::SOURCE_ERROR;
                    e.to_string()
                }
                Err(_) => {
                    report.faults |= FaultFlags::SOURCE_PANIC;
                    "panicked while reading output".to_string()
                }
            };
            let n = self.source_faults.fetch_add(1, Ordering::Relaxed) + 1;
            if LogThrottle::should_log(n, 10, 1000) {
                warn!(
                    source = entry.source.name(),
                    occurrences = n,
                    "Contribution dropped this tick: {fault}"
                );
            }
        }

        report.command = report.sum.clamped(self.output_limit);
        if report.command != report.sum {
            report.faults |= FaultFlags::OUTPUT_CLAMPED;
        }
        report
    }

    /// Run the fixed-period loop on the calling thread until `running` is
    /// cleared, then send the final (0, 0).
    pub fn run<S: ActuatorSink + ?Sized>(
        &self,
        sink: &mut S,
        running: &AtomicBool,
    ) -> AggregatorSummary {
        info!(
            sink = sink.name(),
            cycle_us = self.cycle_time.as_micros() as u64,
            output_limit = self.output_limit,
            sources = self.len(),
            "Aggregator loop started"
        );

        let mut summary = AggregatorSummary::default();
        let mut pacer = Pacer::new(self.cycle_time);
        let mut overrun_log = LogThrottle::default();
        let mut sink_log = LogThrottle::default();
        let mut latency_ns = 0i64;

        while running.load(Ordering::Acquire) {
            let started = Instant::now();
            let mut report = self.tick();

            if let Err(e) = sink.send(report.command) {
                report.faults |= FaultFlags::SINK_ERROR;
                if sink_log.hit() {
                    warn!(sink = sink.name(), occurrences = sink_log.count(), "Sink rejected command: {e}");
                }
            }

            let duration_ns = started.elapsed().as_nanos() as i64;
            summary.stats.record(duration_ns, latency_ns);

            let deadline = pacer.deadline();
            match pacer.next_wait() {
                Some(wait) => std::thread::sleep(wait),
                None => {
                    report.faults |= FaultFlags::CYCLE_OVERRUN;
                    summary.stats.overruns += 1;
                    if overrun_log.hit() {
                        warn!(
                            duration_ns,
                            budget_ns = self.cycle_time.as_nanos() as u64,
                            overruns = summary.stats.overruns,
                            "Aggregator cycle overrun"
                        );
                    }
                }
            }
            latency_ns = Instant::now().saturating_duration_since(deadline).as_nanos() as i64;

            if !report.faults.is_empty() {
                summary.faulted_ticks += 1;
            }
            *self.last_report.lock() = report;
        }

        summary.final_stop_sent = match sink.send(WheelCommand::ZERO) {
            Ok(()) => {
                info!(sink = sink.name(), "Fail-safe stop command sent");
                true
            }
            Err(e) => {
                error!(sink = sink.name(), "Fail-safe stop command failed: {e}");
                false
            }
        };

        info!(
            cycles = summary.stats.cycle_count,
            avg_ns = summary.stats.avg_cycle_ns(),
            max_ns = summary.stats.max_cycle_ns,
            overruns = summary.stats.overruns,
            faulted_ticks = summary.faulted_ticks,
            "Aggregator loop stopped"
        );
        summary
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn<S: ActuatorSink + 'static>(
        self: &Arc<Self>,
        mut sink: S,
    ) -> Result<AggregatorHandle, CycleError> {
        let running = Arc::new(AtomicBool::new(true));
        let aggregator = Arc::clone(self);
        let flag = Arc::clone(&running);

        let join = std::thread::Builder::new()
            .name("abc-aggregator".to_string())
            .spawn(move || {
                if let Err(e) = rt_setup(aggregator.cpu_core, RT_PRIORITY_DEFAULT) {
                    warn!("RT setup failed, continuing without: {e}");
                }
                aggregator.run(&mut sink, &flag)
            })?;
        debug!("Aggregator thread spawned");

        Ok(AggregatorHandle {
            running,
            join: Some(join),
        })
    }
}

/// Handle to a spawned aggregator loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct AggregatorHandle {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<AggregatorSummary>>,
}

impl AggregatorHandle {
    /// True until the loop observed the stop request.
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Stop the loop and wait for the final (0, 0) to be sent.
    pub fn stop(mut self) -> AggregatorSummary {
        self.shutdown()
    }

    fn shutdown(&mut self) -> AggregatorSummary {
        self.running.store(false, Ordering::Release);
        match self.join.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                error!("Aggregator thread panicked");
                AggregatorSummary::default()
            }
            None => AggregatorSummary::default(),
        }
    }
}

impl Drop for AggregatorHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.shutdown();
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerOutput;
    use abc_common::hal::driver::HalError;
    use proptest::prelude::*;

    struct Failing;

    impl OutputSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn output(&self) -> Result<WheelCommand, SourceError> {
            Err(SourceError::Unavailable("link down".to_string()))
        }
    }

    struct Panicking;

    impl OutputSource for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
        fn output(&self) -> Result<WheelCommand, SourceError> {
            panic!("controller bug")
        }
    }

    struct Recording(Arc<Mutex<Vec<WheelCommand>>>);

    impl ActuatorSink for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        fn set_wheel_output(&mut self, left: f64, right: f64) -> Result<(), HalError> {
            self.0.lock().push(WheelCommand::new(left, right));
            Ok(())
        }
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(&AggregatorConfig::default())
    }

    fn output(name: &str, cmd: WheelCommand) -> Arc<ControllerOutput> {
        let out = Arc::new(ControllerOutput::new(name));
        out.publish(cmd);
        out
    }

    #[test]
    fn empty_registry_ticks_zero() {
        let agg = aggregator();
        let r = agg.tick();
        assert_eq!(r.command, WheelCommand::ZERO);
        assert_eq!(r.contributors, 0);
        assert!(r.faults.is_empty());
    }

    #[test]
    fn sums_all_outputs_componentwise() {
        let agg = aggregator();
        agg.add_controller(output("balance", WheelCommand::symmetric(10.0)));
        agg.add_controller(output("centering", WheelCommand::new(-3.0, 3.0)));
        let r = agg.tick();
        assert_eq!(r.sum, WheelCommand::new(7.0, 13.0));
        assert_eq!(r.command, r.sum);
        assert_eq!(r.contributors, 2);
        assert_eq!(agg.names(), vec!["balance", "centering"]);
    }

    #[test]
    fn clamps_to_output_limit() {
        let agg = aggregator();
        agg.add_controller(output("a", WheelCommand::new(80.0, -90.0)));
        agg.add_controller(output("b", WheelCommand::new(80.0, -90.0)));
        let r = agg.tick();
        assert_eq!(r.sum, WheelCommand::new(160.0, -180.0));
        assert_eq!(r.command, WheelCommand::new(100.0, -100.0));
        assert!(r.faults.contains(FaultFlags::OUTPUT_CLAMPED));
    }

    #[test]
    fn failing_and_panicking_sources_are_isolated() {
        let agg = aggregator();
        agg.add_controller(Arc::new(Failing));
        agg.add_controller(output("ok", WheelCommand::symmetric(4.0)));
        agg.add_controller(Arc::new(Panicking));
        agg.add_controller(output("nan", WheelCommand::new(f64::NAN, 1.0)));
        let r = agg.tick();
        assert_eq!(r.command, WheelCommand::symmetric(4.0));
        assert_eq!(r.contributors, 1);
        assert!(r.faults.contains(
            FaultFlags::SOURCE_ERROR | FaultFlags::SOURCE_PANIC | FaultFlags::NON_FINITE_OUTPUT
        ));
        assert!(r.faults.dropped_contribution());
    }

    #[test]
    fn remove_controller_drops_contribution() {
        let agg = aggregator();
        let a = agg.add_controller(output("a", WheelCommand::symmetric(1.0)));
        agg.add_controller(output("b", WheelCommand::symmetric(2.0)));
        assert!(agg.remove_controller(a));
        assert!(!agg.remove_controller(a));
        assert_eq!(agg.tick().command, WheelCommand::symmetric(2.0));
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn stalled_controller_keeps_contributing_last_value() {
        let agg = aggregator();
        let out = output("stalled", WheelCommand::symmetric(5.0));
        agg.add_controller(out.clone());
        for _ in 0..3 {
            assert_eq!(agg.tick().command, WheelCommand::symmetric(5.0));
        }
        out.publish(WheelCommand::symmetric(6.0));
        assert_eq!(agg.tick().command, WheelCommand::symmetric(6.0));
    }

    #[test]
    fn stop_sends_exactly_one_final_zero() {
        let agg = Arc::new(aggregator());
        agg.add_controller(output("balance", WheelCommand::symmetric(42.0)));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let handle = agg.spawn(Recording(Arc::clone(&sent))).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let summary = handle.stop();

        let sent = sent.lock();
        assert!(sent.len() >= 2);
        assert_eq!(*sent.last().unwrap(), WheelCommand::ZERO);
        assert_eq!(sent.iter().filter(|c| **c == WheelCommand::ZERO).count(), 1);
        assert!(sent[..sent.len() - 1].iter().all(|c| *c == WheelCommand::symmetric(42.0)));
        assert!(summary.final_stop_sent);
        assert_eq!(summary.stats.cycle_count as usize, sent.len() - 1);
    }

    #[test]
    fn controller_added_while_running_is_picked_up() {
        let agg = Arc::new(aggregator());
        let sent = Arc::new(Mutex::new(Vec::new()));
        let handle = agg.spawn(Recording(Arc::clone(&sent))).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        agg.add_controller(output("late", WheelCommand::new(1.0, 2.0)));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(agg.last_report().command, WheelCommand::new(1.0, 2.0));
        handle.stop();
        assert!(sent.lock().contains(&WheelCommand::new(1.0, 2.0)));
    }

    proptest! {
        #[test]
        fn sum_is_exact_and_order_independent(
            values in proptest::collection::vec((-800i32..800, -800i32..800), 0..12)
        ) {
            // Multiples of 1/8 keep every partial sum exactly representable.
            let cmds: Vec<WheelCommand> = values
                .iter()
                .map(|(l, r)| WheelCommand::new(*l as f64 / 8.0, *r as f64 / 8.0))
                .collect();

            let forward = aggregator();
            for (i, c) in cmds.iter().enumerate() {
                forward.add_controller(output(&format!("c{i}"), *c));
            }
            let backward = aggregator();
            for (i, c) in cmds.iter().enumerate().rev() {
                backward.add_controller(output(&format!("c{i}"), *c));
            }

            let expected = WheelCommand::new(
                values.iter().map(|(l, _)| *l as f64 / 8.0).sum(),
                values.iter().map(|(_, r)| *r as f64 / 8.0).sum(),
            );
            prop_assert_eq!(forward.tick().sum, expected);
            prop_assert_eq!(backward.tick().sum, expected);
        }
    }
}
