//! Tuning channel and atomic parameter snapshots.
//!
//! `ParameterStore` holds the current [`PidParameters`] behind an atomic
//! pointer swap: writers publish a complete new value, the balance controller
//! loads one `Arc` per iteration and never sees a torn mix of old and new
//! fields.
//!
//! `TuningChannel` parses partial JSON updates, e.g.
//!
//! ```json
//! {"p_tilt": 2.0, "setPointDeg": 1.5}
//! ```
//!
//! Malformed payloads are logged and rejected; the previous parameters stay
//! in effect.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use abc_common::robot::pid::{PidParameters, PidParametersPatch};
use arc_swap::ArcSwapOption;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Rejected tuning update.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TuningError {
    /// Payload is not a JSON object of known numeric fields.
    #[error("malformed tuning payload: {0}")]
    Malformed(String),

    /// Payload carries no field.
    #[error("tuning payload carries no parameter")]
    Empty,

    /// Resulting parameter set is invalid.
    #[error("invalid parameters: {0}")]
    Invalid(String),
}

// ─── Parameter Store ────────────────────────────────────────────────

/// Atomic holder of the current parameter snapshot.
#[derive(Debug)]
pub struct ParameterStore {
    current: ArcSwapOption<PidParameters>,
    /// Base for patches arriving before any full set was published.
    defaults: PidParameters,
    revision: AtomicU64,
}

impl ParameterStore {
    /// Store seeded with `initial`, or empty ("not yet received") if `None`.
    pub fn new(initial: Option<PidParameters>) -> Self {
        Self {
            current: ArcSwapOption::new(initial.map(Arc::new)),
            defaults: PidParameters::default(),
            revision: AtomicU64::new(0),
        }
    }

    /// Current snapshot, `None` until parameters arrive.
    #[inline]
    pub fn snapshot(&self) -> Option<Arc<PidParameters>> {
        self.current.load_full()
    }

    /// Number of accepted updates.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Replace the whole parameter set.
    pub fn publish(&self, params: PidParameters) -> Result<Arc<PidParameters>, TuningError> {
        params.validate().map_err(TuningError::Invalid)?;
        let params = Arc::new(params);
        self.current.store(Some(Arc::clone(&params)));
        self.revision.fetch_add(1, Ordering::AcqRel);
        Ok(params)
    }

    /// Merge a partial update onto the latest snapshot.
    ///
    /// Read-copy-update: concurrent patches are applied one after another,
    /// none of their fields is lost.
    pub fn apply_patch(
        &self,
        patch: &PidParametersPatch,
    ) -> Result<Arc<PidParameters>, TuningError> {
        let mut outcome = Err(TuningError::Empty);
        self.current.rcu(|current| {
            let base = current.as_deref().copied().unwrap_or(self.defaults);
            let merged = base.merged(patch);
            match merged.validate() {
                Ok(()) => {
                    let merged = Arc::new(merged);
                    outcome = Ok(Arc::clone(&merged));
                    Some(merged)
                }
                Err(e) => {
                    outcome = Err(TuningError::Invalid(e));
                    current.clone()
                }
            }
        });
        if outcome.is_ok() {
            self.revision.fetch_add(1, Ordering::AcqRel);
        }
        outcome
    }
}

// ─── Tuning Channel ─────────────────────────────────────────────────

/// Entry point for external tuning updates (socket, UI, stdin).
#[derive(Debug)]
pub struct TuningChannel {
    store: Arc<ParameterStore>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl TuningChannel {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    /// Parse and apply one JSON payload.
    pub fn submit(&self, payload: &str) -> Result<Arc<PidParameters>, TuningError> {
        let result = Self::parse(payload).and_then(|patch| self.store.apply_patch(&patch));
        match &result {
            Ok(p) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                info!(
                    p_tilt = p.p_tilt,
                    i_tilt = p.i_tilt,
                    d_tilt = p.d_tilt,
                    p_wheel = p.p_wheel,
                    set_point_deg = p.set_point_deg,
                    max_abs_tilt_deg = p.max_abs_tilt_deg,
                    "Tuning parameters updated"
                );
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Tuning update rejected, keeping previous parameters: {e}");
            }
        }
        result
    }

    fn parse(payload: &str) -> Result<PidParametersPatch, TuningError> {
        let patch: PidParametersPatch =
            serde_json::from_str(payload.trim()).map_err(|e| TuningError::Malformed(e.to_string()))?;
        if patch.is_empty() {
            return Err(TuningError::Empty);
        }
        Ok(patch)
    }

    /// Feed newline-delimited payloads until EOF or `keep_going` returns false.
    ///
    /// Blank lines are ignored. Returns the number of accepted updates.
    pub fn run_lines<R: BufRead>(&self, reader: R, keep_going: impl Fn() -> bool) -> u64 {
        let mut accepted = 0;
        for line in reader.lines() {
            if !keep_going() {
                break;
            }
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("Tuning input closed: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            if self.submit(&line).is_ok() {
                accepted += 1;
            }
        }
        debug!(accepted, "Tuning input finished");
        accepted
    }

    /// (accepted, rejected) payload counts.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.accepted.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        )
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
