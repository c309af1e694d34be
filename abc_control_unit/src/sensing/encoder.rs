//! Wheel encoder tracker: counts → distance → speed → smoothed speed.
//!
//! Timestamps go into a fixed ring of `window_len` slots at
//! `index = sample_counter mod window_len`; the sampling interval is the
//! wrap-aware difference between the current slot and the one before it, so
//! irregular report rates are handled exactly.
//!
//! A non-positive interval (duplicate or out-of-order timestamp) carries no
//! new information: distance is still updated, speeds are held.

use abc_common::consts::{ENCODER_WINDOW_MAX, NANOS_PER_SEC};
use abc_common::hal::driver::WheelDataListener;
use abc_common::robot::config::WheelConfig;
use parking_lot::Mutex;

use crate::control::filters::{EmaState, ema_apply};

/// Per-wheel state, owned exclusively by the tracker.
#[derive(Debug, Clone, Copy, Default)]
pub struct WheelState {
    /// Last cumulative count.
    pub count: i64,
    /// Distance [mm] (EMA with the distance weight, 1 = exact).
    pub distance_mm: f64,
    /// Distance before the last update [mm].
    pub distance_mm_previous: f64,
    /// Instantaneous speed [mm/s].
    pub speed_mm_s: f64,
    /// Smoothed speed [mm/s].
    pub speed_mm_s_lp: f64,
    distance_filter: EmaState,
    speed_filter: EmaState,
}

impl WheelState {
    fn update(&mut self, count: i64, mm_per_count: f64, weights: (f64, f64), dt_s: Option<f64>) {
        let (distance_w, speed_w) = weights;
        self.count = count;
        self.distance_mm_previous = self.distance_mm;
        self.distance_mm = ema_apply(
            &mut self.distance_filter,
            distance_w,
            count as f64 * mm_per_count,
        );

        if let Some(dt_s) = dt_s {
            self.speed_mm_s = (self.distance_mm - self.distance_mm_previous) / dt_s;
            self.speed_mm_s_lp = ema_apply(&mut self.speed_filter, speed_w, self.speed_mm_s);
        }
    }
}

/// Consistent view of both wheels taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSnapshot {
    pub distance_l: f64,
    pub distance_r: f64,
    pub speed_l: f64,
    pub speed_r: f64,
    pub speed_l_lp: f64,
    pub speed_r_lp: f64,
    /// Number of updates processed.
    pub samples: u64,
}

/// Converts raw incremental counts and timestamps into distance and speed.
#[derive(Debug, Clone)]
pub struct WheelEncoderTracker {
    mm_per_count: f64,
    window_len: usize,
    distance_weight: f64,
    speed_weight: f64,
    timestamps: heapless::Vec<i64, ENCODER_WINDOW_MAX>,
    sample_counter: u64,
    last_dt_s: f64,
    left: WheelState,
    right: WheelState,
}

impl WheelEncoderTracker {
    /// Create a tracker from validated wheel geometry.
    pub fn new(config: &WheelConfig) -> Self {
        Self {
            mm_per_count: config.mm_per_count(),
            window_len: config.window_len.clamp(2, ENCODER_WINDOW_MAX),
            distance_weight: config.distance_ema_weight,
            speed_weight: config.speed_ema_weight,
            timestamps: heapless::Vec::new(),
            sample_counter: 0,
            last_dt_s: 0.0,
            left: WheelState::default(),
            right: WheelState::default(),
        }
    }

    /// Process one encoder reading. Never fails.
    pub fn update(&mut self, timestamp_nanos: i64, count_left: i64, count_right: i64) {
        let index = (self.sample_counter % self.window_len as u64) as usize;
        if index < self.timestamps.len() {
            self.timestamps[index] = timestamp_nanos;
        } else {
            // Ring still filling; index == len here.
            let _ = self.timestamps.push(timestamp_nanos);
        }

        let dt_s = if self.sample_counter == 0 {
            None
        } else {
            let prev = (index + self.window_len - 1) % self.window_len;
            let dt_ns = timestamp_nanos.saturating_sub(self.timestamps[prev]);
            (dt_ns > 0).then(|| dt_ns as f64 / NANOS_PER_SEC)
        };
        if let Some(dt) = dt_s {
            self.last_dt_s = dt;
        }

        let weights = (self.distance_weight, self.speed_weight);
        self.left.update(count_left, self.mm_per_count, weights, dt_s);
        self.right.update(count_right, self.mm_per_count, weights, dt_s);
        self.sample_counter += 1;
    }

    /// Left distance [mm].
    #[inline]
    pub fn distance_l(&self) -> f64 {
        self.left.distance_mm
    }

    /// Right distance [mm].
    #[inline]
    pub fn distance_r(&self) -> f64 {
        self.right.distance_mm
    }

    /// Left instantaneous speed [mm/s].
    #[inline]
    pub fn speed_l(&self) -> f64 {
        self.left.speed_mm_s
    }

    /// Right instantaneous speed [mm/s].
    #[inline]
    pub fn speed_r(&self) -> f64 {
        self.right.speed_mm_s
    }

    /// Left smoothed speed [mm/s].
    #[inline]
    pub fn speed_l_lp(&self) -> f64 {
        self.left.speed_mm_s_lp
    }

    /// Right smoothed speed [mm/s].
    #[inline]
    pub fn speed_r_lp(&self) -> f64 {
        self.right.speed_mm_s_lp
    }

    #[inline]
    pub fn left(&self) -> &WheelState {
        &self.left
    }

    #[inline]
    pub fn right(&self) -> &WheelState {
        &self.right
    }

    /// Last positive sampling interval [s].
    #[inline]
    pub fn last_dt_s(&self) -> f64 {
        self.last_dt_s
    }

    /// Distance per count [mm].
    #[inline]
    pub fn mm_per_count(&self) -> f64 {
        self.mm_per_count
    }

    pub fn snapshot(&self) -> WheelSnapshot {
        WheelSnapshot {
            distance_l: self.left.distance_mm,
            distance_r: self.right.distance_mm,
            speed_l: self.left.speed_mm_s,
            speed_r: self.right.speed_mm_s,
            speed_l_lp: self.left.speed_mm_s_lp,
            speed_r_lp: self.right.speed_mm_s_lp,
            samples: self.sample_counter,
        }
    }
}

/// Tracker shared between the hardware link (writer) and controllers (readers).
#[derive(Debug)]
pub struct SharedWheelEncoder {
    inner: Mutex<WheelEncoderTracker>,
}

impl SharedWheelEncoder {
    pub fn new(config: &WheelConfig) -> Self {
        Self {
            inner: Mutex::new(WheelEncoderTracker::new(config)),
        }
    }

    /// Both wheels from the same update.
    pub fn snapshot(&self) -> WheelSnapshot {
        self.inner.lock().snapshot()
    }
}

impl WheelDataListener for SharedWheelEncoder {
    fn on_wheel_data_update(&self, timestamp_nanos: i64, count_left: i64, count_right: i64) {
        self.inner
            .lock()
            .update(timestamp_nanos, count_left, count_right);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
