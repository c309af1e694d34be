//! Tilt estimation and the shared orientation cell.
//!
//! `TiltEstimator` is a complementary filter: the integrated gyro rate
//! tracks fast motion, the accelerometer angle removes drift.
//!
//! ```text
//! theta_acc = atan2(a_forward, a_vertical)
//! theta     = alpha · (theta + gyro · dt) + (1 - alpha) · theta_acc
//! theta_dot = EMA(gyro)
//! ```
//!
//! `SharedOrientation` publishes the estimate through a [`Slot`] so the
//! balance controller always reads angle and rate from the same update.

use abc_common::consts::NANOS_PER_SEC;
use abc_common::hal::driver::{ImuListener, OrientationSource};
use abc_common::hal::types::ImuSample;
use abc_common::robot::config::OrientationConfig;
use abc_common::robot::types::OrientationSample;
use abc_common::slot::Slot;
use parking_lot::Mutex;
use tracing::debug;

use crate::control::filters::{EmaState, ema_apply};

/// Complementary-filter tilt estimator.
#[derive(Debug, Clone)]
pub struct TiltEstimator {
    alpha: f64,
    rate_weight: f64,
    theta_deg: f64,
    rate: EmaState,
    last_timestamp: Option<i64>,
}

impl TiltEstimator {
    pub fn new(config: &OrientationConfig) -> Self {
        Self {
            alpha: config.complementary_alpha,
            rate_weight: config.rate_ema_weight,
            theta_deg: 0.0,
            rate: EmaState::default(),
            last_timestamp: None,
        }
    }

    /// Tilt implied by the accelerometer alone [deg].
    #[inline]
    pub fn accel_tilt_deg(sample: &ImuSample) -> f64 {
        sample.accel_forward.atan2(sample.accel_vertical).to_degrees()
    }

    /// Fuse one IMU sample.
    ///
    /// Returns `None` when the sample carries no new information
    /// (non-finite readings or a non-positive interval).
    pub fn update(&mut self, sample: &ImuSample) -> Option<OrientationSample> {
        if !(sample.accel_forward.is_finite()
            && sample.accel_vertical.is_finite()
            && sample.gyro_deg_s.is_finite())
        {
            return None;
        }

        let theta_acc = Self::accel_tilt_deg(sample);
        match self.last_timestamp {
            None => {
                self.theta_deg = theta_acc;
                self.rate = EmaState::with_value(sample.gyro_deg_s);
            }
            Some(last) => {
                let dt_ns = sample.timestamp_nanos.saturating_sub(last);
                if dt_ns <= 0 {
                    return None;
                }
                let dt = dt_ns as f64 / NANOS_PER_SEC;
                self.theta_deg = self.alpha * (self.theta_deg + sample.gyro_deg_s * dt)
                    + (1.0 - self.alpha) * theta_acc;
                ema_apply(&mut self.rate, self.rate_weight, sample.gyro_deg_s);
            }
        }
        self.last_timestamp = Some(sample.timestamp_nanos);
        Some(self.estimate())
    }

    /// Current estimate.
    #[inline]
    pub fn estimate(&self) -> OrientationSample {
        OrientationSample {
            theta_deg: self.theta_deg,
            theta_deg_dot: self.rate.value(),
        }
    }
}

/// Latest orientation, written by the IMU pipeline and read by controllers.
///
/// Either feed raw IMU samples (fused by the internal estimator) or
/// [`publish`](Self::publish) an externally computed orientation.
#[derive(Debug)]
pub struct SharedOrientation {
    estimator: Mutex<TiltEstimator>,
    latest: Slot<OrientationSample>,
}

impl SharedOrientation {
    pub fn new(config: &OrientationConfig) -> Self {
        Self {
            estimator: Mutex::new(TiltEstimator::new(config)),
            latest: Slot::default(),
        }
    }

    /// Overwrite the held orientation.
    pub fn publish(&self, sample: OrientationSample) {
        self.latest.store(sample);
    }

    /// Number of published updates.
    pub fn updates(&self) -> u64 {
        self.latest.version()
    }
}

impl OrientationSource for SharedOrientation {
    fn theta_deg(&self) -> f64 {
        self.latest.load().theta_deg
    }

    fn theta_deg_dot(&self) -> f64 {
        self.latest.load().theta_deg_dot
    }

    fn sample(&self) -> OrientationSample {
        self.latest.load()
    }
}

impl ImuListener for SharedOrientation {
    fn on_imu_sample(&self, sample: &ImuSample) {
        let estimate = self.estimator.lock().update(sample);
        match estimate {
            Some(o) => self.latest.store(o),
            None => debug!(ts = sample.timestamp_nanos, "IMU sample skipped"),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const G: f64 = 9.81;

    fn imu(ts_ms: i64, theta_deg: f64, gyro_deg_s: f64) -> ImuSample {
        let r = theta_deg.to_radians();
        ImuSample {
            timestamp_nanos: ts_ms * 1_000_000,
            accel_forward: G * r.sin(),
            accel_vertical: G * r.cos(),
            gyro_deg_s,
        }
    }

    #[test]
    fn first_sample_initialises_from_accelerometer() {
        let mut est = TiltEstimator::new(&OrientationConfig::default());
        let o = est.update(&imu(0, 4.0, 1.5)).unwrap();
        assert!((o.theta_deg - 4.0).abs() < 1e-9);
        assert_eq!(o.theta_deg_dot, 1.5);
    }

    #[test]
    fn gyro_integration_between_samples() {
        let cfg = OrientationConfig {
            complementary_alpha: 1.0,
            rate_ema_weight: 1.0,
        };
        let mut est = TiltEstimator::new(&cfg);
        est.update(&imu(0, 0.0, 10.0));
        // 10 deg/s for 100 ms with the accelerometer ignored.
        let o = est.update(&imu(100, 0.0, 10.0)).unwrap();
        assert!((o.theta_deg - 1.0).abs() < 1e-9);
    }

    #[test]
    fn accelerometer_removes_gyro_bias_drift() {
        let mut est = TiltEstimator::new(&OrientationConfig::default());
        // Upright robot, gyro with a constant 2 deg/s bias.
        for i in 0..5_000 {
            est.update(&imu(i * 2, 0.0, 2.0));
        }
        let o = est.estimate();
        // Steady state: alpha·bias·dt / (1 - alpha) = 0.98·2·0.002 / 0.02 ≈ 0.196 deg
        assert!(o.theta_deg.abs() < 0.25, "drift not bounded: {}", o.theta_deg);
    }

    #[test]
    fn non_positive_dt_is_skipped() {
        let mut est = TiltEstimator::new(&OrientationConfig::default());
        est.update(&imu(10, 2.0, 0.0));
        let before = est.estimate();
        assert!(est.update(&imu(10, 8.0, 50.0)).is_none());
        assert!(est.update(&imu(5, 8.0, 50.0)).is_none());
        assert_eq!(est.estimate(), before);
    }

    #[test]
    fn timestamp_jump_across_i64_range_is_skipped() {
        let mut est = TiltEstimator::new(&OrientationConfig::default());
        let mut s = imu(0, 2.0, 0.0);
        s.timestamp_nanos = i64::MAX;
        est.update(&s);
        let before = est.estimate();
        let mut s = imu(0, 8.0, 50.0);
        s.timestamp_nanos = i64::MIN;
        assert!(est.update(&s).is_none());
        assert_eq!(est.estimate(), before);
    }

    #[test]
    fn non_finite_sample_is_skipped() {
        let mut est = TiltEstimator::new(&OrientationConfig::default());
        let mut s = imu(0, 1.0, 0.0);
        s.gyro_deg_s = f64::NAN;
        assert!(est.update(&s).is_none());
        assert!(est.estimate().is_finite());
    }

    #[test]
    fn shared_orientation_publishes_consistent_pair() {
        let shared = SharedOrientation::new(&OrientationConfig::default());
        assert_eq!(shared.updates(), 0);
        shared.on_imu_sample(&imu(0, -3.0, 7.0));
        let s = shared.sample();
        assert!((s.theta_deg + 3.0).abs() < 1e-9);
        assert_eq!(s.theta_deg_dot, 7.0);
        assert_eq!(shared.updates(), 1);

        shared.publish(OrientationSample {
            theta_deg: 5.0,
            theta_deg_dot: 0.0,
        });
        assert_eq!(shared.theta_deg(), 5.0);
        assert_eq!(shared.theta_deg_dot(), 0.0);
    }
}
