// Smoothing module - recursive per-frame estimators
//
// Two filter kinds stabilize noisy per-frame measurements without growing
// state: a scalar Kalman-style estimator (used for cents and brightness)
// and an exponential moving average (used for loudness). Both are O(1) in
// memory regardless of stream length and can be reset mid-stream.

use crate::config::KalmanConfig;

/// Scalar Kalman-style recursive estimator
///
/// Per measurement z: predict (P += Q), gain K = P / (P + R), update
/// x += K * (z - x), P *= (1 - K). Higher Q tracks faster with more
/// residual noise; higher R smooths harder with more lag.
#[derive(Debug, Clone)]
pub struct ScalarKalman {
    q: f32,
    r: f32,
    x: f32,
    p: f32,
    initial_estimate: f32,
    initial_covariance: f32,
}

impl ScalarKalman {
    pub fn new(config: KalmanConfig) -> Self {
        Self {
            q: config.process_noise,
            r: config.measurement_noise,
            x: config.initial_estimate,
            p: config.initial_covariance,
            initial_estimate: config.initial_estimate,
            initial_covariance: config.initial_covariance,
        }
    }

    /// Fold one measurement into the estimate and return the new estimate.
    ///
    /// Non-finite measurements are ignored: the current estimate is returned
    /// unchanged so one bad frame cannot poison the filter state.
    pub fn update(&mut self, z: f32) -> f32 {
        if !z.is_finite() {
            return self.x;
        }
        self.p += self.q;
        let k = self.p / (self.p + self.r);
        self.x += k * (z - self.x);
        self.p *= 1.0 - k;
        self.x
    }

    /// Current estimate without folding in a new measurement
    pub fn estimate(&self) -> f32 {
        self.x
    }

    /// Restore the construction-time estimate and covariance
    pub fn reset(&mut self) {
        self.x = self.initial_estimate;
        self.p = self.initial_covariance;
    }
}

/// Exponential moving average
///
/// x = alpha * z + (1 - alpha) * x. Alpha in (0, 1]; alpha = 1 disables
/// smoothing entirely. The first measurement after construction or reset
/// seeds the accumulator directly so the output does not ramp up from an
/// arbitrary initial value.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f32,
    value: f32,
    primed: bool,
}

impl Ema {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            value: 0.0,
            primed: false,
        }
    }

    /// Fold one measurement in and return the smoothed value.
    ///
    /// Non-finite measurements are ignored, as in [`ScalarKalman::update`].
    pub fn update(&mut self, z: f32) -> f32 {
        if !z.is_finite() {
            return self.value;
        }
        if self.primed {
            self.value = self.alpha * z + (1.0 - self.alpha) * self.value;
        } else {
            self.value = z;
            self.primed = true;
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Clear the accumulator; the next measurement seeds it again
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.primed = false;
    }
}
