//! Adaptive mean/variance estimator tracking the raw-signal baseline.

use libm::{expf, sqrtf};

use super::{
    GATING_MAX_RATIO, GATING_THRESHOLD_INITIAL, GATING_THRESHOLD_TRANSITION, SAMPLING_INTERVAL,
};

const GAMMA_SCALING: f32 = 64.0;
const ADDITIONAL_GAMMA_MEAN_SCALING: f32 = 8.0;
const FIX16_MAX: f32 = 32_767.0;

/// Tuning for one estimator instance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EstimatorTuning {
    pub sraw_std_initial: f32,
    pub tau_mean_hours: f32,
    pub tau_variance_hours: f32,
    pub tau_initial_mean: f32,
    pub tau_initial_variance: f32,
    pub init_duration_mean: f32,
    pub init_duration_variance: f32,
    pub init_transition_mean: f32,
    pub init_transition_variance: f32,
    pub gating_threshold: f32,
    pub gating_max_duration_minutes: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeanVarianceEstimator {
    tuning: EstimatorTuning,
    initialized: bool,
    mean: f32,
    sraw_offset: f32,
    std: f32,
    gamma_mean_base: f32,
    gamma_variance_base: f32,
    gamma_initial_mean: f32,
    gamma_initial_variance: f32,
    gamma_mean: f32,
    gamma_variance: f32,
    uptime_gamma: f32,
    uptime_gating: f32,
    gating_duration_minutes: f32,
}

impl MeanVarianceEstimator {
    #[must_use]
    pub fn new(tuning: EstimatorTuning) -> Self {
        let interval_hours = SAMPLING_INTERVAL / 3600.0;
        Self {
            tuning,
            initialized: false,
            mean: 0.0,
            sraw_offset: 0.0,
            std: tuning.sraw_std_initial,
            gamma_mean_base: (ADDITIONAL_GAMMA_MEAN_SCALING * GAMMA_SCALING * interval_hours)
                / (tuning.tau_mean_hours + interval_hours),
            gamma_variance_base: (GAMMA_SCALING * interval_hours)
                / (tuning.tau_variance_hours + interval_hours),
            gamma_initial_mean: (ADDITIONAL_GAMMA_MEAN_SCALING * GAMMA_SCALING * SAMPLING_INTERVAL)
                / (tuning.tau_initial_mean + SAMPLING_INTERVAL),
            gamma_initial_variance: (GAMMA_SCALING * SAMPLING_INTERVAL)
                / (tuning.tau_initial_variance + SAMPLING_INTERVAL),
            gamma_mean: 0.0,
            gamma_variance: 0.0,
            uptime_gamma: 0.0,
            uptime_gating: 0.0,
            gating_duration_minutes: 0.0,
        }
    }

    #[must_use]
    pub fn mean(&self) -> f32 {
        self.mean + self.sraw_offset
    }

    #[must_use]
    pub fn std(&self) -> f32 {
        self.std
    }

    /// Restores a persisted baseline, skipping the initial-learning phase by `uptime_gamma` seconds.
    pub fn set_states(&mut self, mean: f32, std: f32, uptime_gamma: f32) {
        self.mean = mean;
        self.sraw_offset = 0.0;
        self.std = std;
        self.uptime_gamma = uptime_gamma;
        self.initialized = true;
    }

    /// Feeds one offset-corrected raw sample, gated by the current index.
    pub fn process(&mut self, sraw: f32, gas_index: f32) {
        if !self.initialized {
            self.initialized = true;
            self.sraw_offset = sraw;
            self.mean = 0.0;
            return;
        }

        if self.mean >= 100.0 || self.mean <= -100.0 {
            self.sraw_offset += self.mean;
            self.mean = 0.0;
        }

        let sraw = sraw - self.sraw_offset;
        self.calculate_gamma(gas_index);

        let delta = (sraw - self.mean) / GAMMA_SCALING;
        let c = if delta < 0.0 {
            self.std - delta
        } else {
            self.std + delta
        };
        let additional_scaling = if c > 1440.0 {
            (c / 1440.0) * (c / 1440.0)
        } else {
            1.0
        };

        self.std = sqrtf(additional_scaling * (GAMMA_SCALING - self.gamma_variance))
            * sqrtf(
                self.std * (self.std / (GAMMA_SCALING * additional_scaling))
                    + ((self.gamma_variance * delta) / additional_scaling) * delta,
            );
        self.mean += (self.gamma_mean * delta) / ADDITIONAL_GAMMA_MEAN_SCALING;
    }

    fn calculate_gamma(&mut self, gas_index: f32) {
        let uptime_limit = FIX16_MAX - SAMPLING_INTERVAL;
        if self.uptime_gamma < uptime_limit {
            self.uptime_gamma += SAMPLING_INTERVAL;
        }
        if self.uptime_gating < uptime_limit {
            self.uptime_gating += SAMPLING_INTERVAL;
        }

        let tuning = self.tuning;

        let mean_ramp = Sigmoid::new(tuning.init_duration_mean, tuning.init_transition_mean);
        let sigmoid_gamma_mean = mean_ramp.process(self.uptime_gamma);
        let gamma_mean = self.gamma_mean_base
            + (self.gamma_initial_mean - self.gamma_mean_base) * sigmoid_gamma_mean;
        let gating_threshold_mean = tuning.gating_threshold
            + (GATING_THRESHOLD_INITIAL - tuning.gating_threshold)
                * mean_ramp.process(self.uptime_gating);
        let sigmoid_gating_mean =
            Sigmoid::new(gating_threshold_mean, GATING_THRESHOLD_TRANSITION).process(gas_index);
        self.gamma_mean = sigmoid_gating_mean * gamma_mean;

        let variance_ramp = Sigmoid::new(
            tuning.init_duration_variance,
            tuning.init_transition_variance,
        );
        let sigmoid_gamma_variance = variance_ramp.process(self.uptime_gamma);
        let gamma_variance = self.gamma_variance_base
            + (self.gamma_initial_variance - self.gamma_variance_base)
                * (sigmoid_gamma_variance - sigmoid_gamma_mean);
        let gating_threshold_variance = tuning.gating_threshold
            + (GATING_THRESHOLD_INITIAL - tuning.gating_threshold)
                * variance_ramp.process(self.uptime_gating);
        let sigmoid_gating_variance =
            Sigmoid::new(gating_threshold_variance, GATING_THRESHOLD_TRANSITION).process(gas_index);
        self.gamma_variance = sigmoid_gating_variance * gamma_variance;

        self.gating_duration_minutes += (SAMPLING_INTERVAL / 60.0)
            * ((1.0 - sigmoid_gating_mean) * (1.0 + GATING_MAX_RATIO) - GATING_MAX_RATIO);
        if self.gating_duration_minutes < 0.0 {
            self.gating_duration_minutes = 0.0;
        }
        if self.gating_duration_minutes > tuning.gating_max_duration_minutes {
            self.uptime_gating = 0.0;
        }
    }
}

/// Logistic step centred on `x0` with slope `k`, saturating outside ±50.
#[derive(Copy, Clone, Debug)]
struct Sigmoid {
    x0: f32,
    k: f32,
}

impl Sigmoid {
    const fn new(x0: f32, k: f32) -> Self {
        Self { x0, k }
    }

    fn process(self, sample: f32) -> f32 {
        let x = self.k * (sample - self.x0);
        if x < -50.0 {
            1.0
        } else if x > 50.0 {
            0.0
        } else {
            1.0 / (1.0 + expf(x))
        }
    }
}
