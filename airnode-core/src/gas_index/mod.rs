//! Stateful gas-index computation.
//!
//! [`GasIndexAlgorithm`] is the seam the sampler drives. [`VocIndexAlgorithm`]
//! is the VOC index algorithm for MOX gas sensors sampled at 1 Hz: an
//! adaptive mean/variance estimator tracks the raw-signal baseline, a MOX
//! model normalises each sample against it, and a scaled sigmoid plus an
//! adaptive low-pass map the result onto the 1..=500 index (100 = typical
//! baseline). The estimator's `(mean, std)` pair is the state that survives
//! power cycles.

use libm::floorf;

pub mod estimator;
pub mod filters;

use estimator::{EstimatorTuning, MeanVarianceEstimator};
use filters::{AdaptiveLowpass, MoxModel, SigmoidScaled};

/// Seconds between samples the algorithm is tuned for.
pub const SAMPLING_INTERVAL: f32 = 1.0;
/// Samples ignored after reset while the sensor heater settles.
pub const INITIAL_BLACKOUT: f32 = 45.0;
pub const INDEX_GAIN: f32 = 230.0;
pub const SRAW_STD_INITIAL: f32 = 50.0;
pub const SRAW_STD_BONUS_VOC: f32 = 220.0;
pub const TAU_MEAN_HOURS: f32 = 12.0;
pub const TAU_VARIANCE_HOURS: f32 = 12.0;
pub const TAU_INITIAL_MEAN_VOC: f32 = 20.0;
pub const INIT_DURATION_MEAN_VOC: f32 = 3600.0 * 0.75;
pub const INIT_TRANSITION_MEAN: f32 = 0.01;
pub const TAU_INITIAL_VARIANCE: f32 = 2500.0;
pub const INIT_DURATION_VARIANCE_VOC: f32 = 3600.0 * 1.45;
pub const INIT_TRANSITION_VARIANCE: f32 = 0.01;
pub const GATING_THRESHOLD_VOC: f32 = 340.0;
pub const GATING_THRESHOLD_INITIAL: f32 = 510.0;
pub const GATING_THRESHOLD_TRANSITION: f32 = 0.09;
pub const GATING_VOC_MAX_DURATION_MINUTES: f32 = 60.0 * 3.0;
pub const GATING_MAX_RATIO: f32 = 0.3;
pub const SIGMOID_L: f32 = 500.0;
pub const SIGMOID_K_VOC: f32 = -0.0065;
pub const SIGMOID_X0_VOC: f32 = 213.0;
pub const VOC_INDEX_OFFSET: f32 = 100.0;
pub const LP_TAU_FAST: f32 = 20.0;
pub const LP_TAU_SLOW: f32 = 500.0;
pub const LP_ALPHA: f32 = -0.2;
pub const VOC_SRAW_MINIMUM: i32 = 20_000;
/// Uptime credited to a restored baseline so it skips initial learning.
pub const PERSISTENCE_UPTIME_GAMMA: f32 = 3.0 * 3600.0;

/// Estimator tuning for the VOC channel.
pub const VOC_TUNING: EstimatorTuning = EstimatorTuning {
    sraw_std_initial: SRAW_STD_INITIAL,
    tau_mean_hours: TAU_MEAN_HOURS,
    tau_variance_hours: TAU_VARIANCE_HOURS,
    tau_initial_mean: TAU_INITIAL_MEAN_VOC,
    tau_initial_variance: TAU_INITIAL_VARIANCE,
    init_duration_mean: INIT_DURATION_MEAN_VOC,
    init_duration_variance: INIT_DURATION_VARIANCE_VOC,
    init_transition_mean: INIT_TRANSITION_MEAN,
    init_transition_variance: INIT_TRANSITION_VARIANCE,
    gating_threshold: GATING_THRESHOLD_VOC,
    gating_max_duration_minutes: GATING_VOC_MAX_DURATION_MINUTES,
};

/// Stateful algorithm converting raw gas-sensor ticks into an index.
pub trait GasIndexAlgorithm {
    /// Returns the internal pair that must survive a power cycle.
    fn get_states(&self) -> (f32, f32);

    /// Restores a pair previously returned by [`get_states`](Self::get_states).
    fn set_states(&mut self, s0: f32, s1: f32);

    /// Feeds one raw sample and returns the updated index.
    fn process(&mut self, raw: u16) -> f32;

    /// Returns the algorithm to its canonical cold-start state.
    fn reset(&mut self);
}

/// VOC index algorithm at a 1 s sampling interval.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VocIndexAlgorithm {
    uptime: f32,
    sraw: f32,
    gas_index: f32,
    estimator: MeanVarianceEstimator,
    mox: MoxModel,
    sigmoid: SigmoidScaled,
    lowpass: AdaptiveLowpass,
}

impl VocIndexAlgorithm {
    /// Creates an algorithm in its canonical cold-start state.
    #[must_use]
    pub fn new() -> Self {
        let estimator = MeanVarianceEstimator::new(VOC_TUNING);
        let mut mox = MoxModel::new(SRAW_STD_BONUS_VOC, INDEX_GAIN);
        mox.set_parameters(estimator.std(), estimator.mean());

        Self {
            uptime: 0.0,
            sraw: 0.0,
            gas_index: 0.0,
            estimator,
            mox,
            sigmoid: SigmoidScaled::new(
                SIGMOID_X0_VOC,
                SIGMOID_K_VOC,
                VOC_INDEX_OFFSET,
                VOC_INDEX_OFFSET,
            ),
            lowpass: AdaptiveLowpass::new(),
        }
    }

    /// Returns `true` while the initial blackout is still suppressing output.
    #[must_use]
    pub fn in_blackout(&self) -> bool {
        self.uptime <= INITIAL_BLACKOUT
    }

    fn sync_model(&mut self) {
        self.mox
            .set_parameters(self.estimator.std(), self.estimator.mean());
    }
}

impl Default for VocIndexAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}

impl GasIndexAlgorithm for VocIndexAlgorithm {
    fn get_states(&self) -> (f32, f32) {
        (self.estimator.mean(), self.estimator.std())
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn set_states(&mut self, s0: f32, s1: f32) {
        self.estimator.set_states(s0, s1, PERSISTENCE_UPTIME_GAMMA);
        self.sync_model();
        self.sraw = s0;
    }

    fn process(&mut self, raw: u16) -> f32 {
        if self.in_blackout() {
            self.uptime += SAMPLING_INTERVAL;
        } else {
            let raw = i32::from(raw);
            if raw > 0 && raw < 65_000 {
                let clamped = raw.clamp(VOC_SRAW_MINIMUM + 1, VOC_SRAW_MINIMUM + 32_767);
                #[allow(clippy::cast_precision_loss)]
                let offset = (clamped - VOC_SRAW_MINIMUM) as f32;
                self.sraw = offset;
            }

            self.gas_index = self.mox.process(self.sraw);
            self.gas_index = self.sigmoid.process(self.gas_index);
            self.gas_index = self.lowpass.process(self.gas_index);
            if self.gas_index < 0.5 {
                self.gas_index = 0.5;
            }

            if self.sraw > 0.0 {
                self.estimator.process(self.sraw, self.gas_index);
                self.sync_model();
            }
        }

        floorf(self.gas_index + 0.5)
    }
}
