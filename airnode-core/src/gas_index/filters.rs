//! Output stages turning the baseline-normalised signal into an index.

use libm::{expf, fabsf};

use super::{LP_ALPHA, LP_TAU_FAST, LP_TAU_SLOW, SAMPLING_INTERVAL, SIGMOID_L};

/// Normalises a raw sample against the tracked baseline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MoxModel {
    sraw_std: f32,
    sraw_mean: f32,
    std_bonus: f32,
    gain: f32,
}

impl MoxModel {
    #[must_use]
    pub const fn new(std_bonus: f32, gain: f32) -> Self {
        Self {
            sraw_std: 0.0,
            sraw_mean: 0.0,
            std_bonus,
            gain,
        }
    }

    pub fn set_parameters(&mut self, sraw_std: f32, sraw_mean: f32) {
        self.sraw_std = sraw_std;
        self.sraw_mean = sraw_mean;
    }

    #[must_use]
    pub fn process(&self, sraw: f32) -> f32 {
        ((sraw - self.sraw_mean) / (-(self.sraw_std + self.std_bonus))) * self.gain
    }
}

/// Maps the normalised signal onto the 0..=500 index scale around `offset`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SigmoidScaled {
    x0: f32,
    k: f32,
    offset_default: f32,
    offset: f32,
}

impl SigmoidScaled {
    #[must_use]
    pub const fn new(x0: f32, k: f32, offset_default: f32, offset: f32) -> Self {
        Self {
            x0,
            k,
            offset_default,
            offset,
        }
    }

    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn process(&self, sample: f32) -> f32 {
        let x = self.k * (sample - self.x0);
        if x < -50.0 {
            SIGMOID_L
        } else if x > 50.0 {
            0.0
        } else if sample >= 0.0 {
            let shift = if self.offset_default == 1.0 {
                (500.0 / 499.0) * (1.0 - self.offset)
            } else {
                (SIGMOID_L - 5.0 * self.offset) / 4.0
            };
            (SIGMOID_L + shift) / (1.0 + expf(x)) - shift
        } else {
            (self.offset / self.offset_default) * (SIGMOID_L / (1.0 + expf(x)))
        }
    }
}

/// Low-pass whose time constant shrinks when the signal moves quickly.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AdaptiveLowpass {
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    x3: f32,
    initialized: bool,
}

impl AdaptiveLowpass {
    #[must_use]
    pub fn new() -> Self {
        Self {
            a1: SAMPLING_INTERVAL / (LP_TAU_FAST + SAMPLING_INTERVAL),
            a2: SAMPLING_INTERVAL / (LP_TAU_SLOW + SAMPLING_INTERVAL),
            x1: 0.0,
            x2: 0.0,
            x3: 0.0,
            initialized: false,
        }
    }

    pub fn process(&mut self, sample: f32) -> f32 {
        if !self.initialized {
            self.x1 = sample;
            self.x2 = sample;
            self.x3 = sample;
            self.initialized = true;
        }

        self.x1 = (1.0 - self.a1) * self.x1 + self.a1 * sample;
        self.x2 = (1.0 - self.a2) * self.x2 + self.a2 * sample;

        let abs_delta = fabsf(self.x1 - self.x2);
        let f1 = expf(LP_ALPHA * abs_delta);
        let tau_a = (LP_TAU_SLOW - LP_TAU_FAST) * f1 + LP_TAU_FAST;
        let a3 = SAMPLING_INTERVAL / (SAMPLING_INTERVAL + tau_a);
        self.x3 = (1.0 - a3) * self.x3 + a3 * sample;
        self.x3
    }
}

impl Default for AdaptiveLowpass {
    fn default() -> Self {
        Self::new()
    }
}
