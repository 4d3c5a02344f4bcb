use core::time::Duration;

use crate::gate::Co2Mode;
use crate::poller::{DEFAULT_POLL_DEADLINE, DEFAULT_POLL_INTERVAL, PollConfig};
use crate::sampler::{
    CompensationInput, DEFAULT_COMPENSATION, DEFAULT_SAMPLE_COUNT, DEFAULT_SAMPLE_PERIOD,
};

/// Time between the end of one cycle and the next wake.
pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_mins(10);

/// Settling time granted to the CO2 sensor after periodic mode starts.
pub const DEFAULT_CO2_WARMUP: Duration = Duration::from_secs(5);

/// Timing and fallback parameters for one wake cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CycleConfig {
    pub sample_count: u16,
    pub sample_period: Duration,
    pub co2_warmup: Duration,
    pub co2_mode: Co2Mode,
    pub poll: PollConfig,
    pub sleep_interval: Duration,
    pub fallback_compensation: CompensationInput,
}

impl CycleConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            co2_warmup: DEFAULT_CO2_WARMUP,
            co2_mode: Co2Mode::new(true, false),
            poll: PollConfig::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_DEADLINE),
            sleep_interval: DEFAULT_SLEEP_INTERVAL,
            fallback_compensation: DEFAULT_COMPENSATION,
        }
    }

    #[must_use]
    pub const fn with_sampling(mut self, count: u16, period: Duration) -> Self {
        self.sample_count = count;
        self.sample_period = period;
        self
    }

    #[must_use]
    pub const fn with_co2_warmup(mut self, warmup: Duration) -> Self {
        self.co2_warmup = warmup;
        self
    }

    #[must_use]
    pub const fn with_co2_mode(mut self, mode: Co2Mode) -> Self {
        self.co2_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub const fn with_sleep_interval(mut self, interval: Duration) -> Self {
        self.sleep_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_fallback_compensation(mut self, fallback: CompensationInput) -> Self {
        self.fallback_compensation = fallback;
        self
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self::new()
    }
}
