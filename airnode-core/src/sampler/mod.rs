//! Fixed-count, fixed-rate compensated sampling loop.

use core::time::Duration;

use crate::duration_ms;
use crate::gas_index::GasIndexAlgorithm;
use crate::sensors::{Clock, GasIndexRawSensor};
use crate::state::AlgorithmState;

pub mod compensation;

pub use compensation::{CompensationInput, CompensationTicks, DEFAULT_COMPENSATION};

/// Number of samples fed to the algorithm per cycle.
pub const DEFAULT_SAMPLE_COUNT: u16 = 60;
/// Sampling period the gas-index algorithm is tuned for.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// Per-run counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SampleStats {
    pub attempted: u16,
    pub accepted: u16,
}

impl SampleStats {
    #[must_use]
    pub const fn dropped(&self) -> u16 {
        self.attempted.saturating_sub(self.accepted)
    }
}

/// Result of one sampling run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SamplerRun {
    /// Index from the last accepted sample; `None` when every read failed.
    pub index: Option<f32>,
    /// Algorithm state after the last sample.
    pub state: AlgorithmState,
    pub stats: SampleStats,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CompensatedSampler {
    count: u16,
    period: Duration,
}

impl CompensatedSampler {
    #[must_use]
    pub const fn new(count: u16, period: Duration) -> Self {
        Self { count, period }
    }

    #[must_use]
    pub const fn count(&self) -> u16 {
        self.count
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Runs exactly `count` iterations one `period` apart.
    ///
    /// The algorithm is reset first, then seeded with `seed` unless it is a
    /// cold start, so nothing from an earlier run leaks in. A failed
    /// raw read skips the algorithm for that iteration and keeps the previous
    /// index; it never shortens the run.
    pub fn run<G, A, C>(
        &self,
        sensor: &mut G,
        algorithm: &mut A,
        clock: &mut C,
        compensation: CompensationInput,
        seed: AlgorithmState,
    ) -> SamplerRun
    where
        G: GasIndexRawSensor,
        A: GasIndexAlgorithm,
        C: Clock,
    {
        algorithm.reset();
        if !seed.is_cold_start() {
            algorithm.set_states(seed.s0, seed.s1);
        }

        let period_ms = duration_ms(self.period);
        let mut index = None;
        let mut stats = SampleStats::default();

        for _ in 0..self.count {
            let started = clock.now_ms();
            stats.attempted += 1;

            let ticks = compensation.encode();
            if let Some((voc_raw, _nox_raw)) = sensor.measure(ticks.humidity, ticks.temperature) {
                index = Some(algorithm.process(voc_raw));
                stats.accepted += 1;
            }

            let spent = clock.now_ms().saturating_sub(started);
            clock.sleep_ms(period_ms.saturating_sub(spent));
        }

        SamplerRun {
            index,
            state: AlgorithmState::from(algorithm.get_states()),
            stats,
        }
    }
}

impl Default for CompensatedSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_COUNT, DEFAULT_SAMPLE_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SelfTestError;

    /// Gas sensor that advances the shared clock per measurement and fails on chosen calls.
    struct SlowGas<'a> {
        clock_cost_ms: u64,
        now: &'a core::cell::Cell<u64>,
        calls: u16,
        fail_on: &'a [u16],
        last_ticks: Option<(u16, u16)>,
    }

    impl GasIndexRawSensor for SlowGas<'_> {
        fn init(&mut self) -> bool {
            true
        }

        fn self_test(&mut self) -> Result<u16, SelfTestError> {
            Ok(0xD400)
        }

        fn measure(&mut self, rh: u16, t: u16) -> Option<(u16, u16)> {
            self.calls += 1;
            self.now.set(self.now.get() + self.clock_cost_ms);
            self.last_ticks = Some((rh, t));
            if self.fail_on.contains(&self.calls) {
                None
            } else {
                Some((30_000 + self.calls, 15_000))
            }
        }
    }

    /// Clock whose time can also be advanced by the sensor mock.
    struct SharedClock<'a> {
        now: &'a core::cell::Cell<u64>,
        total_slept: u64,
    }

    impl Clock for SharedClock<'_> {
        fn now_ms(&self) -> u64 {
            self.now.get()
        }

        fn sleep_ms(&mut self, duration_ms: u64) {
            self.total_slept += duration_ms;
            self.now.set(self.now.get() + duration_ms);
        }
    }

    /// Algorithm that echoes the raw value and counts the samples it saw.
    #[derive(Default)]
    struct Echo {
        seeded: Option<(f32, f32)>,
        processed: u16,
    }

    impl GasIndexAlgorithm for Echo {
        fn get_states(&self) -> (f32, f32) {
            let (s0, s1) = self.seeded.unwrap_or((0.0, 0.0));
            (s0 + f32::from(self.processed), s1)
        }

        fn set_states(&mut self, s0: f32, s1: f32) {
            self.seeded = Some((s0, s1));
        }

        fn process(&mut self, raw: u16) -> f32 {
            self.processed += 1;
            f32::from(raw)
        }

        fn reset(&mut self) {
            *self = Self::default();
        }
    }

    fn gas<'a>(now: &'a core::cell::Cell<u64>, fail_on: &'a [u16]) -> SlowGas<'a> {
        SlowGas {
            clock_cost_ms: 120,
            now,
            calls: 0,
            fail_on,
            last_ticks: None,
        }
    }

    #[test]
    fn failed_reads_do_not_shorten_the_run() {
        let now = core::cell::Cell::new(0);
        let mut sensor = gas(&now, &[2, 5, 6]);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        let mut algorithm = Echo::default();
        let sampler = CompensatedSampler::new(8, Duration::from_secs(1));

        let run = sampler.run(
            &mut sensor,
            &mut algorithm,
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::COLD_START,
        );

        assert_eq!(sensor.calls, 8);
        assert_eq!(run.stats, SampleStats { attempted: 8, accepted: 5 });
        assert_eq!(run.stats.dropped(), 3);
        assert_eq!(algorithm.processed, 5);
        assert_eq!(run.index, Some(30_008.0));
    }

    #[test]
    fn last_failure_keeps_previous_index() {
        let now = core::cell::Cell::new(0);
        let mut sensor = gas(&now, &[4]);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        let run = CompensatedSampler::new(4, Duration::from_secs(1)).run(
            &mut sensor,
            &mut Echo::default(),
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::COLD_START,
        );
        assert_eq!(run.index, Some(30_003.0));
    }

    #[test]
    fn all_failures_yield_no_index() {
        let now = core::cell::Cell::new(0);
        let mut sensor = gas(&now, &[1, 2, 3]);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        let run = CompensatedSampler::new(3, Duration::from_secs(1)).run(
            &mut sensor,
            &mut Echo::default(),
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::COLD_START,
        );
        assert_eq!(run.index, None);
        assert_eq!(run.stats.accepted, 0);
    }

    #[test]
    fn cadence_subtracts_time_spent_measuring() {
        let now = core::cell::Cell::new(0);
        let mut sensor = gas(&now, &[]);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        CompensatedSampler::new(5, Duration::from_secs(1)).run(
            &mut sensor,
            &mut Echo::default(),
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::COLD_START,
        );
        assert_eq!(clock.total_slept, 5 * 880);
        assert_eq!(now.get(), 5_000);
    }

    #[test]
    fn overrunning_iteration_does_not_sleep() {
        let now = core::cell::Cell::new(0);
        let mut sensor = gas(&now, &[]);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        CompensatedSampler::new(2, Duration::from_millis(100)).run(
            &mut sensor,
            &mut Echo::default(),
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::COLD_START,
        );
        assert_eq!(clock.total_slept, 0);
        assert_eq!(sensor.calls, 2);
    }

    #[test]
    fn restored_state_seeds_algorithm_and_cold_start_does_not() {
        let now = core::cell::Cell::new(0);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        let sampler = CompensatedSampler::new(3, Duration::from_secs(1));

        let mut warm = Echo::default();
        let run = sampler.run(
            &mut gas(&now, &[]),
            &mut warm,
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::new(100.0, 40.0),
        );
        assert_eq!(warm.seeded, Some((100.0, 40.0)));
        assert_eq!(run.state, AlgorithmState::new(103.0, 40.0));

        let mut cold = Echo::default();
        sampler.run(
            &mut gas(&now, &[]),
            &mut cold,
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::COLD_START,
        );
        assert_eq!(cold.seeded, None);
    }

    #[test]
    fn reused_algorithm_starts_each_run_from_scratch() {
        let now = core::cell::Cell::new(0);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        let sampler = CompensatedSampler::new(3, Duration::from_secs(1));
        let mut algorithm = Echo::default();

        sampler.run(
            &mut gas(&now, &[]),
            &mut algorithm,
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::new(100.0, 40.0),
        );
        let run = sampler.run(
            &mut gas(&now, &[]),
            &mut algorithm,
            &mut clock,
            DEFAULT_COMPENSATION,
            AlgorithmState::COLD_START,
        );

        assert_eq!(algorithm.seeded, None);
        assert_eq!(algorithm.processed, 3);
        assert_eq!(run.state, AlgorithmState::new(3.0, 0.0));
    }

    #[test]
    fn compensation_ticks_reach_the_sensor() {
        let now = core::cell::Cell::new(0);
        let mut sensor = gas(&now, &[]);
        let mut clock = SharedClock {
            now: &now,
            total_slept: 0,
        };
        CompensatedSampler::new(1, Duration::from_secs(1)).run(
            &mut sensor,
            &mut Echo::default(),
            &mut clock,
            CompensationInput::new(25.0, 50.0),
            AlgorithmState::COLD_START,
        );
        assert_eq!(sensor.last_ticks, Some((0x7FFF, 0x6666)));
    }
}
