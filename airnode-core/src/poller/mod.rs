//! Deadline-bounded wait for the CO2 sensor's periodic measurement.
//!
//! The CO2 sensor publishes a reading every few seconds once periodic mode is
//! running. Missing the deadline is a degraded outcome: the cycle carries on
//! with an invalid secondary reading.

use core::time::Duration;

use crate::duration_ms;
use crate::sensors::{Clock, Co2Sensor};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(30);

/// Reading published by the CO2 sensor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SecondaryReading {
    pub co2_ppm: f32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl SecondaryReading {
    #[must_use]
    pub const fn new(co2_ppm: f32, temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            co2_ppm,
            temperature_c,
            humidity_pct,
        }
    }
}

impl From<(f32, f32, f32)> for SecondaryReading {
    fn from((co2_ppm, temperature_c, humidity_pct): (f32, f32, f32)) -> Self {
        Self::new(co2_ppm, temperature_c, humidity_pct)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub deadline: Duration,
}

impl PollConfig {
    #[must_use]
    pub const fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_DEADLINE)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BoundedPoller {
    config: PollConfig,
}

impl BoundedPoller {
    #[must_use]
    pub const fn new(config: PollConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> PollConfig {
        self.config
    }

    /// Polls every `interval` until a reading arrives or `deadline` elapses.
    ///
    /// Returns no later than `deadline + interval` after the call, measured on `clock`.
    pub fn wait_for_reading<S, C>(&self, sensor: &mut S, clock: &mut C) -> Option<SecondaryReading>
    where
        S: Co2Sensor,
        C: Clock,
    {
        let interval_ms = duration_ms(self.config.interval);
        let deadline_ms = duration_ms(self.config.deadline);
        let started = clock.now_ms();

        loop {
            if let Some(reading) = sensor.read() {
                return Some(reading.into());
            }
            if clock.now_ms().saturating_sub(started) >= deadline_ms {
                return None;
            }
            clock.sleep_ms(interval_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VirtualClock {
        now: u64,
    }

    impl Clock for VirtualClock {
        fn now_ms(&self) -> u64 {
            self.now
        }

        fn sleep_ms(&mut self, duration_ms: u64) {
            self.now += duration_ms;
        }
    }

    /// Becomes ready after a fixed number of polls.
    struct Co2 {
        ready_after: Option<u32>,
        polls: u32,
    }

    impl Co2 {
        fn ready_after(polls: u32) -> Self {
            Self {
                ready_after: Some(polls),
                polls: 0,
            }
        }

        fn never_ready() -> Self {
            Self {
                ready_after: None,
                polls: 0,
            }
        }
    }

    impl Co2Sensor for Co2 {
        fn init(&mut self, _: bool, _: bool) -> bool {
            true
        }

        fn start_periodic(&mut self) -> bool {
            true
        }

        fn read(&mut self) -> Option<(f32, f32, f32)> {
            self.polls += 1;
            match self.ready_after {
                Some(after) if self.polls > after => Some((612.0, 22.5, 41.0)),
                _ => None,
            }
        }
    }

    #[test]
    fn returns_first_available_reading() {
        let mut clock = VirtualClock::default();
        let mut sensor = Co2::ready_after(3);
        let reading = BoundedPoller::default().wait_for_reading(&mut sensor, &mut clock);

        assert_eq!(reading, Some(SecondaryReading::new(612.0, 22.5, 41.0)));
        assert_eq!(sensor.polls, 4);
        assert_eq!(clock.now, 1_500);
    }

    #[test]
    fn immediate_reading_does_not_wait() {
        let mut clock = VirtualClock::default();
        let reading = BoundedPoller::default().wait_for_reading(&mut Co2::ready_after(0), &mut clock);
        assert!(reading.is_some());
        assert_eq!(clock.now, 0);
    }

    #[test]
    fn never_ready_sensor_times_out_within_bound() {
        let mut clock = VirtualClock { now: 7_000 };
        let poller = BoundedPoller::default();
        let reading = poller.wait_for_reading(&mut Co2::never_ready(), &mut clock);

        let waited = clock.now - 7_000;
        assert_eq!(reading, None);
        assert!(waited >= 30_000);
        assert!(waited <= 30_000 + 500);
    }

    #[test]
    fn uneven_interval_still_respects_bound() {
        let mut clock = VirtualClock::default();
        let poller = BoundedPoller::new(PollConfig::new(
            Duration::from_millis(700),
            Duration::from_secs(2),
        ));
        let mut sensor = Co2::never_ready();
        assert_eq!(poller.wait_for_reading(&mut sensor, &mut clock), None);
        assert!(clock.now >= 2_000 && clock.now <= 2_700);
        assert_eq!(sensor.polls, 4);
    }
}
