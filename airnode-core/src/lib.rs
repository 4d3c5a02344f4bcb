#![no_std]

// Shared logic for the airnode sampling agent.
//
// Everything that decides what a wake cycle does lives here, behind traits
// for the sensors and board services, so the same orchestration runs on the
// STM32 firmware and in the host-side emulator without the standard library.

pub mod cycle;
pub mod gas_index;
pub mod gate;
pub mod poller;
pub mod power;
pub mod sampler;
pub mod sensors;
pub mod state;
pub mod telemetry;

use core::time::Duration;

/// Converts a [`Duration`] into whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts a [`Duration`] into whole microseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
