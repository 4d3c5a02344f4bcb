//! Collaborator traits for the sensor cluster and board services.
//!
//! The cycle logic never talks to a bus or a register directly. Firmware and
//! emulator targets implement these traits for their concrete hardware (or
//! simulation) and hand the implementations to the
//! [`CycleOrchestrator`](crate::cycle::CycleOrchestrator) for a single run.

use core::fmt;

pub mod frame;

/// Reference sensor providing the compensation climate (SHT4x class).
pub trait TemperatureHumiditySensor {
    /// Brings the sensor up. Returns `false` when it does not answer.
    fn init(&mut self) -> bool;

    /// Returns `(temperature °C, relative humidity %)` or `None` on a read error.
    fn read(&mut self) -> Option<(f32, f32)>;
}

/// Error code reported by a gas sensor self-test that could not complete.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SelfTestError {
    pub code: u16,
}

impl SelfTestError {
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self { code }
    }
}

impl fmt::Display for SelfTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "self-test error 0x{:04X}", self.code)
    }
}

/// Raw-signal gas sensor feeding the gas-index algorithm (SGP41 class).
pub trait GasIndexRawSensor {
    /// Brings the sensor up. Returns `false` when it does not answer.
    fn init(&mut self) -> bool;

    /// Runs the built-in self-test and returns the result signature.
    ///
    /// # Errors
    ///
    /// Returns [`SelfTestError`] when the sensor reports a transport or
    /// command failure instead of a signature.
    fn self_test(&mut self) -> Result<u16, SelfTestError>;

    /// Measures the raw `(voc, nox)` signals using the supplied compensation ticks.
    fn measure(&mut self, compensation_rh: u16, compensation_t: u16) -> Option<(u16, u16)>;
}

/// CO2 sensor with an asynchronous periodic measurement (SCD4x class).
pub trait Co2Sensor {
    /// Brings the sensor up in the requested mode.
    fn init(&mut self, low_power: bool, auto_calibration: bool) -> bool;

    /// Starts periodic measurements. Returns `false` when the sensor rejects it.
    fn start_periodic(&mut self) -> bool;

    /// Returns `(co2 ppm, temperature °C, relative humidity %)` once a
    /// measurement is ready, `None` otherwise.
    fn read(&mut self) -> Option<(f32, f32, f32)>;
}

/// Switched supply feeding the whole sensor cluster.
pub trait PowerRail {
    /// Drives the rail on (`true`) or off (`false`).
    fn set(&mut self, enabled: bool);
}

/// Battery voltage source.
pub trait BatteryMonitor {
    /// Samples the battery and returns its voltage in millivolts.
    fn read_millivolts(&mut self) -> u32;
}

/// Monotonic millisecond clock with a blocking delay.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;

    /// Blocks for `duration_ms`. Virtual clocks advance instead of waiting.
    fn sleep_ms(&mut self, duration_ms: u64);
}

/// Platform deep-sleep primitive. Never returns; the next wake is a fresh boot.
pub trait DeepSleep {
    /// Powers the node down for `duration_us` microseconds.
    fn enter(&mut self, duration_us: u64) -> !;
}

/// The three sensors that make up one measurement cluster.
#[derive(Debug)]
pub struct Sensors<T, G, C> {
    pub reference: T,
    pub gas: G,
    pub co2: C,
}

impl<T, G, C> Sensors<T, G, C>
where
    T: TemperatureHumiditySensor,
    G: GasIndexRawSensor,
    C: Co2Sensor,
{
    #[must_use]
    pub const fn new(reference: T, gas: G, co2: C) -> Self {
        Self {
            reference,
            gas,
            co2,
        }
    }
}
