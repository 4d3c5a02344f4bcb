//! Sensor bring-up gate.
//!
//! Bring-up failures point at wiring or hardware faults, so every check here
//! is fail-fast: the first sensor that does not answer, or a gas sensor whose
//! self-test signature is wrong, aborts the cycle. Nothing is retried within
//! the cycle; the next wake is a fresh attempt.

use core::fmt;

use crate::sensors::{Co2Sensor, GasIndexRawSensor, SelfTestError, TemperatureHumiditySensor};

/// Self-test result reported by a healthy gas sensor.
pub const GAS_SELF_TEST_SIGNATURE: u16 = 0xD400;

/// Operating mode requested from the CO2 sensor during bring-up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Co2Mode {
    pub low_power: bool,
    pub auto_calibration: bool,
}

impl Co2Mode {
    #[must_use]
    pub const fn new(low_power: bool, auto_calibration: bool) -> Self {
        Self {
            low_power,
            auto_calibration,
        }
    }
}

impl Default for Co2Mode {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// Fatal bring-up failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateError {
    ReferenceAbsent,
    GasSensorAbsent,
    GasSelfTestFailed(SelfTestError),
    GasSelfTestMismatch { signature: u16 },
    Co2Absent,
    Co2StartFailed,
}

impl GateError {
    /// Compact numeric code used by the telemetry ring.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            GateError::ReferenceAbsent => 0x01,
            GateError::GasSensorAbsent => 0x02,
            GateError::GasSelfTestFailed(_) => 0x03,
            GateError::GasSelfTestMismatch { .. } => 0x04,
            GateError::Co2Absent => 0x05,
            GateError::Co2StartFailed => 0x06,
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::ReferenceAbsent => f.write_str("reference sensor not found"),
            GateError::GasSensorAbsent => f.write_str("gas sensor not found"),
            GateError::GasSelfTestFailed(error) => write!(f, "gas sensor {error}"),
            GateError::GasSelfTestMismatch { signature } => write!(
                f,
                "gas sensor self-test returned 0x{signature:04X}, expected 0x{GAS_SELF_TEST_SIGNATURE:04X}"
            ),
            GateError::Co2Absent => f.write_str("co2 sensor not found"),
            GateError::Co2StartFailed => f.write_str("co2 sensor refused periodic mode"),
        }
    }
}

/// Proof that every sensor passed bring-up and the CO2 sensor is measuring.
#[derive(Debug, Eq, PartialEq)]
pub struct Ready {
    _private: (),
}

/// Runs the bring-up checks in order: reference, gas (init + self-test), CO2.
#[derive(Copy, Clone, Debug, Default)]
pub struct SensorGate {
    co2_mode: Co2Mode,
}

impl SensorGate {
    #[must_use]
    pub const fn new(co2_mode: Co2Mode) -> Self {
        Self { co2_mode }
    }

    /// Brings the three sensors up in order and starts CO2 periodic mode.
    ///
    /// # Errors
    ///
    /// Returns the first [`GateError`] hit; later sensors are not touched.
    pub fn init_and_selftest<T, G, C>(
        &self,
        reference: &mut T,
        gas: &mut G,
        co2: &mut C,
    ) -> Result<Ready, GateError>
    where
        T: TemperatureHumiditySensor,
        G: GasIndexRawSensor,
        C: Co2Sensor,
    {
        if !reference.init() {
            return Err(GateError::ReferenceAbsent);
        }

        if !gas.init() {
            return Err(GateError::GasSensorAbsent);
        }
        let signature = gas.self_test().map_err(GateError::GasSelfTestFailed)?;
        if signature != GAS_SELF_TEST_SIGNATURE {
            return Err(GateError::GasSelfTestMismatch { signature });
        }

        if !co2.init(self.co2_mode.low_power, self.co2_mode.auto_calibration) {
            return Err(GateError::Co2Absent);
        }
        if !co2.start_periodic() {
            return Err(GateError::Co2StartFailed);
        }

        Ok(Ready { _private: () })
    }
}
