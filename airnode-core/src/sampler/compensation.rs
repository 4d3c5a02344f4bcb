//! Temperature/humidity compensation ticks for the gas sensor's raw measurement.
//!
//! The gas sensor takes the ambient climate as two 16-bit words spanning its
//! full input range: 0..=100 %RH and -45..=130 °C. Out-of-range inputs clamp
//! to the nearest bound, NaN maps to the range minimum, and the scaled value
//! is truncated.

use core::fmt;

pub const HUMIDITY_MIN_PCT: f32 = 0.0;
pub const HUMIDITY_MAX_PCT: f32 = 100.0;
pub const TEMPERATURE_MIN_C: f32 = -45.0;
pub const TEMPERATURE_MAX_C: f32 = 130.0;

const TICKS_FULL_SCALE: f32 = 65_535.0;

/// Ambient climate used to compensate every gas sample in a cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompensationInput {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl CompensationInput {
    #[must_use]
    pub const fn new(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_c,
            humidity_pct,
        }
    }

    #[must_use]
    pub fn encode(&self) -> CompensationTicks {
        CompensationTicks {
            humidity: encode_humidity(self.humidity_pct),
            temperature: encode_temperature(self.temperature_c),
        }
    }
}

/// Climate assumed when the reference sensor cannot be read.
pub const DEFAULT_COMPENSATION: CompensationInput = CompensationInput::new(25.0, 50.0);

impl Default for CompensationInput {
    fn default() -> Self {
        DEFAULT_COMPENSATION
    }
}

impl fmt::Display for CompensationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}C {:.1}%RH", self.temperature_c, self.humidity_pct)
    }
}

/// Encoded compensation words, in the order the gas sensor expects them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CompensationTicks {
    pub humidity: u16,
    pub temperature: u16,
}

#[must_use]
pub fn encode_humidity(humidity_pct: f32) -> u16 {
    scale(humidity_pct, HUMIDITY_MIN_PCT, HUMIDITY_MAX_PCT)
}

#[must_use]
pub fn encode_temperature(temperature_c: f32) -> u16 {
    scale(temperature_c, TEMPERATURE_MIN_C, TEMPERATURE_MAX_C)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(value: f32, min: f32, max: f32) -> u16 {
    let value = if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    };
    ((value - min) * TICKS_FULL_SCALE / (max - min)) as u16
}
