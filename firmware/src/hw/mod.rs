//! Board bindings for the airnode sensor cluster.
//!
//! Pin map (STM32G0B1KE):
//!
//! | signal | pin | notes |
//! |---|---|---|
//! | I2C1 SCL | PB6 | SHT4x, SGP41, SCD41 |
//! | I2C1 SDA | PB7 | |
//! | sensor rail enable | PA8 | push-pull, high = on |
//! | battery sense | PA0 | ADC1 IN0 behind a 1:2 divider |

pub mod bus;
pub mod clock;
pub mod flash;
pub mod power;
pub mod sensirion;

/// I2C bus clock for the sensor cluster.
pub const I2C_FREQUENCY_HZ: u32 = 100_000;
