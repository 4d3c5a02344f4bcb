//! Drivers for the SHT4x, SGP41 and SCD41 on the sensor rail.
//!
//! Each driver implements the matching `airnode-core` sensor trait. Bus or CRC
//! failures surface as `false`/`None` to the cycle and are logged here, so the
//! cycle decides between abort and degrade without knowing about I2C.

use airnode_core::sensors::frame::{WORD_LEN, command_frame, decode_words};
use airnode_core::sensors::{
    Co2Sensor, GasIndexRawSensor, SelfTestError, TemperatureHumiditySensor,
};
use heapless::Vec;

use super::bus::{SensirionBus, TransactionError};
use crate::telemetry::warn_driver;

pub const SHT4X_ADDRESS: u8 = 0x44;
pub const SGP41_ADDRESS: u8 = 0x59;
pub const SCD41_ADDRESS: u8 = 0x62;

const MAX_COMMAND_LEN: usize = 2 + 2 * WORD_LEN;
const MAX_RESPONSE_WORDS: usize = 3;

const SHT4X_SOFT_RESET: u8 = 0x94;
const SHT4X_READ_SERIAL: u8 = 0x89;
const SHT4X_MEASURE_HIGH_PRECISION: u8 = 0xFD;

const SGP41_GET_SERIAL: u16 = 0x3682;
const SGP41_SELF_TEST: u16 = 0x280E;
const SGP41_MEASURE_RAW: u16 = 0x2619;

const SCD41_STOP_PERIODIC: u16 = 0x3F86;
const SCD41_GET_SERIAL: u16 = 0x3682;
const SCD41_SET_ASC_ENABLED: u16 = 0x2416;
const SCD41_START_PERIODIC: u16 = 0x21B1;
const SCD41_START_LOW_POWER_PERIODIC: u16 = 0x21AC;
const SCD41_DATA_READY: u16 = 0xE4B8;
const SCD41_READ_MEASUREMENT: u16 = 0xEC05;

/// Self-test code reported when the SGP41 could not be reached at all.
pub const SELF_TEST_TRANSPORT_FAILURE: u16 = 0xFFFF;

type Result<T, E> = core::result::Result<T, TransactionError<E>>;

/// One Sensirion device at a fixed address.
struct Device<B> {
    bus: B,
    address: u8,
}

impl<B> Device<B>
where
    B: SensirionBus,
{
    const fn new(bus: B, address: u8) -> Self {
        Self { bus, address }
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), B::Error> {
        self.bus
            .write(self.address, bytes)
            .map_err(TransactionError::Bus)
    }

    fn command(&mut self, command: u16, args: &[u16]) -> Result<(), B::Error> {
        let frame: Vec<u8, MAX_COMMAND_LEN> = command_frame(command, args)?;
        self.write_raw(&frame)
    }

    fn read_words<const N: usize>(&mut self) -> Result<[u16; N], B::Error> {
        let mut buffer = [0u8; MAX_RESPONSE_WORDS * WORD_LEN];
        let response = &mut buffer[..N * WORD_LEN];
        self.bus
            .read(self.address, response)
            .map_err(TransactionError::Bus)?;
        Ok(decode_words(response)?)
    }

    fn query<const N: usize>(
        &mut self,
        command: u16,
        args: &[u16],
        wait_ms: u32,
    ) -> Result<[u16; N], B::Error> {
        self.command(command, args)?;
        self.bus.delay_ms(wait_ms);
        self.read_words()
    }
}

fn ticks_to_unit(raw: u16) -> f32 {
    f32::from(raw) / 65_535.0
}

/// SHT4x raw temperature word to °C.
#[must_use]
pub fn sht4x_temperature(raw: u16) -> f32 {
    -45.0 + 175.0 * ticks_to_unit(raw)
}

/// SHT4x raw humidity word to %RH, clamped to the physical range.
#[must_use]
pub fn sht4x_humidity(raw: u16) -> f32 {
    (-6.0 + 125.0 * ticks_to_unit(raw)).clamp(0.0, 100.0)
}

/// SCD41 raw temperature word to °C.
#[must_use]
pub fn scd41_temperature(raw: u16) -> f32 {
    -45.0 + 175.0 * ticks_to_unit(raw)
}

/// SCD41 raw humidity word to %RH.
#[must_use]
pub fn scd41_humidity(raw: u16) -> f32 {
    100.0 * ticks_to_unit(raw)
}

/// SHT4x temperature/humidity reference at 0x44, high-repeatability mode.
pub struct Sht4x<B> {
    device: Device<B>,
}

impl<B> Sht4x<B>
where
    B: SensirionBus,
{
    pub const fn new(bus: B) -> Self {
        Self {
            device: Device::new(bus, SHT4X_ADDRESS),
        }
    }

    fn bring_up(&mut self) -> Result<[u16; 2], B::Error> {
        self.device.write_raw(&[SHT4X_SOFT_RESET])?;
        self.device.bus.delay_ms(1);
        self.device.write_raw(&[SHT4X_READ_SERIAL])?;
        self.device.bus.delay_ms(1);
        self.device.read_words()
    }

    fn measure(&mut self) -> Result<(f32, f32), B::Error> {
        self.device.write_raw(&[SHT4X_MEASURE_HIGH_PRECISION])?;
        self.device.bus.delay_ms(10);
        let [temperature, humidity] = self.device.read_words()?;
        Ok((sht4x_temperature(temperature), sht4x_humidity(humidity)))
    }
}

impl<B> TemperatureHumiditySensor for Sht4x<B>
where
    B: SensirionBus,
{
    fn init(&mut self) -> bool {
        self.bring_up()
            .map_err(|error| warn_driver("sht4x init", &error))
            .is_ok()
    }

    fn read(&mut self) -> Option<(f32, f32)> {
        self.measure()
            .map_err(|error| warn_driver("sht4x read", &error))
            .ok()
    }
}

/// SGP41 VOC/NOx sensor at 0x59. Only the VOC raw signal feeds the index.
pub struct Sgp41<B> {
    device: Device<B>,
}

impl<B> Sgp41<B>
where
    B: SensirionBus,
{
    pub const fn new(bus: B) -> Self {
        Self {
            device: Device::new(bus, SGP41_ADDRESS),
        }
    }
}

impl<B> GasIndexRawSensor for Sgp41<B>
where
    B: SensirionBus,
{
    fn init(&mut self) -> bool {
        self.device
            .query::<3>(SGP41_GET_SERIAL, &[], 1)
            .map_err(|error| warn_driver("sgp41 init", &error))
            .is_ok()
    }

    fn self_test(&mut self) -> core::result::Result<u16, SelfTestError> {
        match self.device.query::<1>(SGP41_SELF_TEST, &[], 320) {
            Ok([signature]) => Ok(signature),
            Err(error) => {
                warn_driver("sgp41 self-test", &error);
                Err(SelfTestError::new(SELF_TEST_TRANSPORT_FAILURE))
            }
        }
    }

    fn measure(&mut self, compensation_rh: u16, compensation_t: u16) -> Option<(u16, u16)> {
        self.device
            .query::<2>(SGP41_MEASURE_RAW, &[compensation_rh, compensation_t], 50)
            .map(|[voc, nox]| (voc, nox))
            .map_err(|error| warn_driver("sgp41 measure", &error))
            .ok()
    }
}

/// SCD41 photoacoustic CO2 sensor at 0x62.
pub struct Scd41<B> {
    device: Device<B>,
    low_power: bool,
}

impl<B> Scd41<B>
where
    B: SensirionBus,
{
    pub const fn new(bus: B) -> Self {
        Self {
            device: Device::new(bus, SCD41_ADDRESS),
            low_power: true,
        }
    }

    fn bring_up(&mut self, auto_calibration: bool) -> Result<(), B::Error> {
        // A sensor that survived an MCU reset may still be measuring.
        self.device.command(SCD41_STOP_PERIODIC, &[])?;
        self.device.bus.delay_ms(500);
        self.device.query::<3>(SCD41_GET_SERIAL, &[], 1)?;
        self.device
            .command(SCD41_SET_ASC_ENABLED, &[u16::from(auto_calibration)])?;
        self.device.bus.delay_ms(1);
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<(f32, f32, f32)>, B::Error> {
        let [status] = self.device.query::<1>(SCD41_DATA_READY, &[], 1)?;
        if status & 0x07FF == 0 {
            return Ok(None);
        }
        let [co2, temperature, humidity] = self.device.query(SCD41_READ_MEASUREMENT, &[], 1)?;
        Ok(Some((
            f32::from(co2),
            scd41_temperature(temperature),
            scd41_humidity(humidity),
        )))
    }
}

impl<B> Co2Sensor for Scd41<B>
where
    B: SensirionBus,
{
    fn init(&mut self, low_power: bool, auto_calibration: bool) -> bool {
        self.low_power = low_power;
        self.bring_up(auto_calibration)
            .map_err(|error| warn_driver("scd41 init", &error))
            .is_ok()
    }

    fn start_periodic(&mut self) -> bool {
        let command = if self.low_power {
            SCD41_START_LOW_POWER_PERIODIC
        } else {
            SCD41_START_PERIODIC
        };
        self.device
            .command(command, &[])
            .map_err(|error| warn_driver("scd41 start", &error))
            .is_ok()
    }

    fn read(&mut self) -> Option<(f32, f32, f32)> {
        self.poll()
            .map_err(|error| warn_driver("scd41 read", &error))
            .ok()
            .flatten()
    }
}
