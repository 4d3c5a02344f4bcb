//! Sensor rail switch and battery voltage measurement.
//!
//! The battery sits behind a 1:2 divider on an ADC input. VDDA is not
//! regulated tightly enough to serve as the ADC reference, so every battery
//! sample is paired with a VREFINT sample and scaled with the
//! factory-programmed calibration taken at 3.0 V.

/// VDDA at which `VREFINT_CAL` was measured.
pub const VREFINT_CAL_MILLIVOLTS: u32 = 3_000;

/// Full-scale reading of the 12-bit ADC.
pub const ADC_FULL_SCALE: u32 = 4_095;

/// Ratio of battery voltage to the voltage seen by the ADC pin.
pub const BATTERY_DIVIDER_RATIO: u32 = 2;

/// Converts paired battery/VREFINT samples into battery millivolts.
#[must_use]
pub fn battery_millivolts(battery_raw: u16, vrefint_raw: u16, vrefint_cal: u16) -> u32 {
    if vrefint_raw == 0 {
        return 0;
    }

    let numerator = u64::from(VREFINT_CAL_MILLIVOLTS)
        * u64::from(vrefint_cal)
        * u64::from(battery_raw)
        * u64::from(BATTERY_DIVIDER_RATIO);
    let denominator = u64::from(vrefint_raw) * u64::from(ADC_FULL_SCALE);
    u32::try_from(numerator / denominator).unwrap_or(u32::MAX)
}

#[cfg(target_os = "none")]
pub use target::{AdcBatteryMonitor, GpioPowerRail};

#[cfg(target_os = "none")]
mod target {
    use core::ptr;

    use airnode_core::sensors::{BatteryMonitor, PowerRail};
    use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime, VrefInt};
    use embassy_stm32::gpio::Output;
    use embassy_stm32::peripherals::ADC1;

    use super::battery_millivolts;

    /// Factory-programmed calibration constant sampled at 3.0 V.
    const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;

    fn read_vrefint_calibration() -> u16 {
        unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) }
    }

    /// Push-pull output driving the sensor rail's load switch.
    pub struct GpioPowerRail<'d> {
        pin: Output<'d>,
    }

    impl<'d> GpioPowerRail<'d> {
        pub fn new(pin: Output<'d>) -> Self {
            Self { pin }
        }
    }

    impl PowerRail for GpioPowerRail<'_> {
        fn set(&mut self, enabled: bool) {
            if enabled {
                self.pin.set_high();
            } else {
                self.pin.set_low();
            }
        }
    }

    /// Battery divider on an ADC channel, scaled against VREFINT per read.
    pub struct AdcBatteryMonitor<'d> {
        adc: Adc<'d, ADC1>,
        vrefint: VrefInt,
        battery: AnyAdcChannel<ADC1>,
        calibration: u16,
    }

    impl<'d> AdcBatteryMonitor<'d> {
        pub fn new(mut adc: Adc<'d, ADC1>, battery: AnyAdcChannel<ADC1>) -> Self {
            adc.set_sample_time(SampleTime::CYCLES160_5);
            let vrefint = adc.enable_vrefint();
            Self {
                adc,
                vrefint,
                battery,
                calibration: read_vrefint_calibration(),
            }
        }
    }

    impl BatteryMonitor for AdcBatteryMonitor<'_> {
        fn read_millivolts(&mut self) -> u32 {
            // First conversion after enabling VREFINT is unreliable.
            let _ = self.adc.blocking_read(&mut self.vrefint);
            let vrefint_raw = self.adc.blocking_read(&mut self.vrefint);
            let battery_raw = self.adc.blocking_read(&mut self.battery);
            battery_millivolts(battery_raw, vrefint_raw, self.calibration)
        }
    }
}
