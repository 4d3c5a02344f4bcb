use core::cell::RefCell;

use airnode_core::cycle::{Collaborators, CycleConfig, CycleOrchestrator};
use airnode_core::gas_index::VocIndexAlgorithm;
use airnode_core::sensors::Sensors;
use airnode_core::state::RecordKv;
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::Mutex;
use static_cell::StaticCell;

use crate::hw::I2C_FREQUENCY_HZ;
use crate::hw::bus::{SharedI2c, SharedI2cBus};
use crate::hw::clock::{EmbassyClock, StandbyUntilAlarm};
use crate::hw::flash::FlashRecordStorage;
use crate::hw::power::{AdcBatteryMonitor, GpioPowerRail};
use crate::hw::sensirion::{Scd41, Sgp41, Sht4x};

mod cycle;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

static I2C_BUS: StaticCell<SharedI2cBus> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(_spawner: Spawner) {
    let hal::Peripherals {
        PA0,
        PA8,
        PB6,
        PB7,
        I2C1,
        ADC1,
        FLASH,
        ..
    } = hal::init(hal::Config::default());

    let rail = GpioPowerRail::new(Output::new(PA8, Level::Low, Speed::Low));

    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz(I2C_FREQUENCY_HZ);
    let bus: &'static SharedI2cBus = I2C_BUS.init(Mutex::new(RefCell::new(I2c::new_blocking(
        I2C1, PB6, PB7, i2c_config,
    ))));

    let sensors = Sensors::new(
        Sht4x::new(SharedI2c::new(bus)),
        Sgp41::new(SharedI2c::new(bus)),
        Scd41::new(SharedI2c::new(bus)),
    );
    let battery = AdcBatteryMonitor::new(Adc::new(ADC1), PA0.degrade_adc());
    let kv = RecordKv::new(FlashRecordStorage::new(Flash::new_blocking(FLASH)));

    let node = CycleOrchestrator::new(
        CycleConfig::default(),
        Collaborators {
            sensors,
            algorithm: VocIndexAlgorithm::new(),
            kv,
            rail,
            battery,
            clock: EmbassyClock,
        },
    );

    cycle::run(node, StandbyUntilAlarm::new())
}
