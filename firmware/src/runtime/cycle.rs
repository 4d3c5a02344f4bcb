use airnode_core::cycle::CycleOrchestrator;
use airnode_core::duration_us;
use airnode_core::gas_index::VocIndexAlgorithm;
use airnode_core::sensors::DeepSleep;
use airnode_core::state::RecordKv;

use crate::hw::bus::SharedI2c;
use crate::hw::clock::{EmbassyClock, StandbyUntilAlarm};
use crate::hw::flash::FlashRecordStorage;
use crate::hw::power::{AdcBatteryMonitor, GpioPowerRail};
use crate::hw::sensirion::{Scd41, Sgp41, Sht4x};
use crate::telemetry::{LogReportSink, log_cycle_telemetry, log_outcome};

pub type Node = CycleOrchestrator<
    Sht4x<SharedI2c>,
    Sgp41<SharedI2c>,
    Scd41<SharedI2c>,
    VocIndexAlgorithm,
    RecordKv<FlashRecordStorage<'static>>,
    GpioPowerRail<'static>,
    AdcBatteryMonitor<'static>,
    EmbassyClock,
>;

/// Runs the single cycle of this power-on and sleeps. Never returns.
pub fn run(mut node: Node, mut sleep: StandbyUntilAlarm) -> ! {
    defmt::info!("airnode: wake");

    let mut sink = LogReportSink::new();
    let outcome = node.run(&mut sink);

    log_cycle_telemetry(node.telemetry());
    log_outcome(&outcome);

    sleep.enter(duration_us(outcome.sleep_duration()))
}
