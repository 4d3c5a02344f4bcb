use std::cell::Cell;
use std::rc::Rc;

use airnode_core::cycle::{
    Collaborators, CycleConfig, CycleOrchestrator, CycleOutcome, CycleReport, ReportSink,
};
use airnode_core::duration_ms;
use airnode_core::gas_index::VocIndexAlgorithm;
use airnode_core::gate::GAS_SELF_TEST_SIGNATURE;
use airnode_core::sensors::{
    BatteryMonitor, Clock, Co2Sensor, GasIndexRawSensor, PowerRail, SelfTestError, Sensors,
    TemperatureHumiditySensor,
};
use airnode_core::state::{RECORD_LEN, RecordKv, RecordStorage};
use airnode_core::telemetry::CycleRecord;

pub const DEFAULT_CYCLES: u32 = 3;

/// Raw VOC signal in clean air.
const CLEAN_AIR_RAW: u16 = 30_000;
/// Raw signal drop per simulated cycle, cycling through clean and polluted air.
const POLLUTION_PROFILE: [u16; 4] = [0, 400, 1_800, 150];
/// SCD41 low-power periodic mode publishes every 30 s.
const CO2_MEASUREMENT_INTERVAL_MS: u64 = 30_000;

/// Sensor that fails bring-up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultTarget {
    Reference,
    Gas,
    SelfTest,
    Co2,
}

impl FaultTarget {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("reference") {
            Ok(Self::Reference)
        } else if tag.eq_ignore_ascii_case("gas") {
            Ok(Self::Gas)
        } else if tag.eq_ignore_ascii_case("selftest") {
            Ok(Self::SelfTest)
        } else if tag.eq_ignore_ascii_case("co2") {
            Ok(Self::Co2)
        } else {
            Err(format!("Unknown fault target `{tag}`"))
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimulationOptions {
    pub cycles: u32,
    pub fail: Option<FaultTarget>,
    pub reference_read_fails: bool,
    pub co2_never_ready: bool,
    /// Every n-th raw gas measurement fails.
    pub drop_every: Option<u32>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            cycles: DEFAULT_CYCLES,
            fail: None,
            reference_read_fails: false,
            co2_never_ready: false,
            drop_every: None,
        }
    }
}

impl SimulationOptions {
    pub fn parse<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg, None),
            };
            let mut value = |name: &str| {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| format!("Expected value after {name}"))
            };

            match flag.as_str() {
                "--cycles" => options.cycles = parse_count(&value("--cycles")?)?,
                "--fail" => options.fail = Some(FaultTarget::from_tag(&value("--fail")?)?),
                "--drop-every" => options.drop_every = Some(parse_count(&value("--drop-every")?)?),
                "--reference-read-fails" => options.reference_read_fails = true,
                "--co2-never-ready" => options.co2_never_ready = true,
                other => return Err(format!("Unknown option `{other}`")),
            }
        }
        Ok(options)
    }
}

fn parse_count(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("Expected a positive number, got `{value}`")),
        Ok(count) => Ok(count),
    }
}

/// Virtual milliseconds shared by the clock and the simulated sensors.
#[derive(Clone, Default)]
pub struct SimTime(Rc<Cell<u64>>);

impl SimTime {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get().saturating_add(ms));
    }
}

pub struct SimClock {
    time: SimTime,
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.time.now()
    }

    fn sleep_ms(&mut self, duration_ms: u64) {
        self.time.advance(duration_ms);
    }
}

pub struct SimReference {
    present: bool,
    read_fails: bool,
    temperature_c: f32,
    humidity_pct: f32,
}

impl TemperatureHumiditySensor for SimReference {
    fn init(&mut self) -> bool {
        self.present
    }

    fn read(&mut self) -> Option<(f32, f32)> {
        (!self.read_fails).then_some((self.temperature_c, self.humidity_pct))
    }
}

pub struct SimGas {
    present: bool,
    signature: u16,
    raw: u16,
    drop_every: Option<u32>,
    measurements: u32,
}

impl GasIndexRawSensor for SimGas {
    fn init(&mut self) -> bool {
        self.present
    }

    fn self_test(&mut self) -> Result<u16, SelfTestError> {
        Ok(self.signature)
    }

    fn measure(&mut self, _: u16, _: u16) -> Option<(u16, u16)> {
        self.measurements += 1;
        match self.drop_every {
            Some(n) if self.measurements % n == 0 => None,
            _ => Some((self.raw, 16_000)),
        }
    }
}

pub struct SimCo2 {
    present: bool,
    never_ready: bool,
    time: SimTime,
    started_at: Option<u64>,
    co2_ppm: f32,
}

impl Co2Sensor for SimCo2 {
    fn init(&mut self, _low_power: bool, _auto_calibration: bool) -> bool {
        self.present
    }

    fn start_periodic(&mut self) -> bool {
        self.started_at = Some(self.time.now());
        true
    }

    fn read(&mut self) -> Option<(f32, f32, f32)> {
        let started_at = self.started_at?;
        let ready = self.time.now().saturating_sub(started_at) >= CO2_MEASUREMENT_INTERVAL_MS;
        (ready && !self.never_ready).then_some((self.co2_ppm, 22.4, 41.5))
    }
}

#[derive(Default)]
pub struct SimRail {
    pub switches: u32,
    pub enabled: bool,
}

impl PowerRail for SimRail {
    fn set(&mut self, enabled: bool) {
        self.switches += 1;
        self.enabled = enabled;
    }
}

pub struct SimBattery {
    millivolts: u32,
}

impl BatteryMonitor for SimBattery {
    fn read_millivolts(&mut self) -> u32 {
        self.millivolts
    }
}

/// RAM stand-in for the flash page, kept across simulated power cycles.
#[derive(Clone)]
pub struct RamFlash {
    bytes: [u8; RECORD_LEN],
    pub writes: u32,
}

impl Default for RamFlash {
    fn default() -> Self {
        Self {
            bytes: [0xFF; RECORD_LEN],
            writes: 0,
        }
    }
}

impl RecordStorage for RamFlash {
    type Error = std::convert::Infallible;

    fn read(&mut self, buf: &mut [u8; RECORD_LEN]) -> Result<(), Self::Error> {
        *buf = self.bytes;
        Ok(())
    }

    fn write(&mut self, buf: &[u8; RECORD_LEN]) -> Result<(), Self::Error> {
        self.bytes = *buf;
        self.writes += 1;
        Ok(())
    }
}

#[derive(Default)]
struct ReportLog {
    reports: Vec<CycleReport>,
}

impl ReportSink for ReportLog {
    fn publish(&mut self, report: &CycleReport) {
        self.reports.push(*report);
    }
}

type SimNode = CycleOrchestrator<
    SimReference,
    SimGas,
    SimCo2,
    VocIndexAlgorithm,
    RecordKv<RamFlash>,
    SimRail,
    SimBattery,
    SimClock,
>;

/// What one simulated wake produced.
pub struct CycleSummary {
    pub number: u32,
    pub started_at_ms: u64,
    pub outcome: CycleOutcome,
    pub published: usize,
    pub events: Vec<CycleRecord>,
    pub rail_left_on: bool,
}

/// Runs simulated wake cycles back to back on a virtual clock.
pub struct Session {
    options: SimulationOptions,
    config: CycleConfig,
    time: SimTime,
    flash: RamFlash,
    completed: u32,
}

impl Session {
    pub fn new(options: SimulationOptions) -> Self {
        Self {
            options,
            config: CycleConfig::default(),
            time: SimTime::default(),
            flash: RamFlash::default(),
            completed: 0,
        }
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn flash(&self) -> &RamFlash {
        &self.flash
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.options.cycles
    }

    /// Simulates one power-on: fresh sensors and algorithm, persisted flash.
    pub fn run_cycle(&mut self) -> CycleSummary {
        let number = self.completed + 1;
        let started_at_ms = self.time.now();

        let mut node = self.build_node(number);
        let mut log = ReportLog::default();
        let outcome = node.run(&mut log);
        let events = node.telemetry().oldest_first().copied().collect();

        let parts = node.into_parts();
        self.flash = parts.kv.into_inner();
        self.time.advance(duration_ms(outcome.sleep_duration()));
        self.completed = number;

        CycleSummary {
            number,
            started_at_ms,
            outcome,
            published: log.reports.len(),
            events,
            rail_left_on: parts.rail.enabled,
        }
    }

    fn build_node(&self, number: u32) -> SimNode {
        let fail = self.options.fail;
        let slot = usize::try_from(number - 1).unwrap_or(0) % POLLUTION_PROFILE.len();
        let profile = POLLUTION_PROFILE[slot];

        let sensors = Sensors::new(
            SimReference {
                present: fail != Some(FaultTarget::Reference),
                read_fails: self.options.reference_read_fails,
                temperature_c: 21.0 + 0.5 * f32::from(u8::try_from(number % 3).unwrap_or(0)),
                humidity_pct: 44.0,
            },
            SimGas {
                present: fail != Some(FaultTarget::Gas),
                signature: if fail == Some(FaultTarget::SelfTest) {
                    0x4B00
                } else {
                    GAS_SELF_TEST_SIGNATURE
                },
                raw: CLEAN_AIR_RAW - profile,
                drop_every: self.options.drop_every,
                measurements: 0,
            },
            SimCo2 {
                present: fail != Some(FaultTarget::Co2),
                never_ready: self.options.co2_never_ready,
                time: self.time.clone(),
                started_at: None,
                co2_ppm: 480.0 + f32::from(profile) / 2.0,
            },
        );

        CycleOrchestrator::new(
            self.config,
            Collaborators {
                sensors,
                algorithm: VocIndexAlgorithm::new(),
                kv: RecordKv::new(self.flash.clone()),
                rail: SimRail::default(),
                battery: SimBattery {
                    millivolts: 3_950u32.saturating_sub(number.saturating_mul(7)),
                },
                clock: SimClock {
                    time: self.time.clone(),
                },
            },
        )
    }
}
