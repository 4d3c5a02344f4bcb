#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use airnode_core::cycle::{Collaborators, CycleConfig, CycleOrchestrator, CycleReport, ReportSink};
use airnode_core::gas_index::{GasIndexAlgorithm, VocIndexAlgorithm};
use airnode_core::gate::GAS_SELF_TEST_SIGNATURE;
use airnode_core::sensors::{
    BatteryMonitor, Clock, Co2Sensor, GasIndexRawSensor, PowerRail, SelfTestError, Sensors,
    TemperatureHumiditySensor,
};
use airnode_core::state::PersistentKv;

pub const CLEAN_AIR_RAW: u16 = 30_000;

pub struct ScriptedReference {
    pub present: bool,
    pub reading: Option<(f32, f32)>,
    pub reads: u32,
}

impl ScriptedReference {
    pub fn healthy() -> Self {
        Self {
            present: true,
            reading: Some((21.5, 43.0)),
            reads: 0,
        }
    }
}

impl TemperatureHumiditySensor for ScriptedReference {
    fn init(&mut self) -> bool {
        self.present
    }

    fn read(&mut self) -> Option<(f32, f32)> {
        self.reads += 1;
        self.reading
    }
}

pub struct ScriptedGas {
    pub present: bool,
    pub self_test: Result<u16, SelfTestError>,
    /// Every n-th measurement fails.
    pub fail_every: Option<u32>,
    pub raw: u16,
    pub measurements: u32,
    pub ticks_seen: Vec<(u16, u16)>,
}

impl ScriptedGas {
    pub fn healthy() -> Self {
        Self {
            present: true,
            self_test: Ok(GAS_SELF_TEST_SIGNATURE),
            fail_every: None,
            raw: CLEAN_AIR_RAW,
            measurements: 0,
            ticks_seen: Vec::new(),
        }
    }
}

impl GasIndexRawSensor for ScriptedGas {
    fn init(&mut self) -> bool {
        self.present
    }

    fn self_test(&mut self) -> Result<u16, SelfTestError> {
        self.self_test
    }

    fn measure(&mut self, compensation_rh: u16, compensation_t: u16) -> Option<(u16, u16)> {
        self.measurements += 1;
        self.ticks_seen.push((compensation_rh, compensation_t));
        match self.fail_every {
            Some(n) if self.measurements % n == 0 => None,
            _ => Some((self.raw, 15_000)),
        }
    }
}

pub struct ScriptedCo2 {
    pub present: bool,
    pub start_ok: bool,
    /// Polls answered with "not ready" before a reading appears; `None` never answers.
    pub ready_after: Option<u32>,
    pub polls: u32,
    pub mode: Option<(bool, bool)>,
    pub started: bool,
}

impl ScriptedCo2 {
    pub fn healthy() -> Self {
        Self {
            present: true,
            start_ok: true,
            ready_after: Some(4),
            polls: 0,
            mode: None,
            started: false,
        }
    }
}

impl Co2Sensor for ScriptedCo2 {
    fn init(&mut self, low_power: bool, auto_calibration: bool) -> bool {
        self.mode = Some((low_power, auto_calibration));
        self.present
    }

    fn start_periodic(&mut self) -> bool {
        self.started = self.start_ok;
        self.start_ok
    }

    fn read(&mut self) -> Option<(f32, f32, f32)> {
        self.polls += 1;
        match self.ready_after {
            Some(after) if self.polls > after => Some((640.0, 22.0, 40.0)),
            _ => None,
        }
    }
}

/// Rail that logs every commanded level and mirrors the current one into `live`.
pub struct RecordingRail {
    pub levels: Vec<bool>,
    pub live: Rc<Cell<bool>>,
}

impl PowerRail for RecordingRail {
    fn set(&mut self, enabled: bool) {
        self.levels.push(enabled);
        self.live.set(enabled);
    }
}

/// Battery that remembers whether the rail was on when it was sampled.
pub struct ProbedBattery {
    pub millivolts: u32,
    pub rail: Rc<Cell<bool>>,
    pub reads_with_rail: Vec<bool>,
}

impl BatteryMonitor for ProbedBattery {
    fn read_millivolts(&mut self) -> u32 {
        self.reads_with_rail.push(self.rail.get());
        self.millivolts
    }
}

#[derive(Default)]
pub struct VirtualClock {
    pub now: u64,
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn sleep_ms(&mut self, duration_ms: u64) {
        self.now += duration_ms;
    }
}

#[derive(Default)]
pub struct MemoryKv {
    pub values: HashMap<String, f32>,
    pub commits: u32,
    pub fail_puts: bool,
}

impl PersistentKv for MemoryKv {
    type Error = &'static str;

    fn get_float(&mut self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }

    fn put_float(&mut self, key: &str, value: f32) -> Result<(), Self::Error> {
        if self.fail_puts {
            return Err("flash worn out");
        }
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.commits += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingSink {
    pub reports: Vec<CycleReport>,
}

impl ReportSink for CollectingSink {
    fn publish(&mut self, report: &CycleReport) {
        self.reports.push(*report);
    }
}

/// Algorithm stand-in that records what the cycle does to it.
#[derive(Default)]
pub struct CountingAlgorithm {
    pub seeded: Option<(f32, f32)>,
    pub processed: u32,
    pub resets: u32,
}

impl GasIndexAlgorithm for CountingAlgorithm {
    fn get_states(&self) -> (f32, f32) {
        self.seeded.unwrap_or((12_000.0, 50.0))
    }

    fn set_states(&mut self, s0: f32, s1: f32) {
        self.seeded = Some((s0, s1));
    }

    fn process(&mut self, _raw: u16) -> f32 {
        self.processed += 1;
        100.0
    }

    fn reset(&mut self) {
        self.seeded = None;
        self.processed = 0;
        self.resets += 1;
    }
}

pub type Harness<A> = CycleOrchestrator<
    ScriptedReference,
    ScriptedGas,
    ScriptedCo2,
    A,
    MemoryKv,
    RecordingRail,
    ProbedBattery,
    VirtualClock,
>;

pub struct Cluster {
    pub reference: ScriptedReference,
    pub gas: ScriptedGas,
    pub co2: ScriptedCo2,
}

impl Cluster {
    pub fn healthy() -> Self {
        Self {
            reference: ScriptedReference::healthy(),
            gas: ScriptedGas::healthy(),
            co2: ScriptedCo2::healthy(),
        }
    }
}

pub fn harness<A>(cluster: Cluster, algorithm: A, kv: MemoryKv) -> Harness<A>
where
    A: GasIndexAlgorithm,
{
    let live = Rc::new(Cell::new(false));
    CycleOrchestrator::new(
        CycleConfig::default(),
        Collaborators {
            sensors: Sensors::new(cluster.reference, cluster.gas, cluster.co2),
            algorithm,
            kv,
            rail: RecordingRail {
                levels: Vec::new(),
                live: Rc::clone(&live),
            },
            battery: ProbedBattery {
                millivolts: 3_850,
                rail: live,
                reads_with_rail: Vec::new(),
            },
            clock: VirtualClock::default(),
        },
    )
}

pub fn voc_harness(cluster: Cluster, kv: MemoryKv) -> Harness<VocIndexAlgorithm> {
    harness(cluster, VocIndexAlgorithm::new(), kv)
}
