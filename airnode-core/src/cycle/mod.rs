//! The wake-cycle sequence and its phase machine.
//!
//! One [`CycleOrchestrator::run`] is one power-on: bring the cluster up, gate
//! on sensor health, restore the gas-index state, sample, persist, wait for
//! the CO2 reading, power down, report. Every path, including a failed
//! bring-up, ends with the rail off and a sleep request of the configured
//! interval. The caller hands that duration to the platform's
//! [`DeepSleep`](crate::sensors::DeepSleep) primitive.

use core::{fmt, time::Duration};

use crate::duration_ms;
use crate::gas_index::GasIndexAlgorithm;
use crate::gate::{GateError, SensorGate};
use crate::poller::BoundedPoller;
use crate::power::PowerSequencer;
use crate::sampler::{CompensatedSampler, CompensationInput};
use crate::sensors::{
    BatteryMonitor, Clock, Co2Sensor, GasIndexRawSensor, PowerRail, Sensors,
    TemperatureHumiditySensor,
};
use crate::state::{LoadOutcome, PersistentKv, StateStore};
use crate::telemetry::{CycleEventKind, CycleTelemetry, TelemetryPayload};

mod config;
mod report;

pub use config::{CycleConfig, DEFAULT_CO2_WARMUP, DEFAULT_SLEEP_INTERVAL};
pub use report::{CycleReport, NoopReportSink, ReportSink};

/// Phases of a wake cycle, in execution order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CyclePhase {
    PoweringUp,
    Gating,
    StateLoaded,
    Sampling,
    StatePersisted,
    Polling,
    PoweredDown,
    Reported,
    Sleeping,
}

impl CyclePhase {
    pub const ALL: [CyclePhase; 9] = [
        CyclePhase::PoweringUp,
        CyclePhase::Gating,
        CyclePhase::StateLoaded,
        CyclePhase::Sampling,
        CyclePhase::StatePersisted,
        CyclePhase::Polling,
        CyclePhase::PoweredDown,
        CyclePhase::Reported,
        CyclePhase::Sleeping,
    ];

    #[must_use]
    pub const fn index(self) -> u16 {
        match self {
            CyclePhase::PoweringUp => 0,
            CyclePhase::Gating => 1,
            CyclePhase::StateLoaded => 2,
            CyclePhase::Sampling => 3,
            CyclePhase::StatePersisted => 4,
            CyclePhase::Polling => 5,
            CyclePhase::PoweredDown => 6,
            CyclePhase::Reported => 7,
            CyclePhase::Sleeping => 8,
        }
    }

    #[must_use]
    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Returns `true` when `next` directly follows `self`.
    ///
    /// `Gating → PoweredDown` and `PoweredDown → Sleeping` form the fatal edge
    /// taken when bring-up fails.
    #[must_use]
    pub const fn can_advance_to(self, next: CyclePhase) -> bool {
        matches!(
            (self, next),
            (CyclePhase::PoweringUp, CyclePhase::Gating)
                | (CyclePhase::Gating, CyclePhase::StateLoaded | CyclePhase::PoweredDown)
                | (CyclePhase::StateLoaded, CyclePhase::Sampling)
                | (CyclePhase::Sampling, CyclePhase::StatePersisted)
                | (CyclePhase::StatePersisted, CyclePhase::Polling)
                | (CyclePhase::Polling, CyclePhase::PoweredDown)
                | (CyclePhase::PoweredDown, CyclePhase::Reported | CyclePhase::Sleeping)
                | (CyclePhase::Reported, CyclePhase::Sleeping)
        )
    }

    /// Validates a transition and returns the phase entered.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when `next` is not reachable from `self`.
    pub const fn advance(self, next: CyclePhase) -> Result<CyclePhase, TransitionError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, CyclePhase::Sleeping)
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CyclePhase::PoweringUp => "powering-up",
            CyclePhase::Gating => "gating",
            CyclePhase::StateLoaded => "state-loaded",
            CyclePhase::Sampling => "sampling",
            CyclePhase::StatePersisted => "state-persisted",
            CyclePhase::Polling => "polling",
            CyclePhase::PoweredDown => "powered-down",
            CyclePhase::Reported => "reported",
            CyclePhase::Sleeping => "sleeping",
        };
        f.write_str(label)
    }
}

/// Illegal phase transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitionError {
    pub from: CyclePhase,
    pub to: CyclePhase,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition {} -> {}", self.from, self.to)
    }
}

/// How a cycle ended. Both variants carry the requested sleep.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Completed { report: CycleReport, sleep: Duration },
    Aborted { error: GateError, sleep: Duration },
}

impl CycleOutcome {
    #[must_use]
    pub const fn sleep_duration(&self) -> Duration {
        match self {
            CycleOutcome::Completed { sleep, .. } | CycleOutcome::Aborted { sleep, .. } => *sleep,
        }
    }

    #[must_use]
    pub const fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed { report, .. } => Some(report),
            CycleOutcome::Aborted { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. })
    }
}

/// Hardware handles owned by the orchestrator for the duration of a cycle.
pub struct Collaborators<T, G, C, A, K, P, B, Clk> {
    pub sensors: Sensors<T, G, C>,
    pub algorithm: A,
    pub kv: K,
    pub rail: P,
    pub battery: B,
    pub clock: Clk,
}

/// Drives one wake cycle over the collaborators it owns.
///
/// The orchestrator can be run repeatedly; each [`run`](Self::run) starts
/// from [`CyclePhase::PoweringUp`] with an empty telemetry ring and a reset
/// algorithm.
pub struct CycleOrchestrator<T, G, C, A, K, P, B, Clk> {
    config: CycleConfig,
    sensors: Sensors<T, G, C>,
    algorithm: A,
    store: StateStore<K>,
    power: PowerSequencer<P>,
    battery: B,
    clock: Clk,
    phase: CyclePhase,
    telemetry: CycleTelemetry,
}

impl<T, G, C, A, K, P, B, Clk> CycleOrchestrator<T, G, C, A, K, P, B, Clk>
where
    T: TemperatureHumiditySensor,
    G: GasIndexRawSensor,
    C: Co2Sensor,
    A: GasIndexAlgorithm,
    K: PersistentKv,
    P: PowerRail,
    B: BatteryMonitor,
    Clk: Clock,
{
    #[must_use]
    pub fn new(config: CycleConfig, parts: Collaborators<T, G, C, A, K, P, B, Clk>) -> Self {
        Self {
            config,
            sensors: parts.sensors,
            algorithm: parts.algorithm,
            store: StateStore::new(parts.kv),
            power: PowerSequencer::new(parts.rail),
            battery: parts.battery,
            clock: parts.clock,
            phase: CyclePhase::PoweringUp,
            telemetry: CycleTelemetry::new(),
        }
    }

    /// Runs one complete wake cycle and returns the sleep request.
    ///
    /// Never panics on collaborator failures: bring-up faults abort the cycle,
    /// everything else degrades the report.
    pub fn run<S>(&mut self, sink: &mut S) -> CycleOutcome
    where
        S: ReportSink,
    {
        self.telemetry.clear();
        self.phase = CyclePhase::PoweringUp;
        self.telemetry
            .record_phase(CyclePhase::PoweringUp, self.clock.now_ms());
        self.power.enable();

        self.enter(CyclePhase::Gating);
        let gate = SensorGate::new(self.config.co2_mode);
        if let Err(error) = gate.init_and_selftest(
            &mut self.sensors.reference,
            &mut self.sensors.gas,
            &mut self.sensors.co2,
        ) {
            return self.abort(error);
        }
        self.clock.sleep_ms(duration_ms(self.config.co2_warmup));

        self.enter(CyclePhase::StateLoaded);
        let (state, state_load) = self.store.load();
        self.record(match state_load {
            LoadOutcome::Restored => CycleEventKind::StateRestored,
            LoadOutcome::Defaulted(reason) => CycleEventKind::StateDefaulted(reason),
        });
        let (compensation, compensation_defaulted) = self.read_compensation();

        self.enter(CyclePhase::Sampling);
        let sampler = CompensatedSampler::new(self.config.sample_count, self.config.sample_period);
        let run = sampler.run(
            &mut self.sensors.gas,
            &mut self.algorithm,
            &mut self.clock,
            compensation,
            state,
        );
        if run.stats.dropped() > 0 {
            self.record_with(
                CycleEventKind::SamplesDropped,
                TelemetryPayload::Samples(run.stats),
            );
        }

        self.enter(CyclePhase::StatePersisted);
        if self.store.save(run.state).is_err() {
            self.record(CycleEventKind::StateSaveFailed);
        }

        self.enter(CyclePhase::Polling);
        let secondary =
            BoundedPoller::new(self.config.poll).wait_for_reading(&mut self.sensors.co2, &mut self.clock);
        if secondary.is_none() {
            self.record(CycleEventKind::PollTimedOut);
        }

        let battery_mv = self.battery.read_millivolts();
        self.enter(CyclePhase::PoweredDown);
        self.power.disable();

        let report = CycleReport {
            compensation,
            compensation_defaulted,
            gas_index: run.index,
            samples: run.stats,
            secondary,
            battery_mv,
            state_load,
        };
        self.enter(CyclePhase::Reported);
        sink.publish(&report);

        self.enter(CyclePhase::Sleeping);
        CycleOutcome::Completed {
            report,
            sleep: self.config.sleep_interval,
        }
    }

    fn abort(&mut self, error: GateError) -> CycleOutcome {
        self.record_with(CycleEventKind::GateFailed, TelemetryPayload::Gate(error));
        self.enter(CyclePhase::PoweredDown);
        self.power.disable();
        self.enter(CyclePhase::Sleeping);
        CycleOutcome::Aborted {
            error,
            sleep: self.config.sleep_interval,
        }
    }

    fn read_compensation(&mut self) -> (CompensationInput, bool) {
        match self.sensors.reference.read() {
            Some((temperature_c, humidity_pct))
                if temperature_c.is_finite() && humidity_pct.is_finite() =>
            {
                (CompensationInput::new(temperature_c, humidity_pct), false)
            }
            _ => {
                self.record(CycleEventKind::CompensationDefaulted);
                (self.config.fallback_compensation, true)
            }
        }
    }

    fn enter(&mut self, next: CyclePhase) {
        let advanced = self.phase.advance(next);
        debug_assert!(advanced.is_ok(), "{advanced:?}");
        self.phase = next;
        self.telemetry.record_phase(next, self.clock.now_ms());
    }

    fn record(&mut self, event: CycleEventKind) {
        self.record_with(event, TelemetryPayload::none());
    }

    fn record_with(&mut self, event: CycleEventKind, details: TelemetryPayload) {
        self.telemetry.record(event, details, self.clock.now_ms());
    }
}

impl<T, G, C, A, K, P, B, Clk> CycleOrchestrator<T, G, C, A, K, P, B, Clk> {
    #[must_use]
    pub const fn phase(&self) -> CyclePhase {
        self.phase
    }

    #[must_use]
    pub const fn config(&self) -> &CycleConfig {
        &self.config
    }

    #[must_use]
    pub fn telemetry(&self) -> &CycleTelemetry {
        &self.telemetry
    }

    #[must_use]
    pub fn sensors(&self) -> &Sensors<T, G, C> {
        &self.sensors
    }

    #[must_use]
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    #[must_use]
    pub fn power(&self) -> &PowerSequencer<P> {
        &self.power
    }

    #[must_use]
    pub fn clock(&self) -> &Clk {
        &self.clock
    }

    /// Hands the collaborators back, e.g. to carry the store into the next cycle.
    #[must_use]
    pub fn into_parts(self) -> Collaborators<T, G, C, A, K, P, B, Clk> {
        Collaborators {
            sensors: self.sensors,
            algorithm: self.algorithm,
            kv: self.store.into_inner(),
            rail: self.power.into_inner(),
            battery: self.battery,
            clock: self.clock,
        }
    }
}
