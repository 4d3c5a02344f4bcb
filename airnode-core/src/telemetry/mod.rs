//! Cycle event catalog and the in-memory ring that records one wake cycle.
//!
//! Every phase transition and every degraded outcome is captured with a
//! millisecond timestamp from the cycle clock. Event kinds serialize to
//! compact numeric codes so targets can forward them over whatever diagnostic
//! channel they have without pulling in a formatter.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::cycle::CyclePhase;
use crate::gate::GateError;
use crate::sampler::SampleStats;
use crate::state::DefaultReason;

/// Timestamp units for telemetry records (milliseconds on the cycle clock).
pub type TimestampMillis = u64;

/// Events recorded during a wake cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CycleEventKind {
    PhaseEntered(CyclePhase),
    StateRestored,
    StateDefaulted(DefaultReason),
    CompensationDefaulted,
    SamplesDropped,
    PollTimedOut,
    StateSaveFailed,
    GateFailed,
    Custom(u16),
}

impl fmt::Display for CycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleEventKind::PhaseEntered(phase) => write!(f, "phase {phase}"),
            CycleEventKind::StateRestored => f.write_str("state-restored"),
            CycleEventKind::StateDefaulted(reason) => write!(f, "state-defaulted {reason}"),
            CycleEventKind::CompensationDefaulted => f.write_str("compensation-defaulted"),
            CycleEventKind::SamplesDropped => f.write_str("samples-dropped"),
            CycleEventKind::PollTimedOut => f.write_str("poll-timed-out"),
            CycleEventKind::StateSaveFailed => f.write_str("state-save-failed"),
            CycleEventKind::GateFailed => f.write_str("gate-failed"),
            CycleEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl CycleEventKind {
    const PHASE_BASE: u16 = 0x0000;
    const STATE_RESTORED_CODE: u16 = 0x0010;
    const STATE_DEFAULTED_BASE: u16 = 0x0011;
    const COMPENSATION_DEFAULTED_CODE: u16 = 0x0018;
    const SAMPLES_DROPPED_CODE: u16 = 0x0019;
    const POLL_TIMED_OUT_CODE: u16 = 0x001A;
    const STATE_SAVE_FAILED_CODE: u16 = 0x001B;
    const GATE_FAILED_CODE: u16 = 0x001C;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            CycleEventKind::PhaseEntered(phase) => Self::PHASE_BASE + phase.index(),
            CycleEventKind::StateRestored => Self::STATE_RESTORED_CODE,
            CycleEventKind::StateDefaulted(reason) => {
                Self::STATE_DEFAULTED_BASE + default_reason_index(reason)
            }
            CycleEventKind::CompensationDefaulted => Self::COMPENSATION_DEFAULTED_CODE,
            CycleEventKind::SamplesDropped => Self::SAMPLES_DROPPED_CODE,
            CycleEventKind::PollTimedOut => Self::POLL_TIMED_OUT_CODE,
            CycleEventKind::StateSaveFailed => Self::STATE_SAVE_FAILED_CODE,
            CycleEventKind::GateFailed => Self::GATE_FAILED_CODE,
            CycleEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`CycleEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::STATE_RESTORED_CODE => CycleEventKind::StateRestored,
            Self::COMPENSATION_DEFAULTED_CODE => CycleEventKind::CompensationDefaulted,
            Self::SAMPLES_DROPPED_CODE => CycleEventKind::SamplesDropped,
            Self::POLL_TIMED_OUT_CODE => CycleEventKind::PollTimedOut,
            Self::STATE_SAVE_FAILED_CODE => CycleEventKind::StateSaveFailed,
            Self::GATE_FAILED_CODE => CycleEventKind::GateFailed,
            value if (Self::PHASE_BASE..Self::STATE_RESTORED_CODE).contains(&value) => {
                CyclePhase::from_index(value - Self::PHASE_BASE)
                    .map_or(CycleEventKind::Custom(value), CycleEventKind::PhaseEntered)
            }
            value
                if (Self::STATE_DEFAULTED_BASE..Self::COMPENSATION_DEFAULTED_CODE)
                    .contains(&value) =>
            {
                default_reason_from_index(value - Self::STATE_DEFAULTED_BASE)
                    .map_or(CycleEventKind::Custom(value), CycleEventKind::StateDefaulted)
            }
            other => CycleEventKind::Custom(other),
        }
    }
}

const fn default_reason_index(reason: DefaultReason) -> u16 {
    match reason {
        DefaultReason::Missing => 0,
        DefaultReason::Corrupt => 1,
        DefaultReason::ZeroPair => 2,
    }
}

fn default_reason_from_index(index: u16) -> Option<DefaultReason> {
    match index {
        0 => Some(DefaultReason::Missing),
        1 => Some(DefaultReason::Corrupt),
        2 => Some(DefaultReason::ZeroPair),
        _ => None,
    }
}

/// Payloads carried alongside cycle events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryPayload {
    None,
    Samples(SampleStats),
    Gate(GateError),
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Record stored in the ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CycleRecord {
    pub timestamp_ms: TimestampMillis,
    pub event: CycleEventKind,
    pub details: TelemetryPayload,
}

/// Records retained per cycle; comfortably more than one cycle emits.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<CycleRecord, CAPACITY>;

/// Fixed-size history of the events of one cycle.
pub struct CycleTelemetry<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
}

impl<const CAPACITY: usize> CycleTelemetry<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
        }
    }

    pub fn record(
        &mut self,
        event: CycleEventKind,
        details: TelemetryPayload,
        timestamp_ms: TimestampMillis,
    ) {
        self.ring.write(CycleRecord {
            timestamp_ms,
            event,
            details,
        });
    }

    pub fn record_phase(&mut self, phase: CyclePhase, timestamp_ms: TimestampMillis) {
        self.record(
            CycleEventKind::PhaseEntered(phase),
            TelemetryPayload::none(),
            timestamp_ms,
        );
    }

    /// Returns the recorded events in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, CycleRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&CycleRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns `true` when an event of this kind was recorded.
    #[must_use]
    pub fn contains(&self, event: CycleEventKind) -> bool {
        self.ring.oldest_ordered().any(|record| record.event == event)
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const CAPACITY: usize> Default for CycleTelemetry<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
