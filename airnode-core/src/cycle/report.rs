use core::fmt;

use crate::poller::SecondaryReading;
use crate::sampler::{CompensationInput, SampleStats};
use crate::state::LoadOutcome;

/// Everything a completed cycle learned, assembled once and handed to the
/// [`ReportSink`]. `None` marks an invalid field.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CycleReport {
    /// Climate actually used for compensation (the fallback when defaulted).
    pub compensation: CompensationInput,
    pub compensation_defaulted: bool,
    pub gas_index: Option<f32>,
    pub samples: SampleStats,
    pub secondary: Option<SecondaryReading>,
    pub battery_mv: u32,
    pub state_load: LoadOutcome,
}

impl CycleReport {
    #[must_use]
    pub fn gas_index_or_nan(&self) -> f32 {
        self.gas_index.unwrap_or(f32::NAN)
    }

    #[must_use]
    pub fn co2_ppm_or_nan(&self) -> f32 {
        self.secondary.map_or(f32::NAN, |reading| reading.co2_ppm)
    }

    #[must_use]
    pub fn secondary_temperature_or_nan(&self) -> f32 {
        self.secondary.map_or(f32::NAN, |reading| reading.temperature_c)
    }

    #[must_use]
    pub fn secondary_humidity_or_nan(&self) -> f32 {
        self.secondary.map_or(f32::NAN, |reading| reading.humidity_pct)
    }

    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn battery_volts(&self) -> f32 {
        self.battery_mv as f32 / 1000.0
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "comp {}", self.compensation)?;
        if self.compensation_defaulted {
            f.write_str(" (default)")?;
        }
        match self.gas_index {
            Some(index) => write!(f, " voc {index:.0}")?,
            None => f.write_str(" voc n/a")?,
        }
        write!(
            f,
            " [{}/{}]",
            self.samples.accepted, self.samples.attempted
        )?;
        match self.secondary {
            Some(reading) => write!(
                f,
                " co2 {:.0}ppm {:.1}C {:.1}%RH",
                reading.co2_ppm, reading.temperature_c, reading.humidity_pct
            )?,
            None => f.write_str(" co2 n/a")?,
        }
        write!(f, " bat {}mV", self.battery_mv)?;
        if !self.state_load.is_restored() {
            f.write_str(" cold-start")?;
        }
        Ok(())
    }
}

/// Receives the report of every completed cycle.
pub trait ReportSink {
    fn publish(&mut self, report: &CycleReport);
}

/// Sink that drops every report.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopReportSink;

impl ReportSink for NoopReportSink {
    fn publish(&mut self, _: &CycleReport) {}
}
