//! Log output for cycle reports, cycle telemetry and driver faults.
//!
//! On target everything goes through defmt over RTT; host builds print to the
//! console so the formatting can be exercised by unit tests.

use core::fmt;

use airnode_core::cycle::{CycleOutcome, CycleReport, ReportSink};
use airnode_core::telemetry::{CycleRecord, CycleTelemetry};

/// Publishes each cycle report as a single `report` log line.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogReportSink {
    published: u32,
}

impl LogReportSink {
    pub const fn new() -> Self {
        Self { published: 0 }
    }

    pub const fn published(&self) -> u32 {
        self.published
    }
}

impl ReportSink for LogReportSink {
    fn publish(&mut self, report: &CycleReport) {
        self.published = self.published.wrapping_add(1);
        emit_report(report);
    }
}

/// Dumps the cycle's telemetry ring, oldest first.
pub fn log_cycle_telemetry<const CAPACITY: usize>(telemetry: &CycleTelemetry<CAPACITY>) {
    for record in telemetry.oldest_first() {
        emit_record(record);
    }
}

pub fn log_outcome(outcome: &CycleOutcome) {
    let sleep_s = outcome.sleep_duration().as_secs();
    match outcome {
        CycleOutcome::Completed { .. } => emit_line("cycle", "completed", sleep_s),
        CycleOutcome::Aborted { error, .. } => emit_abort(error, sleep_s),
    }
}

pub fn warn_driver<E: fmt::Display>(driver: &'static str, error: &E) {
    emit_warning(driver, error);
}

#[cfg(target_os = "none")]
fn emit_report(report: &CycleReport) {
    defmt::info!("report {}", defmt::Display2Format(report));
}

#[cfg(not(target_os = "none"))]
fn emit_report(report: &CycleReport) {
    println!("report {report}");
}

#[cfg(target_os = "none")]
fn emit_record(record: &CycleRecord) {
    defmt::debug!(
        "telemetry:cycle t={}ms code=0x{:04x} {}",
        record.timestamp_ms,
        record.event.to_raw(),
        defmt::Display2Format(&record.event)
    );
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &CycleRecord) {
    println!(
        "telemetry:cycle t={}ms code=0x{:04x} {}",
        record.timestamp_ms,
        record.event.to_raw(),
        record.event
    );
}

#[cfg(target_os = "none")]
fn emit_line(scope: &'static str, what: &'static str, sleep_s: u64) {
    defmt::info!("{} {} sleep={}s", scope, what, sleep_s);
}

#[cfg(not(target_os = "none"))]
fn emit_line(scope: &'static str, what: &'static str, sleep_s: u64) {
    println!("{scope} {what} sleep={sleep_s}s");
}

#[cfg(target_os = "none")]
fn emit_abort<E: fmt::Display>(error: &E, sleep_s: u64) {
    defmt::error!(
        "cycle aborted: {} sleep={}s",
        defmt::Display2Format(error),
        sleep_s
    );
}

#[cfg(not(target_os = "none"))]
fn emit_abort<E: fmt::Display>(error: &E, sleep_s: u64) {
    println!("cycle aborted: {error} sleep={sleep_s}s");
}

#[cfg(target_os = "none")]
fn emit_warning<E: fmt::Display>(driver: &'static str, error: &E) {
    defmt::warn!("{}: {}", driver, defmt::Display2Format(error));
}

#[cfg(not(target_os = "none"))]
fn emit_warning<E: fmt::Display>(driver: &'static str, error: &E) {
    println!("{driver}: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use airnode_core::sampler::{DEFAULT_COMPENSATION, SampleStats};
    use airnode_core::state::LoadOutcome;

    #[test]
    fn sink_counts_published_reports() {
        let report = CycleReport {
            compensation: DEFAULT_COMPENSATION,
            compensation_defaulted: false,
            gas_index: Some(98.0),
            samples: SampleStats {
                attempted: 60,
                accepted: 60,
            },
            secondary: None,
            battery_mv: 3_900,
            state_load: LoadOutcome::Restored,
        };

        let mut sink = LogReportSink::new();
        sink.publish(&report);
        sink.publish(&report);
        assert_eq!(sink.published(), 2);
    }
}
