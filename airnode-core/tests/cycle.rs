mod common;

use core::time::Duration;

use airnode_core::cycle::{CycleOutcome, CyclePhase};
use airnode_core::gas_index::{GasIndexAlgorithm, VocIndexAlgorithm};
use airnode_core::gate::GateError;
use airnode_core::sampler::DEFAULT_COMPENSATION;
use airnode_core::sensors::SelfTestError;
use airnode_core::state::{DefaultReason, LoadOutcome, STATE_KEY_S0, STATE_KEY_S1};
use airnode_core::telemetry::{CycleEventKind, TelemetryPayload};

use common::{
    CLEAN_AIR_RAW, Cluster, CollectingSink, CountingAlgorithm, MemoryKv, harness, voc_harness,
};

const TEN_MINUTES: Duration = Duration::from_mins(10);

#[test]
fn healthy_cycle_reports_every_field_and_sleeps() {
    let mut orchestrator = voc_harness(Cluster::healthy(), MemoryKv::default());
    let mut sink = CollectingSink::default();

    let outcome = orchestrator.run(&mut sink);

    assert!(outcome.is_completed());
    assert_eq!(outcome.sleep_duration(), TEN_MINUTES);
    assert_eq!(sink.reports.len(), 1);

    let report = sink.reports[0];
    assert_eq!(outcome.report(), Some(&report));
    assert!(!report.compensation_defaulted);
    assert_eq!(report.compensation.temperature_c, 21.5);
    assert!(report.gas_index.is_some());
    assert_eq!(report.samples.attempted, 60);
    assert_eq!(report.samples.accepted, 60);
    assert_eq!(report.co2_ppm_or_nan(), 640.0);
    assert_eq!(report.battery_mv, 3_850);
    assert_eq!(
        report.state_load,
        LoadOutcome::Defaulted(DefaultReason::Missing)
    );

    let parts = orchestrator.into_parts();
    assert_eq!(parts.rail.levels, vec![true, false]);
    assert_eq!(parts.kv.commits, 1);
    assert!(parts.kv.values.contains_key(STATE_KEY_S0));
    assert!(parts.kv.values.contains_key(STATE_KEY_S1));
    assert_eq!(parts.sensors.co2.mode, Some((true, false)));
}

#[test]
fn healthy_cycle_walks_every_phase_in_order() {
    let mut orchestrator = voc_harness(Cluster::healthy(), MemoryKv::default());
    orchestrator.run(&mut CollectingSink::default());

    let phases: Vec<CyclePhase> = orchestrator
        .telemetry()
        .oldest_first()
        .filter_map(|record| match record.event {
            CycleEventKind::PhaseEntered(phase) => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(phases, CyclePhase::ALL.to_vec());
    assert_eq!(orchestrator.phase(), CyclePhase::Sleeping);
}

#[test]
fn battery_is_read_before_the_rail_drops() {
    let mut orchestrator = voc_harness(Cluster::healthy(), MemoryKv::default());
    orchestrator.run(&mut CollectingSink::default());
    let parts = orchestrator.into_parts();
    assert_eq!(parts.battery.reads_with_rail, vec![true]);
}

fn assert_aborted(cluster: Cluster, expected: GateError) {
    let mut orchestrator = harness(cluster, CountingAlgorithm::default(), MemoryKv::default());
    let mut sink = CollectingSink::default();

    let outcome = orchestrator.run(&mut sink);

    assert_eq!(
        outcome,
        CycleOutcome::Aborted {
            error: expected,
            sleep: TEN_MINUTES,
        }
    );
    assert!(sink.reports.is_empty(), "aborted cycle must not report");
    assert!(orchestrator.telemetry().contains(CycleEventKind::GateFailed));
    assert_eq!(
        orchestrator.telemetry().latest().map(|record| record.event),
        Some(CycleEventKind::PhaseEntered(CyclePhase::Sleeping))
    );

    let parts = orchestrator.into_parts();
    assert_eq!(parts.rail.levels, vec![true, false]);
    assert_eq!(parts.kv.commits, 0, "aborted cycle must not touch state");
    assert_eq!(parts.sensors.gas.measurements, 0);
    assert_eq!(parts.algorithm.processed, 0);
    assert!(parts.battery.reads_with_rail.is_empty());
}

#[test]
fn missing_reference_sensor_aborts() {
    let mut cluster = Cluster::healthy();
    cluster.reference.present = false;
    assert_aborted(cluster, GateError::ReferenceAbsent);
}

#[test]
fn missing_gas_sensor_aborts() {
    let mut cluster = Cluster::healthy();
    cluster.gas.present = false;
    assert_aborted(cluster, GateError::GasSensorAbsent);
}

#[test]
fn wrong_self_test_signature_aborts() {
    let mut cluster = Cluster::healthy();
    cluster.gas.self_test = Ok(0xBEEF);
    assert_aborted(
        cluster,
        GateError::GasSelfTestMismatch { signature: 0xBEEF },
    );
}

#[test]
fn failed_self_test_aborts() {
    let mut cluster = Cluster::healthy();
    cluster.gas.self_test = Err(SelfTestError::new(0x0001));
    assert_aborted(
        cluster,
        GateError::GasSelfTestFailed(SelfTestError::new(0x0001)),
    );
}

#[test]
fn missing_co2_sensor_aborts() {
    let mut cluster = Cluster::healthy();
    cluster.co2.present = false;
    assert_aborted(cluster, GateError::Co2Absent);
}

#[test]
fn co2_refusing_periodic_mode_aborts() {
    let mut cluster = Cluster::healthy();
    cluster.co2.start_ok = false;
    assert_aborted(cluster, GateError::Co2StartFailed);
}

#[test]
fn fatal_path_records_the_gate_error() {
    let mut cluster = Cluster::healthy();
    cluster.co2.present = false;
    let mut orchestrator = harness(cluster, CountingAlgorithm::default(), MemoryKv::default());
    orchestrator.run(&mut CollectingSink::default());

    let gate_record = orchestrator
        .telemetry()
        .oldest_first()
        .find(|record| record.event == CycleEventKind::GateFailed)
        .expect("gate failure recorded");
    assert_eq!(
        gate_record.details,
        TelemetryPayload::Gate(GateError::Co2Absent)
    );
}

#[test]
fn reference_read_failure_degrades_to_default_compensation() {
    let mut cluster = Cluster::healthy();
    cluster.reference.reading = None;
    let mut orchestrator = voc_harness(cluster, MemoryKv::default());
    let mut sink = CollectingSink::default();

    let outcome = orchestrator.run(&mut sink);

    assert!(outcome.is_completed());
    let report = sink.reports[0];
    assert!(report.compensation_defaulted);
    assert_eq!(report.compensation, DEFAULT_COMPENSATION);
    assert!(
        orchestrator
            .telemetry()
            .contains(CycleEventKind::CompensationDefaulted)
    );

    let gas = &orchestrator.sensors().gas;
    assert_eq!(gas.ticks_seen.len(), 60);
    assert!(gas.ticks_seen.iter().all(|ticks| *ticks == (0x7FFF, 0x6666)));
}

#[test]
fn non_finite_reference_reading_is_treated_as_failure() {
    let mut cluster = Cluster::healthy();
    cluster.reference.reading = Some((f32::NAN, 40.0));
    let mut sink = CollectingSink::default();
    voc_harness(cluster, MemoryKv::default()).run(&mut sink);
    assert!(sink.reports[0].compensation_defaulted);
}

#[test]
fn raw_read_failures_never_change_the_sample_count() {
    let mut cluster = Cluster::healthy();
    cluster.gas.fail_every = Some(3);
    let mut orchestrator = harness(cluster, CountingAlgorithm::default(), MemoryKv::default());
    let mut sink = CollectingSink::default();

    orchestrator.run(&mut sink);

    let report = sink.reports[0];
    assert_eq!(report.samples.attempted, 60);
    assert_eq!(report.samples.accepted, 40);
    assert_eq!(report.gas_index, Some(100.0));
    assert!(orchestrator.telemetry().contains(CycleEventKind::SamplesDropped));

    let parts = orchestrator.into_parts();
    assert_eq!(parts.sensors.gas.measurements, 60);
    assert_eq!(parts.algorithm.processed, 40);
}

#[test]
fn every_raw_read_failing_still_completes() {
    let mut cluster = Cluster::healthy();
    cluster.gas.fail_every = Some(1);
    let mut sink = CollectingSink::default();
    let outcome = harness(cluster, CountingAlgorithm::default(), MemoryKv::default()).run(&mut sink);

    assert!(outcome.is_completed());
    assert_eq!(sink.reports[0].gas_index, None);
    assert!(sink.reports[0].gas_index_or_nan().is_nan());
}

#[test]
fn co2_never_ready_is_degraded_and_bounded() {
    let mut cluster = Cluster::healthy();
    cluster.co2.ready_after = None;
    let mut orchestrator = voc_harness(cluster, MemoryKv::default());
    let mut sink = CollectingSink::default();

    let outcome = orchestrator.run(&mut sink);

    assert!(outcome.is_completed());
    assert_eq!(sink.reports[0].secondary, None);
    assert!(sink.reports[0].co2_ppm_or_nan().is_nan());
    assert!(orchestrator.telemetry().contains(CycleEventKind::PollTimedOut));

    let warmup_and_sampling = 5_000 + 60 * 1_000;
    let elapsed = orchestrator.clock().now;
    assert!(elapsed >= warmup_and_sampling + 30_000);
    assert!(elapsed <= warmup_and_sampling + 30_000 + 500);
}

#[test]
fn save_failure_is_not_fatal() {
    let kv = MemoryKv {
        fail_puts: true,
        ..MemoryKv::default()
    };
    let mut orchestrator = voc_harness(Cluster::healthy(), kv);
    let mut sink = CollectingSink::default();

    let outcome = orchestrator.run(&mut sink);

    assert!(outcome.is_completed());
    assert_eq!(sink.reports.len(), 1);
    assert!(orchestrator.telemetry().contains(CycleEventKind::StateSaveFailed));
    assert_eq!(orchestrator.into_parts().rail.levels, vec![true, false]);
}

#[test]
fn repeated_cold_starts_on_one_orchestrator_match() {
    let kv = MemoryKv {
        fail_puts: true,
        ..MemoryKv::default()
    };
    let mut orchestrator = voc_harness(Cluster::healthy(), kv);
    let mut sink = CollectingSink::default();

    orchestrator.run(&mut sink);
    orchestrator.run(&mut sink);

    assert_eq!(sink.reports.len(), 2);
    for report in &sink.reports {
        assert_eq!(report.state_load, LoadOutcome::Defaulted(DefaultReason::Missing));
    }
    assert_eq!(sink.reports[0].gas_index, sink.reports[1].gas_index);
    assert_eq!(sink.reports[0].samples, sink.reports[1].samples);

    let mut fresh = VocIndexAlgorithm::new();
    for _ in 0..60 {
        fresh.process(CLEAN_AIR_RAW);
    }
    assert_eq!(orchestrator.algorithm().get_states(), fresh.get_states());
}

#[test]
fn every_run_resets_the_algorithm_before_seeding() {
    let mut kv = MemoryKv::default();
    kv.values.insert(STATE_KEY_S0.to_owned(), 11_250.0);
    kv.values.insert(STATE_KEY_S1.to_owned(), 44.0);
    let mut orchestrator = harness(Cluster::healthy(), CountingAlgorithm::default(), kv);
    let mut sink = CollectingSink::default();

    orchestrator.run(&mut sink);
    orchestrator.run(&mut sink);

    let algorithm = orchestrator.algorithm();
    assert_eq!(algorithm.resets, 2);
    assert_eq!(algorithm.processed, 60);
    assert_eq!(algorithm.seeded, Some((11_250.0, 44.0)));
}

#[test]
fn zero_pair_in_storage_is_a_cold_start() {
    let mut kv = MemoryKv::default();
    kv.values.insert(STATE_KEY_S0.to_owned(), 0.0);
    kv.values.insert(STATE_KEY_S1.to_owned(), 0.0);

    let mut orchestrator = harness(Cluster::healthy(), CountingAlgorithm::default(), kv);
    let mut sink = CollectingSink::default();
    orchestrator.run(&mut sink);

    assert_eq!(
        sink.reports[0].state_load,
        LoadOutcome::Defaulted(DefaultReason::ZeroPair)
    );
    assert_eq!(orchestrator.algorithm().seeded, None);
}

#[test]
fn stored_pair_seeds_the_algorithm() {
    let mut kv = MemoryKv::default();
    kv.values.insert(STATE_KEY_S0.to_owned(), 11_250.0);
    kv.values.insert(STATE_KEY_S1.to_owned(), 44.0);

    let mut orchestrator = harness(Cluster::healthy(), CountingAlgorithm::default(), kv);
    let mut sink = CollectingSink::default();
    orchestrator.run(&mut sink);

    assert_eq!(sink.reports[0].state_load, LoadOutcome::Restored);
    assert_eq!(orchestrator.algorithm().seeded, Some((11_250.0, 44.0)));
    assert!(orchestrator.telemetry().contains(CycleEventKind::StateRestored));
}
