//! One media-exchange cycle, end to end, through the scheduler.

use std::time::Duration;

use chemostat::app::ports::{Clock, DeviceId, DevicePort};
use chemostat::config::ChemostatConfig;
use chemostat::error::Fault;
use chemostat::fsm::Phase;
use chemostat::scheduler::{CycleReport, MediaExchange};
use chemostat::status::StatusHub;

use crate::mock_hw::{bench, hub_with_recorder, scenario_config, RecordingBench, RecordingObserver};

struct Run {
    bench: RecordingBench,
    hub: StatusHub,
    recorder: RecordingObserver,
    media: MediaExchange,
}

fn started(config: ChemostatConfig, mut bench: RecordingBench) -> Run {
    let (mut hub, recorder) = hub_with_recorder(bench.now());
    let media = MediaExchange::start(config, &mut bench, &mut hub);
    Run {
        bench,
        hub,
        recorder,
        media,
    }
}

impl Run {
    /// Let the due time pass and run the cycle.
    fn cycle(&mut self) -> CycleReport {
        self.bench.sleep(Duration::from_secs(1));
        self.media
            .check(&mut self.bench, &mut self.hub)
            .expect("a cycle should be due")
    }

    fn description(&self) -> String {
        match &self.hub.status().mode {
            chemostat::status::SystemMode::Error { description, .. } => description.clone(),
            other => panic!("expected ERROR, got {other:?}"),
        }
    }
}

// ── Healthy cycles ────────────────────────────────────────────

#[test]
fn under_fill_is_topped_up_by_calibration() {
    // Sensor 60 mL above the starting level: silent through FILL, trips
    // 30 s into CALIB.
    let mut run = started(scenario_config(), bench(560.0));
    let report = run.cycle();

    assert!(report.succeeded());
    assert_eq!(report.target_volume_ml, 100.0);
    assert!((report.out_volume_ml - 100.0).abs() < 1e-3);
    assert!(
        (report.in_volume_ml - 160.0).abs() <= 0.5,
        "in volume {}",
        report.in_volume_ml
    );
    assert_eq!(
        run.recorder.phases(),
        vec![
            Phase::Inactive,
            Phase::Start,
            Phase::Drain,
            Phase::Fill,
            Phase::Under,
            Phase::Calib,
            Phase::Done,
            Phase::Inactive,
        ]
    );

    let status = run.hub.status();
    assert_eq!(status.media_in_ml, report.in_volume_ml);
    assert_eq!(status.media_out_ml, report.out_volume_ml);
    assert!(!status.cycle.is_active());
    assert!(!run.bench.any_pump_on());
    assert!(!run.hub.is_error());
}

#[test]
fn early_trigger_goes_over_and_skips_calibration_pump() {
    // Sensor trips 40 s into a 50 s fill.
    let mut run = started(scenario_config(), bench(480.0));
    let report = run.cycle();

    assert!(report.succeeded());
    let phases = run.recorder.phases();
    assert!(phases.contains(&Phase::Over));
    assert!(!phases.contains(&Phase::Under));
    assert!((report.in_volume_ml - 80.0).abs() <= 0.5);
    // Calibration found the sensor already wet and never restarted the inlet.
    assert_eq!(run.bench.starts(DeviceId::Inlet), 1);
}

#[test]
fn totals_grow_by_each_cycle() {
    let mut run = started(scenario_config(), bench(560.0));
    let first = run.cycle();
    run.bench.sleep(Duration::from_secs(900));
    let second = run
        .media
        .check(&mut run.bench, &mut run.hub)
        .expect("second cycle due");

    assert!(first.succeeded() && second.succeeded());
    let status = run.hub.status();
    assert!((status.media_in_ml - (first.in_volume_ml + second.in_volume_ml)).abs() < 1e-3);
    assert!((status.media_out_ml - (first.out_volume_ml + second.out_volume_ml)).abs() < 1e-3);
    assert_eq!(run.media.cycles_completed(), 2);
}

#[test]
fn drain_runs_outlet_and_bubbler_together() {
    let mut run = started(scenario_config(), bench(560.0));
    run.cycle();
    let outlet_on = run
        .bench
        .calls
        .iter()
        .position(|c| *c == (DeviceId::Outlet, true))
        .unwrap();
    assert_eq!(run.bench.calls[outlet_on + 1], (DeviceId::AirPump, true));
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn wet_sensor_after_drain_stops_in_drain() {
    let mut run = started(scenario_config(), bench(560.0));
    run.bench.sim.stick_water_level(Some(true));
    let report = run.cycle();

    assert_eq!(report.final_phase, Phase::Drain);
    assert_eq!(report.fault, Some(Fault::PostDrainLevel));
    assert!(run.hub.is_error());
    assert_eq!(run.hub.status().cycle.phase(), Phase::Drain);
    assert!(run.description().contains("after drain"));
    assert!(!run.bench.any_pump_on());
    // Nothing folded into the totals.
    assert_eq!(run.hub.status().media_out_ml, 0.0);
}

#[test]
fn dead_sensor_fails_calibration() {
    let mut run = started(scenario_config(), bench(560.0));
    run.bench.sim.stick_water_level(Some(false));
    let report = run.cycle();

    assert_eq!(report.final_phase, Phase::Error);
    assert!(matches!(report.fault, Some(Fault::CalibrationFailed { .. })));
    assert!(run.description().starts_with("Calibration failed after 50s"));
    assert!(!run.bench.any_pump_on());
}

#[test]
fn seized_outlet_trips_stall_guard() {
    let mut run = started(scenario_config(), bench(560.0));
    run.bench.sim.freeze_on_time(DeviceId::Outlet);
    let report = run.cycle();

    assert_eq!(
        report.fault,
        Some(Fault::PumpStalled {
            device: DeviceId::Outlet
        })
    );
    assert!(!run.bench.sim.is_on(DeviceId::Outlet));
    assert!(run.hub.is_error());
}

#[test]
fn relay_failure_is_fatal() {
    let mut run = started(scenario_config(), bench(560.0));
    run.bench.sim.refuse_switching(Some(DeviceId::Inlet));
    let report = run.cycle();

    assert_eq!(report.final_phase, Phase::Fill);
    assert!(matches!(report.fault, Some(Fault::ActuatorFailure(_))));
    assert!(!run.bench.any_pump_on());
}

#[test]
fn unreadable_level_sensor_is_fatal() {
    let mut run = started(scenario_config(), bench(560.0));
    run.bench.sim.fail_water_level_reads(true);
    let report = run.cycle();

    assert!(matches!(report.fault, Some(Fault::WaterLevelUnavailable(_))));
    assert!(!run.bench.any_pump_on());
}

#[test]
fn first_fault_wins() {
    let mut run = started(scenario_config(), bench(560.0));
    run.bench.sim.stick_water_level(Some(true));
    run.cycle();
    let first = run.description();

    run.hub.set_error("something else", run.bench.now());
    assert_eq!(run.description(), first);
}
