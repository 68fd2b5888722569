//! Timetable, deadline supervision and the startup fill.

use std::time::Duration;

use chrono::TimeDelta;

use chemostat::adapters::sim::{SimBench, SimVessel};
use chemostat::app::ports::{Clock, DeviceId, DevicePort};
use chemostat::config::ChemostatConfig;
use chemostat::scheduler::MediaExchange;
use chemostat::status::SystemMode;

use crate::mock_hw::{bench, hub_with_recorder, scenario_config, RecordingBench};

fn error_description(mode: &SystemMode) -> &str {
    match mode {
        SystemMode::Error { description, .. } => description,
        other => panic!("expected ERROR, got {other:?}"),
    }
}

// ── Timetable ─────────────────────────────────────────────────

#[test]
fn nothing_runs_before_the_due_time() {
    let config = ChemostatConfig {
        delay_first_cycle: true,
        first_cycle_delay_secs: 60,
        ..scenario_config()
    };
    let mut bench = bench(560.0);
    let (mut hub, _) = hub_with_recorder(bench.now());
    let t0 = bench.now();
    let mut media = MediaExchange::start(config, &mut bench, &mut hub);

    assert_eq!(media.next_cycle_time(), t0 + TimeDelta::seconds(960));
    bench.sleep(Duration::from_secs(959));
    assert!(media.check(&mut bench, &mut hub).is_none());
    assert!(bench.calls.is_empty());

    bench.sleep(Duration::from_secs(2));
    assert!(media.check(&mut bench, &mut hub).is_some());
}

#[test]
fn next_stays_before_next_next_across_cycles() {
    let mut bench = bench(560.0);
    let (mut hub, _) = hub_with_recorder(bench.now());
    let mut media = MediaExchange::start(scenario_config(), &mut bench, &mut hub);

    for _ in 0..600 {
        let s = media.schedule();
        assert!(s.next() < s.next_next());
        media.check(&mut bench, &mut hub);
        let s = media.schedule();
        assert!(s.next() < s.next_next());
        bench.sleep(Duration::from_secs(10));
    }
    assert!(!hub.is_error());
    assert!(media.cycles_completed() >= 6);
    assert_eq!(hub.status().next_cycle_time, Some(media.next_cycle_time()));
}

// ── Missed deadline ───────────────────────────────────────────

#[test]
fn late_check_raises_error_and_runs_nothing() {
    let mut bench = bench(560.0);
    let (mut hub, _) = hub_with_recorder(bench.now());
    let mut media = MediaExchange::start(scenario_config(), &mut bench, &mut hub);
    let missed = media.next_cycle_time();

    // Past next_next without a single check.
    bench.sleep(Duration::from_secs(901));
    assert!(media.check(&mut bench, &mut hub).is_none());
    assert!(hub.is_error());
    assert!(error_description(hub.mode()).starts_with("Missed cycle due at"));
    assert!(error_description(hub.mode()).contains(&missed.format("%H:%M:%S").to_string()));

    bench.sleep(Duration::from_secs(900));
    assert!(media.check(&mut bench, &mut hub).is_none());
    assert!(bench.calls.is_empty());
}

#[test]
fn missed_deadline_in_error_keeps_first_fault() {
    let mut bench = bench(560.0);
    let (mut hub, recorder) = hub_with_recorder(bench.now());
    let mut media = MediaExchange::start(scenario_config(), &mut bench, &mut hub);
    hub.set_error("operator stop", bench.now());

    bench.sleep(Duration::from_secs(5000));
    media.check(&mut bench, &mut hub);
    assert_eq!(error_description(hub.mode()), "operator stop");
    assert!(recorder.len() > 0);
}

// ── Startup fill ──────────────────────────────────────────────

fn fill_config() -> ChemostatConfig {
    ChemostatConfig {
        reactor_volume_ml: None,
        max_vessel_volume_ml: 400.0,
        inlet_flow_ml_per_s: 2.0,
        outlet_flow_ml_per_s: 2.0,
        poll_interval_ms: 500,
        first_cycle_delay_secs: 120,
        ..ChemostatConfig::default()
    }
}

#[test]
fn fill_measures_volume_and_delays_first_cycle() {
    let mut bench = RecordingBench::new(
        SimBench::new(SimVessel::new(0.0, 250.0, 400.0)).with_flows(2.0, 2.0),
    );
    let (mut hub, _) = hub_with_recorder(bench.now());
    let media = MediaExchange::start(fill_config(), &mut bench, &mut hub);

    assert!(!hub.is_error());
    assert!((media.reactor_volume_ml() - 250.0).abs() <= 1.0);
    // 0.5 vessel volumes per hour over 4 cycles.
    assert!((media.volume_per_cycle_ml() - media.reactor_volume_ml() / 8.0).abs() < 1e-3);
    assert!((hub.status().media_in_ml - media.reactor_volume_ml()).abs() < 1e-3);
    assert_eq!(hub.status().mode, SystemMode::Standby);
    assert!(!bench.sim.is_on(DeviceId::Inlet));

    // One interval plus the configured delay after the fill finished.
    assert_eq!(
        media.next_cycle_time(),
        bench.now() + TimeDelta::seconds(900 + 120)
    );
}

#[test]
fn wet_sensor_before_fill_runs_to_ceiling() {
    let mut bench = RecordingBench::new(
        SimBench::new(SimVessel::new(0.0, 250.0, 400.0)).with_flows(2.0, 2.0),
    );
    bench.sim.stick_water_level(Some(true));
    let (mut hub, _) = hub_with_recorder(bench.now());
    let t0 = bench.now();
    let media = MediaExchange::start(fill_config(), &mut bench, &mut hub);

    assert!(hub.is_error());
    let description = error_description(hub.mode());
    assert!(description.starts_with("Fill ceiling of 200s"), "{description}");
    assert!(description.contains("already wet"));
    // Ran the full ceiling, not a single poll.
    assert!(bench.now() - t0 >= TimeDelta::seconds(200));
    assert!(!bench.sim.is_on(DeviceId::Inlet));
    assert_eq!(media.reactor_volume_ml(), 0.0);
}

#[test]
fn dry_sensor_runs_fill_to_ceiling() {
    let mut bench = RecordingBench::new(
        SimBench::new(SimVessel::new(0.0, 250.0, 400.0)).with_flows(2.0, 2.0),
    );
    bench.sim.stick_water_level(Some(false));
    let (mut hub, _) = hub_with_recorder(bench.now());
    MediaExchange::start(fill_config(), &mut bench, &mut hub);

    let description = error_description(hub.mode());
    assert!(description.starts_with("Fill ceiling"));
    assert!(!description.contains("already wet"));
    assert!(!bench.any_pump_on());
}

#[test]
fn failed_fill_blocks_every_cycle() {
    let mut bench = RecordingBench::new(
        SimBench::new(SimVessel::new(0.0, 250.0, 400.0)).with_flows(2.0, 2.0),
    );
    bench.sim.stick_water_level(Some(false));
    let (mut hub, _) = hub_with_recorder(bench.now());
    let mut media = MediaExchange::start(fill_config(), &mut bench, &mut hub);
    let starts = bench.starts(DeviceId::Inlet);

    for _ in 0..10 {
        bench.sleep(Duration::from_secs(600));
        assert!(media.check(&mut bench, &mut hub).is_none());
    }
    assert_eq!(bench.starts(DeviceId::Inlet), starts);
}

#[test]
fn wet_glitch_before_fill_still_fails() {
    // Wet for the first two reads, then the honest model: the sensor
    // would trigger at 250 mL, well inside the ceiling.
    let mut bench = RecordingBench::new(
        SimBench::new(SimVessel::new(0.0, 250.0, 400.0)).with_flows(2.0, 2.0),
    );
    bench.sim.glitch_water_level(2);
    let (mut hub, _) = hub_with_recorder(bench.now());
    let t0 = bench.now();
    let media = MediaExchange::start(fill_config(), &mut bench, &mut hub);

    assert!(hub.is_error(), "{:?}", hub.mode());
    assert!(error_description(hub.mode()).contains("already wet"));
    assert_eq!(media.reactor_volume_ml(), 0.0);
    assert!(bench.now() - t0 >= TimeDelta::seconds(200));
    assert!(!bench.any_pump_on());
}

#[test]
fn trigger_on_the_ceiling_poll_counts_as_filled() {
    // Sensor at full capacity: it trips on the very poll where the inlet
    // on-time reaches the 200 s ceiling.
    let mut bench = RecordingBench::new(
        SimBench::new(SimVessel::new(0.0, 400.0, 400.0)).with_flows(2.0, 2.0),
    );
    let (mut hub, _) = hub_with_recorder(bench.now());
    let media = MediaExchange::start(fill_config(), &mut bench, &mut hub);

    assert!(!hub.is_error(), "{:?}", hub.mode());
    assert!((media.reactor_volume_ml() - 400.0).abs() < 1e-3);
    assert_eq!(bench.sim.on_time(DeviceId::Inlet), Duration::from_secs(200));
    assert!(!bench.sim.overflowed());
}
