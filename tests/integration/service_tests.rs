//! The whole controller through `AppService`, tick by tick.

use std::time::Duration;

use chrono::TimeDelta;

use chemostat::adapters::console::{render, ConsolePresenter};
use chemostat::adapters::sim::SimBench;
use chemostat::app::commands::AppCommand;
use chemostat::app::ports::{Clock, DeviceId, DevicePort};
use chemostat::app::service::AppService;
use chemostat::config::ChemostatConfig;
use chemostat::error::Error;
use chemostat::status::{StatusHub, SystemMode};

use crate::mock_hw::RecordingObserver;

fn start(config: ChemostatConfig, bench: &mut SimBench) -> AppService {
    let hub = StatusHub::new(bench.now())
        .with_observer(Box::new(ConsolePresenter::new(config.display_refresh())));
    AppService::start(config, hub, bench)
}

/// Tick once per `tick_interval` until `span` of bench time has passed.
fn run_for(app: &mut AppService, bench: &mut SimBench, span: TimeDelta) -> usize {
    let until = bench.now() + span;
    let tick = app.media().config().tick_interval();
    let mut cycles = 0;
    while bench.now() < until {
        if app.tick(bench).is_some() {
            cycles += 1;
        }
        bench.sleep(tick);
    }
    cycles
}

/// No heating and the first cycle pushed out of the way.
fn idle_config() -> ChemostatConfig {
    ChemostatConfig {
        heating_enabled: false,
        delay_first_cycle: true,
        first_cycle_delay_secs: 3600,
        ..ChemostatConfig::default()
    }
}

// ── Long runs ─────────────────────────────────────────────────

#[test]
fn two_hours_on_defaults() {
    let config = ChemostatConfig::default();
    let mut bench = SimBench::from_config(&config);
    let mut app = start(config, &mut bench);

    let cycles = run_for(&mut app, &mut bench, TimeDelta::hours(2));

    assert!(!app.is_error(), "{:?}", app.status().mode);
    assert!(cycles >= 7, "only {cycles} cycles");
    assert_eq!(app.media().cycles_completed() as usize, cycles);
    let status = app.status();
    // 125 mL per cycle, in and out kept in balance by calibration.
    assert!((status.media_out_ml - 125.0 * cycles as f32).abs() < 1.0);
    assert!(
        (status.media_in_ml - status.media_out_ml).abs() < 2.0 * cycles as f32,
        "in {} out {}",
        status.media_in_ml,
        status.media_out_ml
    );
    assert!((bench.volume_ml() - 1000.0).abs() < 5.0);
    assert!(!bench.overflowed());

    app.shutdown(&mut bench);
    for d in DeviceId::ALL {
        assert!(!bench.is_on(d), "{d} still on after shutdown");
    }
}

#[test]
fn thermostat_holds_setpoint() {
    let config = ChemostatConfig {
        heating_enabled: true,
        ..idle_config()
    };
    let mut bench = SimBench::from_config(&config);
    let mut app = start(config, &mut bench);

    run_for(&mut app, &mut bench, TimeDelta::seconds(3000));

    assert!(!app.is_error());
    assert_eq!(app.media().cycles_completed(), 0);
    assert!((bench.temperature() - 37.0).abs() < 0.5, "{}", bench.temperature());
    let t = app.status().temperature;
    assert!(t.sensor_ok);
    assert!(t.min_c.unwrap() < 23.0);
    assert!(t.max_c.unwrap() < 38.0);
}

#[test]
fn missing_thermometer_parks_hotplate_and_keeps_bubbling() {
    let config = ChemostatConfig {
        heating_enabled: true,
        ..idle_config()
    };
    let mut bench = SimBench::from_config(&config);
    bench.set_thermometer_present(false);
    let mut app = start(config, &mut bench);

    run_for(&mut app, &mut bench, TimeDelta::seconds(60));

    assert!(!app.is_error());
    assert!(!bench.is_on(DeviceId::Hotplate));
    assert!(bench.is_on(DeviceId::AirPump));
    assert!(!app.status().temperature.sensor_ok);
}

#[test]
fn overheat_locks_the_controller() {
    let config = ChemostatConfig {
        heating_enabled: true,
        ..idle_config()
    };
    let mut bench = SimBench::from_config(&config).with_temperature(50.0);
    let mut app = start(config, &mut bench);

    app.tick(&mut bench);
    assert!(app.is_error());
    match &app.status().mode {
        SystemMode::Error { description, .. } => {
            assert!(description.starts_with("System overheated"));
        }
        other => panic!("expected ERROR, got {other:?}"),
    }
    assert!(!bench.is_on(DeviceId::Hotplate));

    // Deadlines keep coming but nothing runs.
    let cycles = run_for(&mut app, &mut bench, TimeDelta::hours(2));
    assert_eq!(cycles, 0);
    assert!(!bench.is_on(DeviceId::Inlet) && !bench.is_on(DeviceId::Outlet));
}

// ── Aeration ──────────────────────────────────────────────────

#[test]
fn bubbler_follows_duty_cycle_between_cycles() {
    let config = ChemostatConfig {
        aeration_period_secs: 100,
        aeration_percent_on: 30,
        ..idle_config()
    };
    let mut bench = SimBench::from_config(&config);
    let mut app = start(config, &mut bench);
    assert!(bench.is_on(DeviceId::AirPump));

    run_for(&mut app, &mut bench, TimeDelta::seconds(1000));
    let on = bench.on_time(DeviceId::AirPump).as_secs_f32();
    assert!((on - 300.0).abs() <= 10.0, "bubbler ran {on}s");
}

#[test]
fn aeration_off_when_duty_is_zero() {
    let config = ChemostatConfig {
        aeration_percent_on: 0,
        ..idle_config()
    };
    let mut bench = SimBench::from_config(&config);
    let mut app = start(config, &mut bench);
    run_for(&mut app, &mut bench, TimeDelta::seconds(30));
    assert_eq!(bench.on_time(DeviceId::AirPump), Duration::ZERO);
}

// ── Operator commands ─────────────────────────────────────────

#[test]
fn timed_run_switches_off_on_its_own() {
    let mut bench = SimBench::from_config(&idle_config());
    let mut app = start(idle_config(), &mut bench);

    app.handle_command(
        AppCommand::RunFor {
            device: DeviceId::UvLed,
            duration: Duration::from_secs(5),
        },
        &mut bench,
    )
    .unwrap();
    assert!(app.timers().is_pending(DeviceId::UvLed));

    run_for(&mut app, &mut bench, TimeDelta::seconds(10));
    assert!(!bench.is_on(DeviceId::UvLed));
    assert!(app.timers().is_idle());
    assert_eq!(bench.on_time(DeviceId::UvLed), Duration::from_secs(5));
}

#[test]
fn second_timed_run_of_same_device_is_rejected() {
    let mut bench = SimBench::from_config(&idle_config());
    let mut app = start(idle_config(), &mut bench);
    let run = AppCommand::RunFor {
        device: DeviceId::UvLed,
        duration: Duration::from_secs(5),
    };
    app.handle_command(run, &mut bench).unwrap();
    assert!(matches!(
        app.handle_command(run, &mut bench),
        Err(Error::Actuator(_))
    ));
}

#[test]
fn due_cycle_preempts_manual_pump_run() {
    let config = ChemostatConfig {
        heating_enabled: false,
        ..ChemostatConfig::default()
    };
    let mut bench = SimBench::from_config(&config);
    let mut app = start(config, &mut bench);

    app.handle_command(
        AppCommand::RunFor {
            device: DeviceId::Inlet,
            duration: Duration::from_secs(600),
        },
        &mut bench,
    )
    .unwrap();
    bench.sleep(Duration::from_secs(1));

    let report = app.tick(&mut bench).expect("first cycle is due at startup");
    assert!(report.succeeded());
    assert!(!app.timers().is_pending(DeviceId::Inlet));
    assert!(!bench.is_on(DeviceId::Inlet));
}

#[test]
fn all_off_drops_pending_runs() {
    let mut bench = SimBench::from_config(&idle_config());
    let mut app = start(idle_config(), &mut bench);
    app.handle_command(
        AppCommand::Dispense {
            device: DeviceId::Inlet,
            volume_ml: 50.0,
        },
        &mut bench,
    )
    .unwrap();
    app.handle_command(AppCommand::AllOff, &mut bench).unwrap();

    assert!(app.timers().is_idle());
    assert!(app.status().active_devices.is_empty());
}

// ── Presentation ──────────────────────────────────────────────

#[test]
fn observers_see_every_mode() {
    let config = ChemostatConfig {
        heating_enabled: false,
        ..ChemostatConfig::default()
    };
    let mut bench = SimBench::from_config(&config);
    let recorder = RecordingObserver::new();
    let hub = StatusHub::new(bench.now()).with_observer(Box::new(recorder.clone()));
    let mut app = AppService::start(config, hub, &mut bench);

    run_for(&mut app, &mut bench, TimeDelta::seconds(10));
    bench.stick_water_level(Some(true));
    run_for(&mut app, &mut bench, TimeDelta::seconds(1000));

    let snapshots = recorder.snapshots.borrow();
    let seen = |name: &str| snapshots.iter().any(|s| s.mode.name() == name);
    assert!(seen("standby"));
    assert!(seen("media exchange"));
    assert!(seen("error"));
    // Timestamps never run backwards.
    assert!(snapshots.windows(2).all(|w| w[0].as_of <= w[1].as_of));
}

#[test]
fn standby_page_shows_totals_and_countdown() {
    let config = ChemostatConfig {
        heating_enabled: false,
        ..ChemostatConfig::default()
    };
    let mut bench = SimBench::from_config(&config);
    let mut app = start(config, &mut bench);
    run_for(&mut app, &mut bench, TimeDelta::seconds(600));

    let page = render(app.status());
    assert!(page[1].starts_with("In 0.1"), "{}", page[1]);
    assert!(page[1].contains("Out 0.1"));
    assert!(page[2].starts_with("Next in "));
    assert!(page.iter().all(|l| l.chars().count() <= 20));
}
