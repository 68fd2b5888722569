//! Chemostat controller: main entry point.
//!
//! Hexagonal architecture with a single-threaded driver loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GpioBench / SimBench   ConsolePresenter   JsonConfigFile      │
//! │  (Device+Sensor+Clock)  (StatusObserver)   (ConfigPort)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  MediaExchange · Thermal · Aeration · Timed auto-off   │    │
//! │  │                     StatusHub                          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chemostat::adapters::config_file::JsonConfigFile;
use chemostat::adapters::console::ConsolePresenter;
use chemostat::adapters::hardware::GpioBench;
use chemostat::adapters::sim::SimBench;
use chemostat::app::commands::AppCommand;
use chemostat::app::ports::{ConfigPort, DeviceId, Hardware};
use chemostat::app::service::AppService;
use chemostat::app::timers::TimedSwitches;
use chemostat::config::ChemostatConfig;
use chemostat::drivers::sysfs_gpio::SysfsPin;
use chemostat::sensors::W1Thermometer;
use chemostat::status::StatusHub;

// ── Command line ──────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "chemostat", version, about = "Chemostat media-exchange controller")]
struct Cli {
    /// JSON configuration file; built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run against the simulated bench instead of the GPIO relay board.
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the controller loop.
    Run {
        /// Stop after this many ticks; runs until SIGINT or SIGTERM when omitted.
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Pump media out, then in, and exit.
    Dispense {
        /// Volume to pump in through the inlet (mL).
        #[arg(long, default_value_t = 0.0)]
        inlet: f32,
        /// Volume to pump out through the outlet (mL).
        #[arg(long, default_value_t = 0.0)]
        outlet: f32,
    },
    /// Switch the UV LED on for a number of seconds.
    UvLed {
        secs: f32,
    },
    /// Print the effective configuration as JSON.
    Config,
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; default to info.  `log` records from the library are
    // bridged into the subscriber.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    info!("Chemostat v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        command if cli.simulate => {
            let mut bench = SimBench::from_config(&config);
            dispatch(command, config, &mut bench)
        }
        command => {
            let mut bench = gpio_bench(&config)?;
            dispatch(command, config, &mut bench)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ChemostatConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        return Ok(ChemostatConfig::default());
    };
    JsonConfigFile::new(path)
        .load()
        .with_context(|| format!("loading config from {}", path.display()))
}

fn gpio_bench(config: &ChemostatConfig) -> Result<GpioBench<SysfsPin, SysfsPin>> {
    let p = &config.pins;
    let output = |pin: u32| {
        SysfsPin::output(pin).with_context(|| format!("exporting output GPIO {pin}"))
    };
    // DeviceId order.
    let relays = [
        output(p.inlet)?,
        output(p.outlet)?,
        output(p.air_pump)?,
        output(p.hotplate)?,
        output(p.uv_led)?,
    ];
    let level = SysfsPin::input(p.water_level)
        .with_context(|| format!("exporting input GPIO {}", p.water_level))?;
    let thermometer = W1Thermometer::new(config.thermometer_path.as_ref().map(PathBuf::from));
    GpioBench::new(
        relays,
        p.relays_active_low,
        level,
        p.water_level_active_low,
        thermometer,
    )
    .context("switching relays off")
}

fn dispatch<H: Hardware>(command: Command, config: ChemostatConfig, hw: &mut H) -> Result<()> {
    match command {
        Command::Run { ticks } => run_controller(config, hw, ticks),
        Command::Dispense { inlet, outlet } => {
            if outlet != 0.0 {
                let cmd = AppCommand::Dispense { device: DeviceId::Outlet, volume_ml: outlet };
                run_one_shot(cmd, hw, &config)?;
            }
            if inlet != 0.0 {
                let cmd = AppCommand::Dispense { device: DeviceId::Inlet, volume_ml: inlet };
                run_one_shot(cmd, hw, &config)?;
            }
            info!("Dispensed {:.1} mL out, {:.1} mL in", outlet, inlet);
            Ok(())
        }
        Command::UvLed { secs } => {
            let duration = Duration::try_from_secs_f32(secs)
                .context("run time must be a non-negative number of seconds")?;
            run_one_shot(AppCommand::RunFor { device: DeviceId::UvLed, duration }, hw, &config)
        }
        Command::Config => Ok(()),
    }
}

/// Apply `cmd` outside the controller loop and block until its timed run
/// has finished.
fn run_one_shot<H: Hardware>(cmd: AppCommand, hw: &mut H, config: &ChemostatConfig) -> Result<()> {
    let mut status = StatusHub::new(hw.now());
    let mut timers = TimedSwitches::new();
    cmd.apply(hw, &mut status, &mut timers, config)
        .with_context(|| format!("applying {cmd:?}"))?;
    while !timers.is_idle() {
        hw.sleep(config.poll_interval());
        timers.poll(hw, &mut status);
    }
    Ok(())
}

fn run_controller<H: Hardware>(config: ChemostatConfig, hw: &mut H, ticks: Option<u64>) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))
            .with_context(|| format!("registering handler for signal {signal}"))?;
    }

    let status = StatusHub::new(hw.now())
        .with_observer(Box::new(ConsolePresenter::new(config.display_refresh())));
    let mut app = AppService::start(config, status, hw);
    if app.is_error() {
        warn!("Controller started in ERROR; pumps stay locked out");
    }

    app.run(hw, ticks, &stop);
    info!("Final status:\n{}", serde_json::to_string_pretty(app.status())?);
    Ok(())
}
