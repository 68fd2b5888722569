//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the status aggregator, the media-exchange scheduler
//! and the peer controllers.  It exposes a clean, hardware-agnostic API.
//! All I/O flows through port traits injected at call sites, making the
//! entire service testable against the simulated bench.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ StatusObserver
//!                 │          AppService          │
//!  DevicePort ◀── │ Scheduler · Thermal · Aerate │
//!                 │ Timed auto-off · StatusHub   │
//!                 └──────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::config::ChemostatConfig;
use crate::control::{AerationRegulator, ThermalRegulator};
use crate::error::Result;
use crate::scheduler::{CycleReport, MediaExchange};
use crate::status::{StatusHub, SystemStatus};

use super::commands::AppCommand;
use super::events::SensorEvent;
use super::ports::{DeviceId, Hardware};
use super::timers::TimedSwitches;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    status: StatusHub,
    media: MediaExchange,
    thermal: ThermalRegulator,
    aeration: AerationRegulator,
    timers: TimedSwitches,
    tick_count: u64,
}

impl AppService {
    /// Bring the controller up: UV LED, reactor volume (filling the vessel
    /// if it is unknown), first due time, aeration.
    pub fn start<H: Hardware>(config: ChemostatConfig, mut status: StatusHub, hw: &mut H) -> Self {
        status.touch(hw.now());
        read_sensors(hw, &mut status);

        if config.uv_led_on {
            if let Err(e) = status.actuate(hw, DeviceId::UvLed, true) {
                error!("Failed to switch UV LED on: {}", e);
            }
        }

        let thermal = ThermalRegulator::new(&config);
        let mut aeration = AerationRegulator::new(&config, hw.now());
        let media = MediaExchange::start(config, hw, &mut status);

        if !status.is_error() {
            if let Err(e) = aeration.start(hw, &mut status) {
                error!("Failed to start aeration: {}", e);
            }
        }

        info!("AppService started in {}", status.mode().name());
        Self {
            status,
            media,
            thermal,
            aeration,
            timers: TimedSwitches::new(),
            tick_count: 0,
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One driver-loop tick: sensors → scheduler → thermostat → aeration →
    /// timed auto-off.  Returns the report of a cycle run this tick.
    pub fn tick<H: Hardware>(&mut self, hw: &mut H) -> Option<CycleReport> {
        self.tick_count += 1;

        read_sensors(hw, &mut self.status);

        if self.media.is_due(hw.now()) {
            for pump in [DeviceId::Inlet, DeviceId::Outlet] {
                if self.timers.cancel(hw, &mut self.status, pump) {
                    warn!("Cycle due, cancelled manual {} run", pump);
                }
            }
        }
        let report = self.media.check(hw, &mut self.status);
        if let Some(r) = &report {
            info!(
                "Cycle finished in {}: {:.1} mL in, {:.1} mL out (target {:.1})",
                r.final_phase, r.in_volume_ml, r.out_volume_ml, r.target_volume_ml
            );
        }

        if let Err(e) = self.thermal.regulate(hw, &mut self.status) {
            error!("Thermostat: {}", e);
        }
        if let Err(e) = self.aeration.regulate(hw, &mut self.status) {
            error!("Aeration: {}", e);
        }
        self.timers.poll(hw, &mut self.status);

        report
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an operator command.
    pub fn handle_command<H: Hardware>(&mut self, cmd: AppCommand, hw: &mut H) -> Result<()> {
        cmd.apply(hw, &mut self.status, &mut self.timers, self.media.config())
    }

    // ── Driver loop ───────────────────────────────────────────

    /// Tick until `stop` is raised or `max_ticks` have run, sleeping one
    /// tick interval between ticks, then switch everything off.
    pub fn run<H: Hardware>(&mut self, hw: &mut H, max_ticks: Option<u64>, stop: &AtomicBool) {
        let tick = self.media.config().tick_interval();
        while !stop.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| self.tick_count < max) {
            self.tick(hw);
            hw.sleep(tick);
        }
        if stop.load(Ordering::Relaxed) {
            info!("Stop requested after {} ticks", self.tick_count);
        }
        self.shutdown(hw);
    }

    /// Switch everything off before exit.
    pub fn shutdown<H: Hardware>(&mut self, hw: &mut H) {
        self.timers.cancel_all(hw, &mut self.status);
        for device in DeviceId::ALL {
            if hw.is_on(device) {
                if let Err(e) = self.status.actuate(hw, device, false) {
                    error!("Failed to switch {} off at shutdown: {}", device, e);
                }
            }
        }
        info!("AppService stopped after {} ticks", self.tick_count);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> &SystemStatus {
        self.status.status()
    }

    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    pub fn media(&self) -> &MediaExchange {
        &self.media
    }

    pub fn timers(&self) -> &TimedSwitches {
        &self.timers
    }

    /// Total driver-loop ticks since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

/// Poll both sensors into the aggregator.  A failed level read outside a
/// cycle is only a warning: the cycle engine re-reads and faults on it.
fn read_sensors<H: Hardware>(hw: &mut H, status: &mut StatusHub) {
    status.notify(SensorEvent::Temperature(hw.temperature_c().ok()));
    match hw.water_level_exceeded() {
        Ok(exceeded) => status.notify(SensorEvent::WaterLevel(exceeded)),
        Err(e) => warn!("Water level read failed: {}", e),
    }
}
