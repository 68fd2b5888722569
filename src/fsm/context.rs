//! Shared mutable context threaded through every phase handler.
//!
//! `CycleContext` is the blackboard for one cycle: it borrows the bench and
//! the status hub for the cycle's duration, carries the cycle's on-time
//! bounds, and latches the first fault a handler reports.  Handlers never
//! touch the hardware except through the helpers here, so every device
//! transition and level reading reaches the status hub.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::error;

use crate::app::events::SensorEvent;
use crate::app::ports::{DeviceId, Hardware};
use crate::config::ChemostatConfig;
use crate::error::Fault;
use crate::fsm::Phase;
use crate::status::StatusHub;

/// The shared context passed to every phase handler.
pub struct CycleContext<'a, H> {
    pub hw: &'a mut H,
    pub status: &'a mut StatusHub,
    pub config: &'a ChemostatConfig,

    // -- Bounds --
    /// Volume this cycle exchanges (mL).
    pub target_volume_ml: f32,
    /// Drain and fill bound: `target_volume / outlet_flow`.
    pub target_ontime: Duration,
    /// Calibration bound: `target_volume / inlet_flow`.
    pub max_calib_time: Duration,

    // -- Timing --
    phase: Phase,
    /// Pump on-times when the cycle began.
    cycle_base: [Duration; DeviceId::COUNT],
    /// Pump on-times when the current phase began.
    phase_base: [Duration; DeviceId::COUNT],
    /// Wall time the current phase's pump was switched on.
    pump_started_at: Option<DateTime<Utc>>,

    // -- Faults --
    /// First fatal condition seen this cycle; the engine halts on it.
    pub fault: Option<Fault>,
}

impl<'a, H: Hardware> CycleContext<'a, H> {
    pub fn new(
        hw: &'a mut H,
        status: &'a mut StatusHub,
        config: &'a ChemostatConfig,
        target_volume_ml: f32,
    ) -> Self {
        let cycle_base = DeviceId::ALL.map(|d| hw.on_time(d));
        Self {
            target_volume_ml,
            target_ontime: Duration::from_secs_f32(target_volume_ml / config.outlet_flow_ml_per_s),
            max_calib_time: Duration::from_secs_f32(target_volume_ml / config.inlet_flow_ml_per_s),
            phase: Phase::Start,
            cycle_base,
            phase_base: cycle_base,
            pump_started_at: None,
            fault: None,
            hw,
            status,
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.hw.now()
    }

    /// Latch `fault` unless an earlier one is already pending.
    pub fn fail(&mut self, fault: Fault) {
        if self.fault.is_none() {
            error!("Cycle fault in phase {}: {}", self.phase, fault);
            self.fault = Some(fault);
        }
    }

    // ── Devices ───────────────────────────────────────────────

    /// Drive `device` to `on`, skipping the call if it is already there.
    /// Never switches anything on once a fault is latched.
    pub fn ensure(&mut self, device: DeviceId, on: bool) -> bool {
        if on && self.fault.is_some() {
            return false;
        }
        if self.hw.is_on(device) == on {
            return true;
        }
        match self.status.actuate(&mut *self.hw, device, on) {
            Ok(_) => true,
            Err(e) => {
                self.fail(Fault::ActuatorFailure(e));
                false
            }
        }
    }

    /// Switch a pump on and arm the stall guard for it.
    pub fn start_pump(&mut self, device: DeviceId) {
        if self.ensure(device, true) {
            self.pump_started_at = Some(self.hw.now());
        }
    }

    /// On-time `device` accumulated in the current phase.
    pub fn phase_run(&self, device: DeviceId) -> Duration {
        self.hw
            .on_time(device)
            .saturating_sub(self.phase_base[device.index()])
    }

    /// Latch a stall fault when `device` has been switched on for longer
    /// than `bound` plus the configured grace in wall time.
    pub fn check_stall(&mut self, device: DeviceId, bound: Duration) -> bool {
        let Some(started) = self.pump_started_at else {
            return false;
        };
        let wall = (self.hw.now() - started).to_std().unwrap_or_default();
        if wall > bound + self.config.stall_grace() {
            self.ensure(device, false);
            self.fail(Fault::PumpStalled { device });
            return true;
        }
        false
    }

    /// Switch every pump off.  Used on the fault path, so failures are
    /// logged rather than latched.
    pub fn halt_pumps(&mut self) {
        for device in DeviceId::PUMPS {
            if self.hw.is_on(device) {
                if let Err(e) = self.status.actuate(&mut *self.hw, device, false) {
                    error!("Failed to stop {} while halting: {}", device, e);
                }
            }
        }
    }

    // ── Sensors ───────────────────────────────────────────────

    /// Read the level sensor and report it.  `None` (with a latched
    /// fault) when the sensor cannot be read.
    pub fn water_level(&mut self) -> Option<bool> {
        match self.hw.water_level_exceeded() {
            Ok(exceeded) => {
                self.status.notify(SensorEvent::WaterLevel(exceeded));
                Some(exceeded)
            }
            Err(e) => {
                self.fail(Fault::WaterLevelUnavailable(e));
                None
            }
        }
    }

    // ── Timing ────────────────────────────────────────────────

    /// Deliberate wait, e.g. for the surface to settle.
    pub fn pause(&mut self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        self.hw.sleep(duration);
        self.status.touch(self.hw.now());
    }

    /// One poll interval.
    pub fn poll_sleep(&mut self) {
        self.hw.sleep(self.config.poll_interval());
    }

    /// Copy the pump on-times accumulated this cycle onto the record.
    pub fn sync_record(&mut self) {
        let inlet = self.cycle_run(DeviceId::Inlet).as_secs_f32();
        let outlet = self.cycle_run(DeviceId::Outlet).as_secs_f32();
        self.status.touch(self.hw.now());
        self.status.update_cycle_ontimes(inlet, outlet);
    }

    fn cycle_run(&self, device: DeviceId) -> Duration {
        self.hw
            .on_time(device)
            .saturating_sub(self.cycle_base[device.index()])
    }

    /// Called by the engine on every transition.
    pub(crate) fn on_phase_change(&mut self, phase: Phase) {
        self.phase = phase;
        self.phase_base = DeviceId::ALL.map(|d| self.hw.on_time(d));
        self.pump_started_at = None;
        self.status.set_cycle_phase(phase);
    }
}
