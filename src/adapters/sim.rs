//! Deterministic simulated bench.
//!
//! Implements every port over a virtual clock: `sleep` advances time
//! instead of blocking, pump on-times accumulate exactly, and a simple
//! vessel model turns pump runs into a liquid volume that the simulated
//! level sensor compares against its mounting height.  Used by
//! `--simulate` and by the whole test suite.
//!
//! Fault injection hooks let tests reproduce the field failures the cycle
//! engine guards against: a stuck level sensor, a dead pump, a relay that
//! refuses to switch, a missing thermometer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::warn;

use crate::app::events::DeviceEvent;
use crate::app::ports::{Clock, DeviceId, DevicePort, SensorPort};
use crate::config::ChemostatConfig;
use crate::error::{ActuatorError, SensorError};

/// 2024-01-01T00:00:00Z: fixed so simulated runs are reproducible.
const SIM_EPOCH_SECS: i64 = 1_704_067_200;

const AMBIENT_C: f64 = 22.0;
/// Hotplate heating rate (°C/s).
const HEAT_RATE_C_PER_S: f64 = 0.01;
/// Newtonian cooling constant (1/s).
const COOLING_PER_S: f64 = 1.0 / 3600.0;

// ---------------------------------------------------------------------------
// Vessel model
// ---------------------------------------------------------------------------

/// Liquid volume, the level sensor's mounting height and the capacity, all
/// in mL.
#[derive(Debug, Clone, Copy)]
pub struct SimVessel {
    volume_ml: f64,
    sensor_threshold_ml: f64,
    capacity_ml: f64,
}

impl SimVessel {
    pub fn new(volume_ml: f32, sensor_threshold_ml: f32, capacity_ml: f32) -> Self {
        Self {
            volume_ml: f64::from(volume_ml),
            sensor_threshold_ml: f64::from(sensor_threshold_ml),
            capacity_ml: f64::from(capacity_ml),
        }
    }

    /// A vessel matching `config`: filled to the sensor when the reactor
    /// volume is known, empty otherwise.
    pub fn from_config(config: &ChemostatConfig) -> Self {
        let threshold = config
            .reactor_volume_ml
            .unwrap_or(config.max_vessel_volume_ml * 0.66);
        let volume = config.reactor_volume_ml.unwrap_or(0.0);
        Self::new(volume, threshold, config.max_vessel_volume_ml)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SimDevice {
    on: bool,
    on_time: Duration,
}

// ---------------------------------------------------------------------------
// Bench
// ---------------------------------------------------------------------------

/// The simulated bench.
pub struct SimBench {
    now: DateTime<Utc>,
    vessel: SimVessel,
    devices: [SimDevice; DeviceId::COUNT],
    /// Physical pump rates (mL/s); may differ from the calibrated config.
    inlet_flow_ml_per_s: f64,
    outlet_flow_ml_per_s: f64,
    temperature_c: f64,
    overflowed: bool,

    // -- Fault injection --
    stuck_level: Option<bool>,
    /// Reads left that report wet regardless of the volume.
    wet_glitch_reads: u32,
    level_read_fails: bool,
    thermometer_present: bool,
    frozen: Option<DeviceId>,
    refusing: Option<DeviceId>,
}

impl SimBench {
    pub fn new(vessel: SimVessel) -> Self {
        Self {
            now: DateTime::from_timestamp(SIM_EPOCH_SECS, 0).unwrap_or_default(),
            vessel,
            devices: [SimDevice::default(); DeviceId::COUNT],
            inlet_flow_ml_per_s: 1.0,
            outlet_flow_ml_per_s: 1.0,
            temperature_c: AMBIENT_C,
            overflowed: false,
            stuck_level: None,
            wet_glitch_reads: 0,
            level_read_fails: false,
            thermometer_present: true,
            frozen: None,
            refusing: None,
        }
    }

    /// A bench whose pumps run exactly at the calibrated rates.
    pub fn from_config(config: &ChemostatConfig) -> Self {
        Self::new(SimVessel::from_config(config))
            .with_flows(config.inlet_flow_ml_per_s, config.outlet_flow_ml_per_s)
    }

    pub fn with_flows(mut self, inlet_ml_per_s: f32, outlet_ml_per_s: f32) -> Self {
        self.inlet_flow_ml_per_s = f64::from(inlet_ml_per_s);
        self.outlet_flow_ml_per_s = f64::from(outlet_ml_per_s);
        self
    }

    pub fn with_temperature(mut self, celsius: f32) -> Self {
        self.temperature_c = f64::from(celsius);
        self
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn volume_ml(&self) -> f32 {
        self.vessel.volume_ml as f32
    }

    pub fn temperature(&self) -> f32 {
        self.temperature_c as f32
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    // ── Fault injection ───────────────────────────────────────

    /// Pin the level sensor to a value (`None` restores the model).
    pub fn stick_water_level(&mut self, level: Option<bool>) {
        self.stuck_level = level;
    }

    /// The next `reads` level reads report wet, then the model resumes.
    pub fn glitch_water_level(&mut self, reads: u32) {
        self.wet_glitch_reads = reads;
    }

    /// Make level sensor reads fail.
    pub fn fail_water_level_reads(&mut self, fail: bool) {
        self.level_read_fails = fail;
    }

    pub fn set_thermometer_present(&mut self, present: bool) {
        self.thermometer_present = present;
    }

    pub fn set_temperature(&mut self, celsius: f32) {
        self.temperature_c = f64::from(celsius);
    }

    /// `device` still reports "on" but neither moves liquid nor
    /// accumulates on-time, like a pump whose motor has seized.
    pub fn freeze_on_time(&mut self, device: DeviceId) {
        self.frozen = Some(device);
    }

    /// Switching `device` fails as if its GPIO write errored.
    pub fn refuse_switching(&mut self, device: Option<DeviceId>) {
        self.refusing = device;
    }

    // ── Model ─────────────────────────────────────────────────

    fn running(&self, device: DeviceId) -> bool {
        self.devices[device.index()].on && self.frozen != Some(device)
    }

    fn advance(&mut self, dt: Duration) {
        let secs = dt.as_secs_f64();

        for device in DeviceId::ALL {
            if self.running(device) {
                self.devices[device.index()].on_time += dt;
            }
        }

        let mut flow = 0.0;
        if self.running(DeviceId::Inlet) {
            flow += self.inlet_flow_ml_per_s;
        }
        if self.running(DeviceId::Outlet) {
            flow -= self.outlet_flow_ml_per_s;
        }
        let volume = self.vessel.volume_ml + flow * secs;
        if volume > self.vessel.capacity_ml && !self.overflowed {
            warn!("SIM: vessel overflowing at {:.1} mL", volume);
            self.overflowed = true;
        }
        self.vessel.volume_ml = volume.clamp(0.0, self.vessel.capacity_ml);

        if self.running(DeviceId::Hotplate) {
            self.temperature_c += HEAT_RATE_C_PER_S * secs;
        } else {
            let decay = 1.0 - (-COOLING_PER_S * secs).exp();
            self.temperature_c += (AMBIENT_C - self.temperature_c) * decay;
        }

        self.now += TimeDelta::from_std(dt).unwrap_or(TimeDelta::MAX);
    }
}

// ── Port implementations ──────────────────────────────────────

impl DevicePort for SimBench {
    fn switch(&mut self, device: DeviceId, on: bool) -> Result<DeviceEvent, ActuatorError> {
        if self.refusing == Some(device) {
            return Err(ActuatorError::GpioWriteFailed(device));
        }
        let slot = &mut self.devices[device.index()];
        slot.on = on;
        Ok(DeviceEvent {
            device,
            on,
            on_time: slot.on_time,
        })
    }

    fn is_on(&self, device: DeviceId) -> bool {
        self.devices[device.index()].on
    }

    fn on_time(&self, device: DeviceId) -> Duration {
        self.devices[device.index()].on_time
    }
}

impl SensorPort for SimBench {
    fn water_level_exceeded(&mut self) -> Result<bool, SensorError> {
        if self.level_read_fails {
            return Err(SensorError::GpioReadFailed);
        }
        if self.wet_glitch_reads > 0 {
            self.wet_glitch_reads -= 1;
            return Ok(true);
        }
        Ok(self
            .stuck_level
            .unwrap_or(self.vessel.volume_ml >= self.vessel.sensor_threshold_ml))
    }

    fn temperature_c(&mut self) -> Result<f32, SensorError> {
        if !self.thermometer_present {
            return Err(SensorError::NotPresent);
        }
        Ok(self.temperature_c as f32)
    }
}

impl Clock for SimBench {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }
}
