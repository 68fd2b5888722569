//! Controller configuration parameters
//!
//! All tunable parameters for the chemostat bench.
//! Values can be overridden from a JSON file passed with `--config`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Core controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChemostatConfig {
    // --- Vessel ---
    /// Working volume of the reactor (mL).  `None` means the vessel starts
    /// empty and is filled to the level sensor at startup.
    pub reactor_volume_ml: Option<f32>,
    /// Physical capacity of the vessel (mL); bounds the startup fill.
    pub max_vessel_volume_ml: f32,

    // --- Exchange rate ---
    /// Reactor volumes exchanged per hour (dilution rate).
    pub volumes_per_hour: f32,
    /// Exchange cycles per hour.
    pub cycles_per_hour: f32,

    // --- Pumps ---
    /// Calibrated inlet pump flow (mL/s)
    pub inlet_flow_ml_per_s: f32,
    /// Calibrated outlet pump flow (mL/s)
    pub outlet_flow_ml_per_s: f32,

    // --- Cycle timing ---
    /// Wait for the liquid surface to still before draining.
    pub settle_enabled: bool,
    /// Settle wait (seconds)
    pub settle_secs: u32,
    /// Pause between pump phases (seconds)
    pub phase_pause_secs: u32,
    /// Delay the first cycle by one interval plus `first_cycle_delay_secs`.
    pub delay_first_cycle: bool,
    /// Extra delay before the first cycle (seconds)
    pub first_cycle_delay_secs: u32,
    /// Grace added to every pump bound before the stall guard trips (seconds)
    pub stall_grace_secs: u32,

    // --- Loop timing ---
    /// Sub-tick poll interval inside a cycle (milliseconds)
    pub poll_interval_ms: u32,
    /// Driver loop interval (milliseconds)
    pub tick_interval_ms: u32,

    // --- Thermal ---
    /// Regulate temperature with the hotplate; when off it only stirs.
    pub heating_enabled: bool,
    /// Temperature setpoint (°C)
    pub target_temp_c: f32,
    /// Temperature above which the controller shuts down (°C)
    pub shutdown_temp_c: f32,

    // --- Aeration ---
    /// Bubbler duty-cycle period (seconds)
    pub aeration_period_secs: u32,
    /// Bubbler on-share of the period (0-100%)
    pub aeration_percent_on: u8,

    // --- Misc ---
    /// Switch the UV LED on at startup.
    pub uv_led_on: bool,
    /// Minimum time between presenter refreshes (milliseconds)
    pub display_refresh_ms: u32,

    // --- Wiring ---
    pub pins: PinMap,
    /// 1-Wire thermometer `w1_slave` file; `None` disables the sensor.
    pub thermometer_path: Option<String>,
}

/// BCM pin assignments and relay polarity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub inlet: u32,
    pub outlet: u32,
    pub air_pump: u32,
    pub hotplate: u32,
    pub uv_led: u32,
    pub water_level: u32,
    /// Relay boards that energise on a LOW output.
    pub relays_active_low: bool,
    /// Level sensors that pull LOW when wet.
    pub water_level_active_low: bool,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            inlet: pins::MEDIA_IN_GPIO,
            outlet: pins::MEDIA_OUT_GPIO,
            air_pump: pins::AIR_PUMP_GPIO,
            hotplate: pins::HOTPLATE_GPIO,
            uv_led: pins::UV_LED_GPIO,
            water_level: pins::WATER_LEVEL_GPIO,
            relays_active_low: false,
            water_level_active_low: false,
        }
    }
}

impl Default for ChemostatConfig {
    fn default() -> Self {
        Self {
            // Vessel
            reactor_volume_ml: Some(1000.0),
            max_vessel_volume_ml: 1500.0,

            // Exchange rate: half a vessel per hour over four cycles
            volumes_per_hour: 0.5,
            cycles_per_hour: 4.0,

            // Pumps
            inlet_flow_ml_per_s: 1.0,
            outlet_flow_ml_per_s: 1.0,

            // Cycle timing
            settle_enabled: true,
            settle_secs: 30,
            phase_pause_secs: 5,
            delay_first_cycle: false,
            first_cycle_delay_secs: 600,
            stall_grace_secs: 30,

            // Loop timing
            poll_interval_ms: 100,
            tick_interval_ms: 1000,

            // Thermal
            heating_enabled: true,
            target_temp_c: 37.0,
            shutdown_temp_c: 45.0,

            // Aeration
            aeration_period_secs: 600,
            aeration_percent_on: 50,

            // Misc
            uv_led_on: false,
            display_refresh_ms: 500,

            pins: PinMap::default(),
            thermometer_path: None,
        }
    }
}

/// Slowest accepted cycle rate: one cycle a day.
pub const MIN_CYCLES_PER_HOUR: f32 = 1.0 / 24.0;

impl ChemostatConfig {
    /// Seconds between cycle due times.  Saturates for rates that were
    /// never validated.
    pub fn time_between_cycles(&self) -> Duration {
        Duration::try_from_secs_f32(3600.0 / self.cycles_per_hour).unwrap_or(Duration::MAX)
    }

    /// Volume exchanged per cycle for a vessel of `reactor_volume_ml`.
    pub fn volume_per_cycle(&self, reactor_volume_ml: f32) -> f32 {
        reactor_volume_ml * self.volumes_per_hour / self.cycles_per_hour
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_interval_ms))
    }

    pub fn phase_pause(&self) -> Duration {
        Duration::from_secs(u64::from(self.phase_pause_secs))
    }

    pub fn display_refresh(&self) -> Duration {
        Duration::from_millis(u64::from(self.display_refresh_ms))
    }

    pub fn stall_grace(&self) -> Duration {
        Duration::from_secs(u64::from(self.stall_grace_secs))
    }

    /// Range-check every field.  Rejects, never clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;

        if !positive(self.inlet_flow_ml_per_s) || !positive(self.outlet_flow_ml_per_s) {
            return Err(ConfigError::ValidationFailed("pump flow rates must be > 0"));
        }
        if !positive(self.cycles_per_hour) {
            return Err(ConfigError::ValidationFailed("cycles_per_hour must be > 0"));
        }
        if self.cycles_per_hour < MIN_CYCLES_PER_HOUR {
            return Err(ConfigError::ValidationFailed(
                "cycles_per_hour must allow at least one cycle a day",
            ));
        }
        if !positive(self.volumes_per_hour) {
            return Err(ConfigError::ValidationFailed("volumes_per_hour must be > 0"));
        }
        if !positive(self.max_vessel_volume_ml) {
            return Err(ConfigError::ValidationFailed("max_vessel_volume_ml must be > 0"));
        }
        if let Some(v) = self.reactor_volume_ml {
            if !positive(v) || v > self.max_vessel_volume_ml {
                return Err(ConfigError::ValidationFailed(
                    "reactor_volume_ml must be > 0 and within the vessel capacity",
                ));
            }
        }
        if self.volumes_per_hour > self.cycles_per_hour {
            return Err(ConfigError::ValidationFailed(
                "volume per cycle exceeds the reactor volume",
            ));
        }
        if self.target_temp_c >= self.shutdown_temp_c {
            return Err(ConfigError::ValidationFailed(
                "target_temp_c must be below shutdown_temp_c",
            ));
        }
        if self.aeration_percent_on > 100 {
            return Err(ConfigError::ValidationFailed("aeration_percent_on must be 0-100"));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms >= self.tick_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be > 0 and shorter than tick_interval_ms",
            ));
        }
        Ok(())
    }
}
