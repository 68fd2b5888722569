//! Port traits: the hexagonal boundary between domain logic and the bench.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MediaExchange / AppService (domain)
//! ```
//!
//! Driven adapters (relays, the level sensor, the thermometer, the clock,
//! presenters, config storage) implement these traits.  The domain consumes
//! them via generics, so the cycle engine never touches hardware directly
//! and runs unchanged against the deterministic simulator.

use core::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::events::DeviceEvent;
use crate::config::ChemostatConfig;
use crate::error::{ActuatorError, SensorError};
use crate::status::SystemStatus;

// ───────────────────────────────────────────────────────────────
// Device identity
// ───────────────────────────────────────────────────────────────

/// Every switchable device on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum DeviceId {
    /// Fresh-media inlet pump.
    Inlet = 0,
    /// Spent-media outlet pump.
    Outlet = 1,
    /// Aeration / bubbler pump.
    AirPump = 2,
    /// Stirring hotplate (stirring and heating share one relay).
    Hotplate = 3,
    /// UV sterilisation LED.
    UvLed = 4,
}

impl DeviceId {
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Inlet,
        Self::Outlet,
        Self::AirPump,
        Self::Hotplate,
        Self::UvLed,
    ];

    /// Pumps that move liquid or air; all of them stop on a cycle fault.
    pub const PUMPS: [Self; 3] = [Self::Inlet, Self::Outlet, Self::AirPump];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inlet => "inlet pump",
            Self::Outlet => "outlet pump",
            Self::AirPump => "air pump",
            Self::Hotplate => "hotplate",
            Self::UvLed => "UV LED",
        };
        f.write_str(name)
    }
}

// ───────────────────────────────────────────────────────────────
// Device port (driven adapter: domain → relays)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to switch devices.
///
/// Calls are synchronous: when `switch` returns, the relay has moved.
pub trait DevicePort {
    /// Switch `device` on or off, returning the resulting transition.
    fn switch(&mut self, device: DeviceId, on: bool) -> Result<DeviceEvent, ActuatorError>;

    /// Whether `device` is currently energised.
    fn is_on(&self, device: DeviceId) -> bool;

    /// Cumulative time `device` has been energised since startup,
    /// including the current run.
    fn on_time(&self, device: DeviceId) -> Duration;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: bench → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain sensor data.
pub trait SensorPort {
    /// `true` when liquid is at or above the level sensor.
    fn water_level_exceeded(&mut self) -> Result<bool, SensorError>;

    /// Vessel temperature in °C.
    fn temperature_c(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall clock plus the only suspension point the driver loop has.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the caller.  The simulator advances virtual time instead.
    fn sleep(&mut self, duration: Duration);
}

/// Everything the cycle engine needs from the bench.
///
/// Blanket-implemented, so one value satisfies all three ports and the
/// engine never holds two mutable borrows of the hardware.
pub trait Hardware: DevicePort + SensorPort + Clock {}

impl<T: DevicePort + SensorPort + Clock> Hardware for T {}

// ───────────────────────────────────────────────────────────────
// Status observer port (domain → presenters)
// ───────────────────────────────────────────────────────────────

/// Presenters subscribe to the status aggregator through this port.
/// Called after every mutation with the full, read-only status.
pub trait StatusObserver {
    fn notify(&mut self, status: &SystemStatus);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration.
///
/// Implementations MUST validate before persisting and after loading.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// never silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    fn load(&self) -> Result<ChemostatConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ChemostatConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config file at the given location.
    NotFound,
    /// Stored config failed deserialisation.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
