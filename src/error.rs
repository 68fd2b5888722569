//! Unified error types for the chemostat controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! driver loop's error handling uniform.  Device and sensor errors are
//! `Copy`; [`Fault`] carries the context a fatal condition is reported with
//! and is what the status aggregator turns into its error description.

use core::fmt;

use chrono::{DateTime, Utc};

use crate::app::ports::DeviceId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A fatal media-exchange condition.
    Fault(Fault),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// A command was rejected in the current system mode.
    Refused(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Fault(e) => write!(f, "fault: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Refused(msg) => write!(f, "refused: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// GPIO read returned an error.
    GpioReadFailed,
    /// The sensor is not wired up / not configured.
    NotPresent,
    /// The 1-Wire bus reported a CRC mismatch or an unparsable frame.
    Malformed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::NotPresent => write!(f, "sensor not present"),
            Self::Malformed => write!(f, "malformed reading"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed(DeviceId),
    /// A timed run is already pending for this device.
    AlreadyTimed(DeviceId),
    /// The timed auto-off queue is full.
    TimerQueueFull,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed(d) => write!(f, "GPIO write failed on {d}"),
            Self::AlreadyTimed(d) => write!(f, "{d} already has a timed run pending"),
            Self::TimerQueueFull => write!(f, "timed auto-off queue full"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Fatal media-exchange faults
// ---------------------------------------------------------------------------

/// Fatal conditions.  Any of these forces the status aggregator into its
/// absorbing error mode; the description shown to the operator is the
/// `Display` rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Two consecutive due times elapsed without a cycle being attempted.
    MissedDeadline { due: DateTime<Utc> },
    /// Water level still above the sensor after a full drain.
    PostDrainLevel,
    /// The startup fill reached its ceiling without the sensor triggering.
    /// `pre_triggered` records that the sensor was already wet before
    /// the inlet pump started.
    FillCeilingExceeded { ceiling_secs: f32, pre_triggered: bool },
    /// The calibration pass ran to its bound without the sensor triggering.
    CalibrationFailed { max_calib_secs: f32 },
    /// Vessel temperature above the shutdown threshold.
    Overheat { temp_c: f32, shutdown_c: f32 },
    /// A pump phase ran past its wall-clock guard.
    PumpStalled { device: DeviceId },
    /// A device could not be switched during a cycle.
    ActuatorFailure(ActuatorError),
    /// The water-level sensor could not be read during a cycle.
    WaterLevelUnavailable(SensorError),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissedDeadline { due } => {
                write!(f, "Missed cycle due at {}", due.format("%H:%M:%S"))
            }
            Self::PostDrainLevel => write!(
                f,
                "Water level exceeded after drain. Drain failed or level sensor stuck"
            ),
            Self::FillCeilingExceeded {
                ceiling_secs,
                pre_triggered,
            } => {
                write!(
                    f,
                    "Fill ceiling of {ceiling_secs:.0}s reached without level sensor trigger"
                )?;
                if *pre_triggered {
                    write!(f, " (sensor was already wet before fill)")?;
                }
                Ok(())
            }
            Self::CalibrationFailed { max_calib_secs } => write!(
                f,
                "Calibration failed after {max_calib_secs:.0}s. Water level sensor may be failing"
            ),
            Self::Overheat { temp_c, shutdown_c } => write!(
                f,
                "System overheated: {temp_c:.1}C above shutdown {shutdown_c:.1}C"
            ),
            Self::PumpStalled { device } => write!(f, "{device} stalled past its run bound"),
            Self::ActuatorFailure(e) => write!(f, "Actuator failure: {e}"),
            Self::WaterLevelUnavailable(e) => write!(f, "Water level sensor unreadable: {e}"),
        }
    }
}

impl std::error::Error for Fault {}

impl From<Fault> for Error {
    fn from(e: Fault) -> Self {
        Self::Fault(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
