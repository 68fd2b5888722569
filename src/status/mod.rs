//! System status aggregator.
//!
//! [`StatusHub`] is the single process-wide record of what the bench is
//! doing: system mode, temperature extrema, cumulative media volumes, the
//! active cycle and the next due time.  Devices and sensors report into it
//! through [`StatusEvent`]s; after every mutation it re-broadcasts the whole
//! [`SystemStatus`] to every registered [`StatusObserver`].
//!
//! ## Mode lifecycle
//!
//! ```text
//!   STANDBY ◀──begin/end_cycle──▶ MEDIA_EXCHANGE
//!      │                                │
//!      └──────────set_error─────────────┴──▶ ERROR (absorbing)
//! ```
//!
//! ERROR is absorbing: the first fault wins, later `set_error` calls and
//! attempts to begin or end a cycle are logged and ignored.  Clearing it
//! takes a restart.

pub mod cycle;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;

use crate::app::events::{DeviceEvent, SensorEvent, StatusEvent};
use crate::app::ports::{DeviceId, DevicePort, StatusObserver};
use crate::error::{ActuatorError, Fault};
use crate::fsm::Phase;

pub use cycle::CycleRecord;

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

/// What the controller is doing.  Error details only exist in `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SystemMode {
    Standby,
    MediaExchange,
    Error {
        description: String,
        at: DateTime<Utc>,
    },
}

impl SystemMode {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standby => "standby",
            Self::MediaExchange => "media exchange",
            Self::Error { .. } => "error",
        }
    }
}

/// Running temperature statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TemperatureStats {
    pub last_c: Option<f32>,
    pub min_c: Option<f32>,
    pub max_c: Option<f32>,
    /// Whether the latest read succeeded.
    pub sensor_ok: bool,
}

impl TemperatureStats {
    fn record(&mut self, reading: Option<f32>) {
        self.sensor_ok = reading.is_some();
        let Some(t) = reading else { return };
        self.last_c = Some(t);
        self.min_c = Some(self.min_c.map_or(t, |m| m.min(t)));
        self.max_c = Some(self.max_c.map_or(t, |m| m.max(t)));
    }
}

/// Read-only snapshot handed to observers.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub mode: SystemMode,
    pub next_cycle_time: Option<DateTime<Utc>>,
    /// Cumulative media pumped in / out since startup (mL).
    pub media_in_ml: f32,
    pub media_out_ml: f32,
    pub temperature: TemperatureStats,
    pub water_level_exceeded: bool,
    pub active_devices: heapless::Vec<DeviceId, { DeviceId::COUNT }>,
    /// The exchange in progress, `Inactive` between cycles.
    pub cycle: CycleRecord,
    pub started_at: DateTime<Utc>,
    /// Clock time of the latest update.
    pub as_of: DateTime<Utc>,
    /// Double (de)activations seen so far.
    pub device_warnings: u32,
}

impl SystemStatus {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            mode: SystemMode::Standby,
            next_cycle_time: None,
            media_in_ml: 0.0,
            media_out_ml: 0.0,
            temperature: TemperatureStats::default(),
            water_level_exceeded: false,
            active_devices: heapless::Vec::new(),
            cycle: CycleRecord::inactive(),
            started_at,
            as_of: started_at,
            device_warnings: 0,
        }
    }

    pub fn is_active(&self, device: DeviceId) -> bool {
        self.active_devices.contains(&device)
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// The status aggregator.  One per process, created at startup.
pub struct StatusHub {
    status: SystemStatus,
    observers: Vec<Box<dyn StatusObserver>>,
}

impl StatusHub {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            status: SystemStatus::new(started_at),
            observers: Vec::new(),
        }
    }

    /// Register a presenter.
    pub fn with_observer(mut self, observer: Box<dyn StatusObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn status(&self) -> &SystemStatus {
        &self.status
    }

    pub fn mode(&self) -> &SystemMode {
        &self.status.mode
    }

    pub fn is_error(&self) -> bool {
        self.status.mode.is_error()
    }

    // ── Notifications ─────────────────────────────────────────

    /// Fold a device transition or sensor reading into the status.
    pub fn notify(&mut self, event: impl Into<StatusEvent>) {
        match event.into() {
            StatusEvent::Device(e) => self.apply_device(e),
            StatusEvent::Sensor(SensorEvent::Temperature(t)) => {
                if self.status.temperature.sensor_ok && t.is_none() {
                    warn!("Temperature sensor unavailable, hotplate falls back to safe mode");
                }
                self.status.temperature.record(t);
            }
            StatusEvent::Sensor(SensorEvent::WaterLevel(exceeded)) => {
                self.status.water_level_exceeded = exceeded;
            }
        }
        self.publish();
    }

    /// Switch `device` through the port and report the transition here,
    /// so nothing can move a relay without the aggregator seeing it.
    pub fn actuate<D: DevicePort + ?Sized>(
        &mut self,
        hw: &mut D,
        device: DeviceId,
        on: bool,
    ) -> Result<DeviceEvent, ActuatorError> {
        let event = hw.switch(device, on)?;
        self.notify(event);
        Ok(event)
    }

    fn apply_device(&mut self, e: DeviceEvent) {
        let active = &mut self.status.active_devices;
        if e.on {
            if active.contains(&e.device) {
                warn!("Device {} double activated", e.device);
                self.status.device_warnings += 1;
            } else if active.push(e.device).is_err() {
                warn!("Active device list full, dropping {}", e.device);
            }
        } else if active.contains(&e.device) {
            active.retain(|d| *d != e.device);
        } else {
            warn!("Device {} double de-activated", e.device);
            self.status.device_warnings += 1;
        }
    }

    // ── Mode transitions ──────────────────────────────────────

    /// Enter the absorbing error mode.  Returns `false` (and changes
    /// nothing) when already in error.
    pub fn set_error(&mut self, description: impl Into<String>, at: DateTime<Utc>) -> bool {
        let description = description.into();
        if let SystemMode::Error {
            description: first, ..
        } = &self.status.mode
        {
            warn!(
                "Illegal error transition while already in ERROR: '{}' (keeping '{}')",
                description, first
            );
            return false;
        }
        error!("SYSTEM ERROR at {}: {}", at.format("%Y-%m-%d %H:%M:%S"), description);
        self.status.mode = SystemMode::Error { description, at };
        self.status.as_of = self.status.as_of.max(at);
        self.publish();
        true
    }

    /// [`set_error`](Self::set_error) with a typed fault.
    pub fn raise(&mut self, fault: Fault, at: DateTime<Utc>) -> bool {
        self.set_error(fault.to_string(), at)
    }

    /// STANDBY → MEDIA_EXCHANGE.  No-op in ERROR.
    pub fn begin_cycle(&mut self) {
        match self.status.mode {
            SystemMode::Error { .. } => {
                warn!("Illegal begin_cycle while in ERROR, ignored");
                return;
            }
            SystemMode::MediaExchange => warn!("begin_cycle while a cycle is already running"),
            SystemMode::Standby => {}
        }
        self.status.mode = SystemMode::MediaExchange;
        self.publish();
    }

    /// MEDIA_EXCHANGE → STANDBY.  No-op in ERROR.
    pub fn end_cycle(&mut self) {
        if self.is_error() {
            warn!("Illegal end_cycle while in ERROR, ignored");
            return;
        }
        self.status.mode = SystemMode::Standby;
        self.publish();
    }

    pub fn set_next_cycle(&mut self, at: DateTime<Utc>) {
        info!("Next media cycle due at {}", at.format("%H:%M:%S"));
        self.status.next_cycle_time = Some(at);
        self.publish();
    }

    /// Advance the status clock without any other change.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.status.as_of = self.status.as_of.max(now);
    }

    // ── Cycle record (owned by the cycle engine) ──────────────

    pub(crate) fn start_record(&mut self, record: CycleRecord) {
        self.status.cycle = record;
        self.publish();
    }

    pub(crate) fn set_cycle_phase(&mut self, phase: Phase) {
        self.status.cycle.set_phase(phase);
        self.publish();
    }

    pub(crate) fn update_cycle_ontimes(&mut self, inlet_secs: f32, outlet_secs: f32) {
        self.status.cycle.update_ontimes(inlet_secs, outlet_secs);
        self.publish();
    }

    /// Add the record's volumes to the running totals and retire it.
    /// Returns the folded `(in, out)` volumes.
    pub(crate) fn fold_cycle_volumes(&mut self) -> (f32, f32) {
        let record = self.status.cycle;
        let (vin, vout) = (record.in_volume(), record.out_volume());
        self.status.media_in_ml += vin;
        self.status.media_out_ml += vout;
        info!(
            "Cycle volumes folded: +{:.1} mL in, +{:.1} mL out (totals {:.1} / {:.1})",
            vin, vout, self.status.media_in_ml, self.status.media_out_ml
        );
        self.status.cycle = CycleRecord::inactive();
        self.publish();
        (vin, vout)
    }

    fn publish(&mut self) {
        for observer in &mut self.observers {
            observer.notify(&self.status);
        }
    }
}
