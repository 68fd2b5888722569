//! Inbound status events.
//!
//! Devices and sensors report into the
//! [`StatusHub`](crate::status::StatusHub) through these tagged variants
//! instead of the hub inspecting who called it.

use std::time::Duration;

use crate::app::ports::DeviceId;

/// One on/off transition of a device, as returned by
/// [`DevicePort::switch`](super::ports::DevicePort::switch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEvent {
    pub device: DeviceId,
    /// State after the transition.
    pub on: bool,
    /// Cumulative on-time after the transition.
    pub on_time: Duration,
}

/// A fresh sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    /// Vessel temperature in °C, `None` when the sensor is unavailable.
    Temperature(Option<f32>),
    /// Level sensor state: `true` when liquid is at or above it.
    WaterLevel(bool),
}

/// Everything the status aggregator accepts through `notify`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusEvent {
    Device(DeviceEvent),
    Sensor(SensorEvent),
}

impl From<DeviceEvent> for StatusEvent {
    fn from(e: DeviceEvent) -> Self {
        Self::Device(e)
    }
}

impl From<SensorEvent> for StatusEvent {
    fn from(e: SensorEvent) -> Self {
        Self::Sensor(e)
    }
}
