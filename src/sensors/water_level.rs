//! Non-contact capacitive level sensor on the vessel wall.
//!
//! Mounted at the working-volume mark.  Outputs a digital level when
//! liquid is at or above it; polarity depends on the module, so it is
//! configurable.

use embedded_hal::digital::InputPin;
use log::warn;

use crate::error::SensorError;

pub struct WaterLevelSensor<W> {
    pin: W,
    active_low: bool,
    last: Option<bool>,
}

impl<W: InputPin> WaterLevelSensor<W> {
    pub fn new(pin: W, active_low: bool) -> Self {
        Self {
            pin,
            active_low,
            last: None,
        }
    }

    /// `true` when liquid is at or above the sensor.
    pub fn read(&mut self) -> Result<bool, SensorError> {
        let high = self.pin.is_high().map_err(|e| {
            warn!("Level sensor read failed: {:?}", e);
            SensorError::GpioReadFailed
        })?;
        let exceeded = high != self.active_low;
        self.last = Some(exceeded);
        Ok(exceeded)
    }

    /// Last successful reading.
    pub fn last(&self) -> Option<bool> {
        self.last
    }
}
