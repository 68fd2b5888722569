//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns one relay per device, the level sensor and the thermometer,
//! exposing them through [`DevicePort`], [`SensorPort`] and [`Clock`].
//! This is the only module in the system that touches actual hardware.
//! Every relay is switched off when the bench is dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use embedded_hal::digital::{InputPin, OutputPin};
use log::{error, info};

use crate::adapters::time::SystemClock;
use crate::app::events::DeviceEvent;
use crate::app::ports::{Clock, DeviceId, DevicePort, SensorPort};
use crate::drivers::relay::Relay;
use crate::error::{ActuatorError, SensorError};
use crate::sensors::{W1Thermometer, WaterLevelSensor};

/// Concrete adapter that combines all hardware behind port traits.
pub struct GpioBench<P: OutputPin, W> {
    /// Indexed by [`DeviceId::index`].
    relays: [Relay<P>; DeviceId::COUNT],
    level: WaterLevelSensor<W>,
    thermometer: W1Thermometer,
    clock: SystemClock,
}

impl<P: OutputPin, W: InputPin> GpioBench<P, W> {
    /// `relay_pins` in [`DeviceId`] order.  Drives every relay off.
    pub fn new(
        relay_pins: [P; DeviceId::COUNT],
        relays_active_low: bool,
        level_pin: W,
        level_active_low: bool,
        thermometer: W1Thermometer,
    ) -> Result<Self, ActuatorError> {
        let mut relays = relay_pins.map(|pin| Relay::new(pin, relays_active_low));
        for device in DeviceId::ALL {
            relays[device.index()]
                .switch(false)
                .map_err(|_| ActuatorError::GpioWriteFailed(device))?;
        }
        info!("GPIO bench ready, all relays off");
        Ok(Self {
            relays,
            level: WaterLevelSensor::new(level_pin, level_active_low),
            thermometer,
            clock: SystemClock::new(),
        })
    }
}

// ── DevicePort implementation ─────────────────────────────────

impl<P: OutputPin, W: InputPin> DevicePort for GpioBench<P, W> {
    fn switch(&mut self, device: DeviceId, on: bool) -> Result<DeviceEvent, ActuatorError> {
        let relay = &mut self.relays[device.index()];
        let on_time = relay.switch(on).map_err(|e| {
            error!("Relay write for {} failed: {:?}", device, e);
            ActuatorError::GpioWriteFailed(device)
        })?;
        Ok(DeviceEvent {
            device,
            on,
            on_time,
        })
    }

    fn is_on(&self, device: DeviceId) -> bool {
        self.relays[device.index()].is_on()
    }

    fn on_time(&self, device: DeviceId) -> Duration {
        self.relays[device.index()].on_time()
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<P: OutputPin, W: InputPin> SensorPort for GpioBench<P, W> {
    fn water_level_exceeded(&mut self) -> Result<bool, SensorError> {
        self.level.read()
    }

    fn temperature_c(&mut self) -> Result<f32, SensorError> {
        self.thermometer.read()
    }
}

// ── Clock implementation ──────────────────────────────────────

impl<P: OutputPin, W: InputPin> Clock for GpioBench<P, W> {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn sleep(&mut self, duration: Duration) {
        self.clock.sleep(duration);
    }
}

impl<P: OutputPin, W> Drop for GpioBench<P, W> {
    fn drop(&mut self) {
        for device in DeviceId::ALL {
            let relay = &mut self.relays[device.index()];
            if relay.is_on() {
                if let Err(e) = relay.switch(false) {
                    error!("Failed to switch {} off on drop: {:?}", device, e);
                }
            }
        }
    }
}
