//! Hotplate thermostat
//!
//! On/off threshold control around the setpoint.  The hotplate also drives
//! the magnetic stirrer, so with heating disabled it simply stays on.

use log::{info, warn};

use crate::app::ports::{Clock, DeviceId, DevicePort};
use crate::config::ChemostatConfig;
use crate::error::{ActuatorError, Fault};
use crate::status::StatusHub;

/// Threshold thermostat
pub struct ThermalRegulator {
    heating_enabled: bool,
    target_c: f32,
    shutdown_c: f32,
}

impl ThermalRegulator {
    pub fn new(config: &ChemostatConfig) -> Self {
        Self {
            heating_enabled: config.heating_enabled,
            target_c: config.target_temp_c,
            shutdown_c: config.shutdown_temp_c,
        }
    }

    /// One regulation step against the latest temperature in `status`.
    pub fn regulate<H: DevicePort + Clock>(
        &mut self,
        hw: &mut H,
        status: &mut StatusHub,
    ) -> Result<(), ActuatorError> {
        let plate_on = hw.is_on(DeviceId::Hotplate);

        if status.is_error() {
            if plate_on {
                status.actuate(hw, DeviceId::Hotplate, false)?;
            }
            return Ok(());
        }

        if !self.heating_enabled {
            if !plate_on {
                status.actuate(hw, DeviceId::Hotplate, true)?;
            }
            return Ok(());
        }

        let temperature = status.status().temperature;
        let Some(temp_c) = temperature.last_c.filter(|_| temperature.sensor_ok) else {
            if plate_on {
                warn!("No temperature reading, hotplate off");
                status.actuate(hw, DeviceId::Hotplate, false)?;
            }
            return Ok(());
        };

        if temp_c > self.shutdown_c {
            if plate_on {
                status.actuate(hw, DeviceId::Hotplate, false)?;
            }
            status.raise(
                Fault::Overheat {
                    temp_c,
                    shutdown_c: self.shutdown_c,
                },
                hw.now(),
            );
            return Ok(());
        }

        if temp_c > self.target_c && plate_on {
            info!("{:.1}C above setpoint, hotplate off", temp_c);
            status.actuate(hw, DeviceId::Hotplate, false)?;
        } else if temp_c <= self.target_c && !plate_on {
            info!("{:.1}C at or below setpoint, hotplate on", temp_c);
            status.actuate(hw, DeviceId::Hotplate, true)?;
        }
        Ok(())
    }
}
