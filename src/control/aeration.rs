//! Bubbler duty cycle
//!
//! The air pump runs `percent_on`% of every `period`.  Swaps are driven off
//! the bench clock, so a cycle that switches the pump off mid-period is
//! picked up at the next deadline.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;

use crate::app::ports::{Clock, DeviceId, DevicePort};
use crate::config::ChemostatConfig;
use crate::error::ActuatorError;
use crate::status::StatusHub;

pub struct AerationRegulator {
    time_on: TimeDelta,
    time_off: TimeDelta,
    percent_on: u8,
    next_swap: DateTime<Utc>,
}

impl AerationRegulator {
    pub fn new(config: &ChemostatConfig, now: DateTime<Utc>) -> Self {
        let period_ms = i64::from(config.aeration_period_secs) * 1000;
        let on_ms = period_ms * i64::from(config.aeration_percent_on.min(100)) / 100;
        Self {
            time_on: TimeDelta::milliseconds(on_ms),
            time_off: TimeDelta::milliseconds(period_ms - on_ms),
            percent_on: config.aeration_percent_on.min(100),
            next_swap: now,
        }
    }

    /// Switch the bubbler on and arm the first swap.
    pub fn start<H: DevicePort + Clock>(
        &mut self,
        hw: &mut H,
        status: &mut StatusHub,
    ) -> Result<(), ActuatorError> {
        let now = hw.now();
        if self.percent_on == 0 {
            self.next_swap = now + self.time_off;
            return Ok(());
        }
        if !hw.is_on(DeviceId::AirPump) {
            status.actuate(hw, DeviceId::AirPump, true)?;
        }
        self.next_swap = now + self.time_on;
        Ok(())
    }

    pub fn regulate<H: DevicePort + Clock>(
        &mut self,
        hw: &mut H,
        status: &mut StatusHub,
    ) -> Result<(), ActuatorError> {
        if status.is_error() {
            return Ok(());
        }

        let pump_on = hw.is_on(DeviceId::AirPump);
        match self.percent_on {
            0 => {
                if pump_on {
                    status.actuate(hw, DeviceId::AirPump, false)?;
                }
                return Ok(());
            }
            100 => {
                if !pump_on {
                    status.actuate(hw, DeviceId::AirPump, true)?;
                }
                return Ok(());
            }
            _ => {}
        }

        let now = hw.now();
        if now < self.next_swap {
            return Ok(());
        }
        if pump_on {
            debug!("Aeration off");
            status.actuate(hw, DeviceId::AirPump, false)?;
            self.next_swap = now + self.time_off;
        } else {
            debug!("Aeration on");
            status.actuate(hw, DeviceId::AirPump, true)?;
            self.next_swap = now + self.time_on;
        }
        Ok(())
    }

    pub fn next_swap(&self) -> DateTime<Utc> {
        self.next_swap
    }
}
