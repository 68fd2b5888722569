//! Inbound commands to the application service.
//!
//! These represent actions requested by an operator that the
//! [`AppService`](super::service::AppService) hands to [`AppCommand::apply`].
//! The one-shot CLI subcommands apply them directly against a bare
//! status aggregator, so both paths share the same checks.

use std::time::Duration;

use log::info;

use crate::config::ChemostatConfig;
use crate::error::{Error, Result};
use crate::status::StatusHub;

use super::ports::{DeviceId, Hardware};
use super::timers::TimedSwitches;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Run a device for a fixed time; the driver loop switches it off.
    RunFor { device: DeviceId, duration: Duration },

    /// Pump a volume through the inlet or outlet at its calibrated flow.
    Dispense { device: DeviceId, volume_ml: f32 },

    /// Switch every device off and drop pending timed runs.
    AllOff,
}

impl AppCommand {
    /// Validate and carry out the command.  Pumps are refused while the
    /// aggregator is in ERROR; everything else still switches.
    pub fn apply<H: Hardware>(
        self,
        hw: &mut H,
        status: &mut StatusHub,
        timers: &mut TimedSwitches,
        config: &ChemostatConfig,
    ) -> Result<()> {
        match self {
            Self::RunFor { device, duration } => run_for(hw, status, timers, device, duration),
            Self::Dispense { device, volume_ml } => {
                let flow = match device {
                    DeviceId::Inlet => config.inlet_flow_ml_per_s,
                    DeviceId::Outlet => config.outlet_flow_ml_per_s,
                    _ => return Err(Error::Config("only the media pumps can dispense")),
                };
                if !(volume_ml.is_finite() && volume_ml > 0.0) {
                    return Err(Error::Config("dispense volume must be > 0"));
                }
                let duration = Duration::try_from_secs_f32(volume_ml / flow)
                    .map_err(|_| Error::Config("dispense time out of range"))?;
                run_for(hw, status, timers, device, duration)
            }
            Self::AllOff => {
                timers.cancel_all(hw, status);
                for device in DeviceId::ALL {
                    if hw.is_on(device) {
                        status.actuate(hw, device, false)?;
                    }
                }
                info!("All devices off");
                Ok(())
            }
        }
    }
}

fn run_for<H: Hardware>(
    hw: &mut H,
    status: &mut StatusHub,
    timers: &mut TimedSwitches,
    device: DeviceId,
    duration: Duration,
) -> Result<()> {
    if status.is_error() && DeviceId::PUMPS.contains(&device) {
        return Err(Error::Refused("pumps are locked out in ERROR"));
    }
    timers.run_for(hw, status, device, duration)?;
    Ok(())
}
