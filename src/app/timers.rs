//! Timed auto-off queue.
//!
//! "Run this device for N seconds" requests switch the device on at once
//! and park a deadline here; the driver loop polls the queue every tick
//! and switches expired devices off.  Everything happens on the loop's
//! thread, so the status aggregator keeps a single writer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use heapless::Vec;
use log::{error, info};

use crate::app::ports::{Clock, DeviceId, DevicePort};
use crate::error::ActuatorError;
use crate::scheduler::delta;
use crate::status::StatusHub;

/// One pending request per device at most.
const MAX_TIMED: usize = DeviceId::COUNT;

#[derive(Debug, Clone, Copy)]
struct PendingOff {
    device: DeviceId,
    deadline: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TimedSwitches {
    pending: Vec<PendingOff, MAX_TIMED>,
}

impl TimedSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch `device` on and schedule it off after `duration`.
    /// Returns the off deadline.
    pub fn run_for<H: DevicePort + Clock>(
        &mut self,
        hw: &mut H,
        status: &mut StatusHub,
        device: DeviceId,
        duration: Duration,
    ) -> Result<DateTime<Utc>, ActuatorError> {
        if self.pending.iter().any(|p| p.device == device) {
            return Err(ActuatorError::AlreadyTimed(device));
        }
        if self.pending.is_full() {
            return Err(ActuatorError::TimerQueueFull);
        }
        if !hw.is_on(device) {
            status.actuate(hw, device, true)?;
        }
        let deadline = hw.now() + delta(duration);
        self.pending
            .push(PendingOff { device, deadline })
            .map_err(|_| ActuatorError::TimerQueueFull)?;
        info!(
            "{} on for {:.1}s (until {})",
            device,
            duration.as_secs_f32(),
            deadline.format("%H:%M:%S")
        );
        Ok(deadline)
    }

    /// Switch off every device whose deadline has passed.  Returns how
    /// many were switched off.
    pub fn poll<H: DevicePort + Clock>(&mut self, hw: &mut H, status: &mut StatusHub) -> usize {
        let now = hw.now();
        let mut expired = 0;
        for p in self.pending.iter().filter(|p| p.deadline <= now) {
            expired += 1;
            if hw.is_on(p.device) {
                info!("{} timed run finished", p.device);
                if let Err(e) = status.actuate(hw, p.device, false) {
                    error!("Failed to switch {} off after timed run: {}", p.device, e);
                }
            }
        }
        self.pending.retain(|p| p.deadline > now);
        expired
    }

    /// Drop the pending request for `device`, switching it off now.
    /// Returns whether one was pending.
    pub fn cancel<H: DevicePort>(
        &mut self,
        hw: &mut H,
        status: &mut StatusHub,
        device: DeviceId,
    ) -> bool {
        let Some(idx) = self.pending.iter().position(|p| p.device == device) else {
            return false;
        };
        self.pending.swap_remove(idx);
        if hw.is_on(device) {
            if let Err(e) = status.actuate(hw, device, false) {
                error!("Failed to switch {} off: {}", device, e);
            }
        }
        true
    }

    pub fn is_pending(&self, device: DeviceId) -> bool {
        self.pending.iter().any(|p| p.device == device)
    }

    /// Drop every pending request, switching the devices off now.
    pub fn cancel_all<H: DevicePort>(&mut self, hw: &mut H, status: &mut StatusHub) {
        for p in &self.pending {
            if hw.is_on(p.device) {
                if let Err(e) = status.actuate(hw, p.device, false) {
                    error!("Failed to switch {} off: {}", p.device, e);
                }
            }
        }
        self.pending.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.iter().map(|p| p.deadline).min()
    }
}
