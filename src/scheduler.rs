//! Media-exchange scheduler.
//!
//! Owns the cycle timetable and runs the phase machine when a cycle falls
//! due.  At startup it establishes the reactor volume, filling the vessel
//! to the level sensor when the volume is not configured.
//!
//! ```text
//!   start()                      check() every tick
//!   ───────                      ──────────────────
//!   reactor volume known? ──no──▶ fill to sensor ──▶ first cycle delayed
//!          │yes
//!          ▼
//!   next = now (or delayed)      now > next_next ──▶ MissedDeadline
//!   next_next = next + T         now > next      ──▶ advance, run cycle
//! ```
//!
//! The timetable is double-buffered: `next` is the cycle about to run and
//! `next_next` the one after it.  If the clock passes `next_next` before
//! `next` was ever attempted, a whole cycle has been lost and the system
//! goes to ERROR.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::{error, info, warn};
use serde::Serialize;

use crate::app::ports::{DeviceId, Hardware};
use crate::config::ChemostatConfig;
use crate::error::Fault;
use crate::fsm::context::CycleContext;
use crate::fsm::phases::build_phase_table;
use crate::fsm::{Fsm, Phase};
use crate::status::{CycleRecord, StatusHub};

/// `Duration` → `TimeDelta`, saturating.
pub fn delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

// ═══════════════════════════════════════════════════════════════
//  Timetable
// ═══════════════════════════════════════════════════════════════

/// Double-buffered due times.  `next < next_next` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSchedule {
    next: DateTime<Utc>,
    next_next: DateTime<Utc>,
    interval: TimeDelta,
}

impl CycleSchedule {
    pub fn new(first_due: DateTime<Utc>, interval: Duration) -> Self {
        let interval = delta(interval).max(TimeDelta::milliseconds(1));
        Self {
            next: first_due,
            next_next: first_due + interval,
            interval,
        }
    }

    pub fn next(&self) -> DateTime<Utc> {
        self.next
    }

    pub fn next_next(&self) -> DateTime<Utc> {
        self.next_next
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// The pending cycle is due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now > self.next
    }

    /// The cycle after the pending one is also due: one was lost.
    pub fn is_missed(&self, now: DateTime<Utc>) -> bool {
        now > self.next_next
    }

    /// Shift by one cycle.
    pub fn advance(&mut self) {
        self.next = self.next_next;
        self.next_next = self.next + self.interval;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cycle outcome
// ═══════════════════════════════════════════════════════════════

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleReport {
    pub final_phase: Phase,
    pub target_volume_ml: f32,
    pub in_volume_ml: f32,
    pub out_volume_ml: f32,
    #[serde(skip)]
    pub fault: Option<Fault>,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.fault.is_none() && self.final_phase == Phase::Done
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct MediaExchange {
    config: ChemostatConfig,
    reactor_volume_ml: f32,
    volume_per_cycle_ml: f32,
    schedule: CycleSchedule,
    cycles_completed: u32,
}

impl MediaExchange {
    /// Establish the reactor volume and the first due time.
    ///
    /// A failed startup fill leaves the status in ERROR with a zero reactor
    /// volume; the timetable is still built so the status shows a due time,
    /// but no cycle will run.
    pub fn start<H: Hardware>(config: ChemostatConfig, hw: &mut H, status: &mut StatusHub) -> Self {
        let filled = config.reactor_volume_ml.is_none();
        let reactor_volume_ml = match config.reactor_volume_ml {
            Some(v) => v,
            None => fill_vessel(&config, hw, status).unwrap_or(0.0),
        };
        let volume_per_cycle_ml = config.volume_per_cycle(reactor_volume_ml);
        let interval = config.time_between_cycles();

        let now = hw.now();
        let first_due = if config.delay_first_cycle || filled {
            now + delta(interval) + TimeDelta::seconds(i64::from(config.first_cycle_delay_secs))
        } else {
            now
        };

        info!(
            "Media exchange: reactor {:.1} mL, {:.1} mL every {}s",
            reactor_volume_ml,
            volume_per_cycle_ml,
            interval.as_secs()
        );
        let worst = worst_case_cycle(&config, volume_per_cycle_ml);
        if worst > interval {
            warn!(
                "Worst-case cycle ({:.0}s) exceeds the cycle interval ({}s); expect missed deadlines",
                worst.as_secs_f32(),
                interval.as_secs()
            );
        }

        let schedule = CycleSchedule::new(first_due, interval);
        status.set_next_cycle(schedule.next());

        Self {
            config,
            reactor_volume_ml,
            volume_per_cycle_ml,
            schedule,
            cycles_completed: 0,
        }
    }

    /// Run a cycle when one is due.  Called once per tick.
    pub fn check<H: Hardware>(&mut self, hw: &mut H, status: &mut StatusHub) -> Option<CycleReport> {
        let now = hw.now();
        status.touch(now);

        if self.schedule.is_missed(now) && !status.is_error() {
            error!(
                "Missed cycle due at {}; now {}",
                self.schedule.next().format("%H:%M:%S"),
                now.format("%H:%M:%S")
            );
            status.raise(
                Fault::MissedDeadline {
                    due: self.schedule.next(),
                },
                now,
            );
        }

        if !self.schedule.is_due(now) {
            return None;
        }
        self.schedule.advance();
        status.set_next_cycle(self.schedule.next());

        if status.is_error() {
            return None;
        }
        Some(self.run_cycle(hw, status))
    }

    fn run_cycle<H: Hardware>(&mut self, hw: &mut H, status: &mut StatusHub) -> CycleReport {
        let target = self.volume_per_cycle_ml;
        status.start_record(CycleRecord::new(
            target,
            self.config.inlet_flow_ml_per_s,
            self.config.outlet_flow_ml_per_s,
        ));
        status.begin_cycle();

        let mut ctx = CycleContext::new(hw, status, &self.config, target);
        let mut fsm = Fsm::new(build_phase_table(), Phase::Start);
        fsm.start(&mut ctx);
        while ctx.fault.is_none() && !fsm.current_phase().is_terminal() {
            ctx.poll_sleep();
            fsm.tick(&mut ctx);
            ctx.sync_record();
        }

        let fault = ctx.fault;
        let final_phase = fsm.current_phase();
        if fault.is_some() {
            ctx.halt_pumps();
            ctx.sync_record();
        }
        let now = ctx.now();
        let record = ctx.status.status().cycle;

        let mut report = CycleReport {
            final_phase,
            target_volume_ml: target,
            in_volume_ml: record.in_volume(),
            out_volume_ml: record.out_volume(),
            fault,
        };

        match fault {
            Some(f) => {
                status.raise(f, now);
            }
            None if final_phase == Phase::Done => {
                let (vin, vout) = status.fold_cycle_volumes();
                report.in_volume_ml = vin;
                report.out_volume_ml = vout;
                status.end_cycle();
                self.cycles_completed += 1;
            }
            None => warn!("Cycle stopped in non-final phase {}", final_phase),
        }
        report
    }

    /// Whether the next `check` at `now` would start a cycle.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.is_due(now)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn schedule(&self) -> &CycleSchedule {
        &self.schedule
    }

    pub fn next_cycle_time(&self) -> DateTime<Utc> {
        self.schedule.next()
    }

    pub fn reactor_volume_ml(&self) -> f32 {
        self.reactor_volume_ml
    }

    pub fn volume_per_cycle_ml(&self) -> f32 {
        self.volume_per_cycle_ml
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn config(&self) -> &ChemostatConfig {
        &self.config
    }
}

/// Longest a healthy cycle can take: settle, drain, fill and calibration
/// at their bounds, plus the pauses between them.
fn worst_case_cycle(config: &ChemostatConfig, target_ml: f32) -> Duration {
    let settle = if config.settle_enabled {
        Duration::from_secs(u64::from(config.settle_secs))
    } else {
        Duration::ZERO
    };
    let pump_bound = Duration::from_secs_f32(target_ml / config.outlet_flow_ml_per_s);
    let calib_bound = Duration::from_secs_f32(target_ml / config.inlet_flow_ml_per_s);
    settle + pump_bound * 2 + calib_bound + config.phase_pause() * 3
}

// ═══════════════════════════════════════════════════════════════
//  Startup fill
// ═══════════════════════════════════════════════════════════════

/// Run the inlet pump until the level sensor triggers, bounded by the time
/// needed to fill the whole vessel.  Returns the measured reactor volume.
///
/// A sensor that is already wet when the fill starts cannot be trusted for
/// the rest of the procedure: the pump runs to the ceiling and the fill
/// fails whatever the sensor reports afterwards.
fn fill_vessel<H: Hardware>(
    config: &ChemostatConfig,
    hw: &mut H,
    status: &mut StatusHub,
) -> Option<f32> {
    let ceiling_secs = config.max_vessel_volume_ml / config.inlet_flow_ml_per_s;
    let ceiling = Duration::from_secs_f32(ceiling_secs);
    info!(
        "Reactor volume unknown; filling to the level sensor (ceiling {:.0}s)",
        ceiling_secs
    );

    status.start_record(CycleRecord::new(
        config.max_vessel_volume_ml,
        config.inlet_flow_ml_per_s,
        config.outlet_flow_ml_per_s,
    ));
    status.begin_cycle();

    let mut ctx = CycleContext::new(hw, status, config, config.max_vessel_volume_ml);
    ctx.on_phase_change(Phase::Fill);

    let pre_triggered = ctx.water_level().unwrap_or(false);
    if pre_triggered {
        error!("Level sensor already triggered before fill; running to the ceiling");
    }
    let mut triggered = false;

    ctx.start_pump(DeviceId::Inlet);
    while ctx.fault.is_none() {
        ctx.poll_sleep();
        let Some(wet) = ctx.water_level() else {
            break;
        };
        ctx.sync_record();
        if wet && !pre_triggered {
            triggered = true;
            break;
        }
        if ctx.phase_run(DeviceId::Inlet) >= ceiling {
            break;
        }
        ctx.check_stall(DeviceId::Inlet, ceiling);
    }
    ctx.ensure(DeviceId::Inlet, false);
    ctx.sync_record();

    let fault = ctx.fault.or(if triggered {
        None
    } else {
        Some(Fault::FillCeilingExceeded {
            ceiling_secs,
            pre_triggered,
        })
    });
    if let Some(fault) = fault {
        ctx.halt_pumps();
        let now = ctx.now();
        status.raise(fault, now);
        return None;
    }

    ctx.on_phase_change(Phase::Over);
    let volume = ctx.status.status().cycle.in_volume();
    info!("Vessel filled: reactor volume {:.1} mL", volume);
    status.fold_cycle_volumes();
    status.end_cycle();
    Some(volume)
}
