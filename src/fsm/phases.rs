//! Concrete phase handler functions and table builder.
//!
//! Each phase is three plain `fn` pointers, generic over the bench so the
//! same table runs on GPIO relays and on the simulator.
//!
//! ```text
//!  START ──▶ DRAIN ──[outlet on-time ≥ target]──▶ FILL
//!              │                                   │
//!     [still wet after drain]          [wet early]   [target elapsed]
//!              ▼                           ▼              ▼
//!            (halt)                      OVER          UNDER
//!                                          └─────┬──────┘
//!                                                ▼
//!                                              CALIB ──[wet]──▶ DONE
//!                                                │
//!                                        [bound reached]
//!                                                ▼
//!                                              ERROR
//! ```
//!
//! A handler that latches a fault returns `None`; the engine stops polling
//! and the record keeps the phase the fault happened in.

use log::info;

use super::context::CycleContext;
use super::{Phase, PhaseDescriptor};
use crate::app::ports::{DeviceId, Hardware};
use crate::error::Fault;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the phase table.  Called once per cycle.
pub fn build_phase_table<H: Hardware>() -> [PhaseDescriptor<H>; Phase::COUNT] {
    [
        // Index 0: Start
        PhaseDescriptor {
            name: "Start",
            on_enter: Some(start_enter::<H>),
            on_update: start_update::<H>,
        },
        // Index 1: Drain
        PhaseDescriptor {
            name: "Drain",
            on_enter: Some(drain_enter::<H>),
            on_update: drain_update::<H>,
        },
        // Index 2: Fill
        PhaseDescriptor {
            name: "Fill",
            on_enter: Some(fill_enter::<H>),
            on_update: fill_update::<H>,
        },
        // Index 3: Over
        PhaseDescriptor {
            name: "Over",
            on_enter: Some(over_enter::<H>),
            on_update: to_calib::<H>,
        },
        // Index 4: Under
        PhaseDescriptor {
            name: "Under",
            on_enter: Some(under_enter::<H>),
            on_update: to_calib::<H>,
        },
        // Index 5: Calib
        PhaseDescriptor {
            name: "Calib",
            on_enter: Some(calib_enter::<H>),
            on_update: calib_update::<H>,
        },
        // Index 6: Done
        PhaseDescriptor {
            name: "Done",
            on_enter: Some(done_enter::<H>),
            on_update: terminal::<H>,
        },
        // Index 7: Error
        PhaseDescriptor {
            name: "Error",
            on_enter: Some(error_enter::<H>),
            on_update: terminal::<H>,
        },
        // Index 8: Inactive (never entered by a running cycle)
        PhaseDescriptor {
            name: "Inactive",
            on_enter: None,
            on_update: terminal::<H>,
        },
    ]
}

fn terminal<H: Hardware>(_ctx: &mut CycleContext<'_, H>) -> Option<Phase> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  START: quiet the vessel
// ═══════════════════════════════════════════════════════════════════════════

fn start_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    info!(
        "START: exchanging {:.1} mL (drain/fill bound {:.1}s, calib bound {:.1}s)",
        ctx.target_volume_ml,
        ctx.target_ontime.as_secs_f32(),
        ctx.max_calib_time.as_secs_f32()
    );

    // Stirring and bubbling keep the surface moving; the sensor needs it still.
    ctx.ensure(DeviceId::Hotplate, false);
    ctx.ensure(DeviceId::AirPump, false);

    if ctx.config.settle_enabled && ctx.fault.is_none() {
        info!("START: settling for {}s", ctx.config.settle_secs);
        ctx.pause(std::time::Duration::from_secs(u64::from(ctx.config.settle_secs)));
    }
}

fn start_update<H: Hardware>(ctx: &mut CycleContext<'_, H>) -> Option<Phase> {
    if ctx.fault.is_some() {
        return None;
    }
    Some(Phase::Drain)
}

// ═══════════════════════════════════════════════════════════════════════════
//  DRAIN: outlet for exactly the target on-time
// ═══════════════════════════════════════════════════════════════════════════

fn drain_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    info!("DRAIN: removing {:.1} mL", ctx.target_volume_ml);
    ctx.start_pump(DeviceId::Outlet);
    // Bubbling through the drain helps clear media from the outlet line.
    ctx.ensure(DeviceId::AirPump, true);
}

fn drain_update<H: Hardware>(ctx: &mut CycleContext<'_, H>) -> Option<Phase> {
    if ctx.fault.is_some() {
        return None;
    }

    let target = ctx.target_ontime;
    if ctx.phase_run(DeviceId::Outlet) < target {
        ctx.check_stall(DeviceId::Outlet, target);
        return None;
    }

    ctx.ensure(DeviceId::Outlet, false);
    ctx.ensure(DeviceId::AirPump, false);

    match ctx.water_level() {
        Some(false) => Some(Phase::Fill),
        Some(true) => {
            ctx.fail(Fault::PostDrainLevel);
            None
        }
        None => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  FILL: inlet until the target on-time or the sensor, whichever first
// ═══════════════════════════════════════════════════════════════════════════

fn fill_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    ctx.pause(ctx.config.phase_pause());
    info!("FILL: adding up to {:.1} mL", ctx.target_volume_ml);
    ctx.start_pump(DeviceId::Inlet);
}

fn fill_update<H: Hardware>(ctx: &mut CycleContext<'_, H>) -> Option<Phase> {
    if ctx.fault.is_some() {
        return None;
    }
    let wet = ctx.water_level()?;
    let run = ctx.phase_run(DeviceId::Inlet);
    let target = ctx.target_ontime;

    if !wet && run < target {
        ctx.check_stall(DeviceId::Inlet, target);
        return None;
    }

    ctx.ensure(DeviceId::Inlet, false);
    // Same `run` sample decides both the exit and the verdict.
    if wet && run < target {
        Some(Phase::Over)
    } else {
        Some(Phase::Under)
    }
}

fn over_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    info!(
        "OVER: level reached after {:.1}s of {:.1}s",
        ctx.status.status().cycle.inlet_ontime_secs(),
        ctx.target_ontime.as_secs_f32()
    );
}

fn under_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    info!(
        "UNDER: {:.1}s elapsed without reaching the level sensor",
        ctx.target_ontime.as_secs_f32()
    );
}

fn to_calib<H: Hardware>(ctx: &mut CycleContext<'_, H>) -> Option<Phase> {
    if ctx.fault.is_some() {
        return None;
    }
    Some(Phase::Calib)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALIB: re-centre on the sensor, bounded by one more target volume
// ═══════════════════════════════════════════════════════════════════════════

fn calib_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    ctx.pause(ctx.config.phase_pause());
    match ctx.water_level() {
        Some(true) => info!("CALIB: level already at sensor"),
        Some(false) => {
            info!(
                "CALIB: topping up for at most {:.1}s",
                ctx.max_calib_time.as_secs_f32()
            );
            ctx.start_pump(DeviceId::Inlet);
        }
        None => {}
    }
}

fn calib_update<H: Hardware>(ctx: &mut CycleContext<'_, H>) -> Option<Phase> {
    if ctx.fault.is_some() {
        return None;
    }
    let wet = ctx.water_level()?;

    if wet {
        ctx.ensure(DeviceId::Inlet, false);
        return Some(Phase::Done);
    }

    let bound = ctx.max_calib_time;
    if ctx.phase_run(DeviceId::Inlet) >= bound {
        ctx.ensure(DeviceId::Inlet, false);
        ctx.fail(Fault::CalibrationFailed {
            max_calib_secs: bound.as_secs_f32(),
        });
        return Some(Phase::Error);
    }

    ctx.check_stall(DeviceId::Inlet, bound);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Terminal phases
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    let record = ctx.status.status().cycle;
    info!(
        "DONE: {:.1} mL in, {:.1} mL out (target {:.1} mL)",
        record.in_volume(),
        record.out_volume(),
        ctx.target_volume_ml
    );
    ctx.pause(ctx.config.phase_pause());
}

fn error_enter<H: Hardware>(ctx: &mut CycleContext<'_, H>) {
    ctx.halt_pumps();
}
