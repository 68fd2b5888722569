//! Function-pointer state machine driving one media-exchange cycle.
//!
//! Classic embedded FSM pattern:
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │  PhaseTable                                    │
//! │  ┌──────────┬───────────┬───────────────────┐  │
//! │  │ Phase    │ on_enter  │ on_update         │  │
//! │  ├──────────┼───────────┼───────────────────┤  │
//! │  │ Start    │ fn(ctx)   │ fn(ctx)->Option<> │  │
//! │  │ Drain    │ fn(ctx)   │ fn(ctx)->Option<> │  │
//! │  │ Fill     │ fn(ctx)   │ fn(ctx)->Option<> │  │
//! │  │ Over     │ fn(ctx)   │ fn(ctx)->Option<> │  │
//! │  │ Under    │ fn(ctx)   │ fn(ctx)->Option<> │  │
//! │  │ Calib    │ fn(ctx)   │ fn(ctx)->Option<> │  │
//! │  │ Done     │ fn(ctx)   │ terminal          │  │
//! │  │ Error    │ fn(ctx)   │ terminal          │  │
//! │  │ Inactive │ -         │ terminal          │  │
//! │  └──────────┴───────────┴───────────────────┘  │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! Each poll the engine calls `on_update` for the **current** phase.
//! If it returns `Some(next)`, the engine records the new phase on the
//! cycle record, then runs `on_enter` for the next.  All functions receive a
//! [`CycleContext`] holding the hardware, the status hub and the
//! cycle's bounds.

pub mod context;
pub mod phases;

use core::fmt;

use log::info;
use serde::Serialize;

use crate::app::ports::Hardware;
use context::CycleContext;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Every phase a cycle record can be in.
/// Must stay in sync with the table built in [`phases::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Phase {
    Start = 0,
    Drain = 1,
    Fill = 2,
    /// Sensor triggered before the fill target elapsed.
    Over = 3,
    /// Fill target elapsed without the sensor triggering.
    Under = 4,
    Calib = 5,
    Done = 6,
    Error = 7,
    /// No cycle in progress.
    Inactive = 8,
}

impl Phase {
    /// Total number of phases: used to size the table array.
    pub const COUNT: usize = 9;

    /// Convert an index back to `Phase`.  Panics on out-of-range in
    /// debug builds; returns `Error` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Start,
            1 => Self::Drain,
            2 => Self::Fill,
            3 => Self::Over,
            4 => Self::Under,
            5 => Self::Calib,
            6 => Self::Done,
            7 => Self::Error,
            8 => Self::Inactive,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Error
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Drain => "drain",
            Self::Fill => "fill",
            Self::Over => "over",
            Self::Under => "under",
            Self::Calib => "calib",
            Self::Done => "done",
            Self::Error => "error",
            Self::Inactive => "inactive",
        }
    }

    /// No transitions leave these phases.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Inactive)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` actions.  Runs exactly once per transition.
pub type PhaseActionFn<H> = fn(&mut CycleContext<'_, H>);

/// Signature for the per-poll update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type PhaseUpdateFn<H> = fn(&mut CycleContext<'_, H>) -> Option<Phase>;

// ---------------------------------------------------------------------------
// Phase descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single phase.
pub struct PhaseDescriptor<H> {
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn<H>>,
    pub on_update: PhaseUpdateFn<H>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The phase machine.  One instance per cycle.
pub struct Fsm<H> {
    /// Fixed-size table indexed by `Phase as usize`.
    table: [PhaseDescriptor<H>; Phase::COUNT],
    /// Index of the current phase.
    current: usize,
}

impl<H: Hardware> Fsm<H> {
    pub fn new(table: [PhaseDescriptor<H>; Phase::COUNT], initial: Phase) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut CycleContext<'_, H>) {
        info!("Cycle starting in phase: {}", self.table[self.current].name);
        ctx.on_phase_change(self.current_phase());
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one poll: `on_update` for the current phase, then
    /// `on_enter` of the next one if it asked for a transition.
    pub fn tick(&mut self, ctx: &mut CycleContext<'_, H>) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    pub fn current_phase(&self) -> Phase {
        Phase::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: Phase, ctx: &mut CycleContext<'_, H>) {
        let next_idx = next_id as usize;

        info!(
            "Cycle transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        self.current = next_idx;
        ctx.on_phase_change(next_id);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
