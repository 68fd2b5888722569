//! Application core: pure domain logic, zero direct I/O.
//!
//! This module contains the business rules for the chemostat: cycle
//! scheduling, thermal and aeration control, timed auto-off and operator
//! commands.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! against the simulated bench.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod timers;
