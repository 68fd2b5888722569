//! Chemostat media-exchange controller library.
//!
//! Exposes the controller's modules to the binary and to the integration
//! tests.  Everything above the adapters is hardware-agnostic and runs
//! unchanged against the simulated bench.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod scheduler;
pub mod sensors;
pub mod status;
