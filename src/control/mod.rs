//! Peer controllers that run between cycles: hotplate thermostat and
//! bubbler duty cycle.

pub mod aeration;
pub mod thermal;

pub use aeration::AerationRegulator;
pub use thermal::ThermalRegulator;
