//! GPIO pin assignments for the chemostat relay hat (BCM numbering).
//!
//! Single source of truth for the defaults in
//! [`PinMap`](crate::config::PinMap); a config file can override any of them.

// ---------------------------------------------------------------------------
// Relay outputs
// ---------------------------------------------------------------------------

/// Fresh-media peristaltic pump relay.
pub const MEDIA_IN_GPIO: u32 = 27;
/// Spent-media peristaltic pump relay.
pub const MEDIA_OUT_GPIO: u32 = 22;
/// Bubbler air pump relay (supplemental channel).
pub const AIR_PUMP_GPIO: u32 = 25;
/// Stirring hotplate relay.
pub const HOTPLATE_GPIO: u32 = 5;
/// UV LED driver enable.
pub const UV_LED_GPIO: u32 = 6;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Optical / capacitive level sensor, HIGH when wet.
pub const WATER_LEVEL_GPIO: u32 = 17;

// The DS18B20 thermometer sits on the kernel's 1-Wire bus (BCM 4 by
// default) and is read through sysfs, not through a pin here.
