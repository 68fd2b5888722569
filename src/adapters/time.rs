//! Wall-clock adapter.
//!
//! Implements [`Clock`] over the system clock; `sleep` blocks the driver
//! loop's thread.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::app::ports::Clock;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
