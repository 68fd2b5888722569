//! Relay channel driver.
//!
//! One relay per device on the relay board.  Tracks logical state and
//! cumulative on-time; the pin polarity is handled here so the rest of the
//! crate only ever says "on" or "off".
//!
//! ## Safety contract
//!
//! The driver is a dumb actuator: it never refuses a command.  Interlocks
//! live in the cycle engine and the application service.

use std::time::{Duration, Instant};

use embedded_hal::digital::OutputPin;

pub struct Relay<P> {
    pin: P,
    active_low: bool,
    on: bool,
    accumulated: Duration,
    on_since: Option<Instant>,
}

impl<P: OutputPin> Relay<P> {
    /// Wrap `pin` without driving it.  Call [`switch`](Self::switch) with
    /// `false` to put the relay in a known state.
    pub fn new(pin: P, active_low: bool) -> Self {
        Self {
            pin,
            active_low,
            on: false,
            accumulated: Duration::ZERO,
            on_since: None,
        }
    }

    /// Drive the relay.  State and on-time only change if the pin write
    /// succeeded.  Returns the cumulative on-time afterwards.
    pub fn switch(&mut self, on: bool) -> Result<Duration, P::Error> {
        let high = on != self.active_low;
        if high {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }

        match (self.on, on) {
            (false, true) => self.on_since = Some(Instant::now()),
            (true, false) => {
                if let Some(since) = self.on_since.take() {
                    self.accumulated += since.elapsed();
                }
            }
            _ => {}
        }
        self.on = on;
        Ok(self.on_time())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Cumulative on-time including the current run.
    pub fn on_time(&self) -> Duration {
        self.accumulated + self.on_since.map_or(Duration::ZERO, |s| s.elapsed())
    }
}
