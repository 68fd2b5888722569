//! DS18B20 1-Wire thermometer via the Linux `w1_therm` driver.
//!
//! The kernel exposes each sensor as `/sys/bus/w1/devices/28-*/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line carries the CRC verdict, the second the temperature in
//! milli-degrees Celsius.

use std::fs;
use std::path::PathBuf;

use crate::error::SensorError;

/// DS18B20 datasheet range.
const MIN_C: f32 = -55.0;
const MAX_C: f32 = 125.0;

pub struct W1Thermometer {
    path: Option<PathBuf>,
}

impl W1Thermometer {
    /// `None` means no thermometer is fitted; every read reports `NotPresent`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn read(&self) -> Result<f32, SensorError> {
        let path = self.path.as_ref().ok_or(SensorError::NotPresent)?;
        let raw = fs::read_to_string(path).map_err(|_| SensorError::NotPresent)?;
        parse_w1_slave(&raw)
    }
}

/// Parse a `w1_slave` dump into °C.
pub fn parse_w1_slave(raw: &str) -> Result<f32, SensorError> {
    let mut lines = raw.lines();
    let crc_line = lines.next().ok_or(SensorError::Malformed)?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::Malformed);
    }
    let data_line = lines.next().ok_or(SensorError::Malformed)?;
    let (_, milli) = data_line.rsplit_once("t=").ok_or(SensorError::Malformed)?;
    let milli: i32 = milli.trim().parse().map_err(|_| SensorError::Malformed)?;
    let celsius = milli as f32 / 1000.0;
    if !(MIN_C..=MAX_C).contains(&celsius) {
        return Err(SensorError::OutOfRange);
    }
    Ok(celsius)
}
