//! Linux sysfs GPIO pin.
//!
//! Exports a BCM line under `/sys/class/gpio`, sets its direction and
//! reads or writes its `value` file.  Implements the embedded-hal digital
//! traits so relays and the level sensor stay generic over the pin type.
//!
//! The sysfs root is injectable so tests can run against a temp dir.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use log::debug;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// I/O error on a sysfs value file.
#[derive(Debug)]
pub struct SysfsGpioError {
    pub pin: u32,
    pub source: io::Error,
}

impl core::fmt::Display for SysfsGpioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "GPIO {}: {}", self.pin, self.source)
    }
}

impl std::error::Error for SysfsGpioError {}

impl embedded_hal::digital::Error for SysfsGpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    pub fn output(pin: u32) -> io::Result<Self> {
        Self::open(Path::new(SYSFS_GPIO_ROOT), pin, Direction::Out)
    }

    pub fn input(pin: u32) -> io::Result<Self> {
        Self::open(Path::new(SYSFS_GPIO_ROOT), pin, Direction::In)
    }

    /// Export `pin` under `root` (unless already exported) and set its
    /// direction.
    pub fn open(root: &Path, pin: u32, direction: Direction) -> io::Result<Self> {
        let dir = root.join(format!("gpio{pin}"));
        if !dir.exists() {
            debug!("Exporting GPIO {}", pin);
            fs::write(root.join("export"), pin.to_string())?;
        }
        fs::write(dir.join("direction"), direction.as_str())?;
        Ok(Self {
            pin,
            value_path: dir.join("value"),
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    fn write(&self, level: &str) -> Result<(), SysfsGpioError> {
        fs::write(&self.value_path, level).map_err(|source| SysfsGpioError {
            pin: self.pin,
            source,
        })
    }

    fn read(&self) -> Result<bool, SysfsGpioError> {
        let raw = fs::read_to_string(&self.value_path).map_err(|source| SysfsGpioError {
            pin: self.pin,
            source,
        })?;
        Ok(raw.trim() == "1")
    }
}

impl ErrorType for SysfsPin {
    type Error = SysfsGpioError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write("0")
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write("1")
    }
}

impl InputPin for SysfsPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.read()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.read().map(|high| !high)
    }
}
