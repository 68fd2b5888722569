//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements             | Connects to                 |
//! |---------------|------------------------|-----------------------------|
//! | `hardware`    | DevicePort             | Relay board (sysfs GPIO)    |
//! |               | SensorPort             | Level switch, DS18B20       |
//! |               | Clock                  | System clock                |
//! | `sim`         | DevicePort, SensorPort | Virtual vessel model        |
//! |               | Clock                  | Virtual clock               |
//! | `console`     | StatusObserver         | Logger (4×20 display pages) |
//! | `config_file` | ConfigPort             | JSON file                   |
//! | `time`        | Clock                  | System clock                |

pub mod config_file;
pub mod console;
pub mod hardware;
pub mod sim;
pub mod time;
