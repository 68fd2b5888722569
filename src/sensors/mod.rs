//! Sensor drivers: vessel level switch and 1-Wire thermometer.
//!
//! Both are wrapped by the GPIO bench adapter, which exposes them through
//! the [`SensorPort`](crate::app::ports::SensorPort).

pub mod temperature;
pub mod water_level;

pub use temperature::W1Thermometer;
pub use water_level::WaterLevelSensor;
