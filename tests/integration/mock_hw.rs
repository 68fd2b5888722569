//! Recording adapters for integration tests.
//!
//! [`RecordingBench`] wraps the simulated bench and records every switch
//! call so tests can assert on the full command history.
//! [`RecordingObserver`] keeps every status snapshot the aggregator
//! broadcasts.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chemostat::adapters::sim::{SimBench, SimVessel};
use chemostat::app::events::DeviceEvent;
use chemostat::app::ports::{Clock, DeviceId, DevicePort, SensorPort, StatusObserver};
use chemostat::config::ChemostatConfig;
use chemostat::error::{ActuatorError, SensorError};
use chemostat::fsm::Phase;
use chemostat::status::{StatusHub, SystemStatus};
use chrono::{DateTime, Utc};

// ── RecordingBench ────────────────────────────────────────────

pub struct RecordingBench {
    pub sim: SimBench,
    pub calls: Vec<(DeviceId, bool)>,
}

#[allow(dead_code)]
impl RecordingBench {
    pub fn new(sim: SimBench) -> Self {
        Self {
            sim,
            calls: Vec::new(),
        }
    }

    pub fn any_pump_on(&self) -> bool {
        DeviceId::PUMPS.iter().any(|d| self.sim.is_on(*d))
    }

    /// Switch-on calls for `device`.
    pub fn starts(&self, device: DeviceId) -> usize {
        self.calls
            .iter()
            .filter(|(d, on)| *d == device && *on)
            .count()
    }
}

impl DevicePort for RecordingBench {
    fn switch(&mut self, device: DeviceId, on: bool) -> Result<DeviceEvent, ActuatorError> {
        self.calls.push((device, on));
        self.sim.switch(device, on)
    }

    fn is_on(&self, device: DeviceId) -> bool {
        self.sim.is_on(device)
    }

    fn on_time(&self, device: DeviceId) -> Duration {
        self.sim.on_time(device)
    }
}

impl SensorPort for RecordingBench {
    fn water_level_exceeded(&mut self) -> Result<bool, SensorError> {
        self.sim.water_level_exceeded()
    }

    fn temperature_c(&mut self) -> Result<f32, SensorError> {
        self.sim.temperature_c()
    }
}

impl Clock for RecordingBench {
    fn now(&self) -> DateTime<Utc> {
        self.sim.now()
    }

    fn sleep(&mut self, duration: Duration) {
        self.sim.sleep(duration);
    }
}

// ── RecordingObserver ─────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub snapshots: Rc<RefCell<Vec<SystemStatus>>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct cycle phases seen, in order, collapsing repeats.
    pub fn phases(&self) -> Vec<Phase> {
        let mut out: Vec<Phase> = Vec::new();
        for s in self.snapshots.borrow().iter() {
            let p = s.cycle.phase();
            if out.last() != Some(&p) {
                out.push(p);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.snapshots.borrow().len()
    }
}

impl StatusObserver for RecordingObserver {
    fn notify(&mut self, status: &SystemStatus) {
        self.snapshots.borrow_mut().push(status.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// Flows 2 mL/s, 800 mL reactor → 100 mL per cycle, no settle or pauses,
/// heating off so the thermostat only stirs.
#[allow(dead_code)]
pub fn scenario_config() -> ChemostatConfig {
    ChemostatConfig {
        reactor_volume_ml: Some(800.0),
        max_vessel_volume_ml: 1500.0,
        volumes_per_hour: 0.5,
        cycles_per_hour: 4.0,
        inlet_flow_ml_per_s: 2.0,
        outlet_flow_ml_per_s: 2.0,
        settle_enabled: false,
        phase_pause_secs: 0,
        heating_enabled: false,
        ..ChemostatConfig::default()
    }
}

/// Vessel at 500 mL whose sensor sits at `threshold_ml`.
#[allow(dead_code)]
pub fn bench(threshold_ml: f32) -> RecordingBench {
    RecordingBench::new(SimBench::new(SimVessel::new(500.0, threshold_ml, 1500.0)).with_flows(2.0, 2.0))
}

#[allow(dead_code)]
pub fn hub_with_recorder(now: DateTime<Utc>) -> (StatusHub, RecordingObserver) {
    let recorder = RecordingObserver::new();
    let hub = StatusHub::new(now).with_observer(Box::new(recorder.clone()));
    (hub, recorder)
}
