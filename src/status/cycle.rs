//! The in-progress exchange, as seen by presenters.

use serde::Serialize;

use crate::fsm::Phase;

/// One media exchange: what it is aiming for, how long each pump has run,
/// and where it is in the phase sequence.
///
/// Pump on-times are the only accounting; volumes are derived from them
/// and the calibrated flow rates, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleRecord {
    target_volume_ml: f32,
    inlet_ontime_secs: f32,
    outlet_ontime_secs: f32,
    phase: Phase,
    inlet_flow_ml_per_s: f32,
    outlet_flow_ml_per_s: f32,
}

impl Default for CycleRecord {
    fn default() -> Self {
        Self::inactive()
    }
}

impl CycleRecord {
    /// A fresh record in phase `Start`.
    pub fn new(target_volume_ml: f32, inlet_flow_ml_per_s: f32, outlet_flow_ml_per_s: f32) -> Self {
        Self {
            target_volume_ml,
            inlet_ontime_secs: 0.0,
            outlet_ontime_secs: 0.0,
            phase: Phase::Start,
            inlet_flow_ml_per_s,
            outlet_flow_ml_per_s,
        }
    }

    /// The placeholder held between cycles.
    pub const fn inactive() -> Self {
        Self {
            target_volume_ml: 0.0,
            inlet_ontime_secs: 0.0,
            outlet_ontime_secs: 0.0,
            phase: Phase::Inactive,
            inlet_flow_ml_per_s: 0.0,
            outlet_flow_ml_per_s: 0.0,
        }
    }

    pub fn target_volume_ml(&self) -> f32 {
        self.target_volume_ml
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Inactive
    }

    pub fn inlet_ontime_secs(&self) -> f32 {
        self.inlet_ontime_secs
    }

    pub fn outlet_ontime_secs(&self) -> f32 {
        self.outlet_ontime_secs
    }

    /// Media pumped in so far (mL).
    pub fn in_volume(&self) -> f32 {
        self.inlet_ontime_secs * self.inlet_flow_ml_per_s
    }

    /// Media pumped out so far (mL).
    pub fn out_volume(&self) -> f32 {
        self.outlet_ontime_secs * self.outlet_flow_ml_per_s
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Record the pump on-times accumulated since the cycle began.
    /// On-times never move backwards within a cycle.
    pub(crate) fn update_ontimes(&mut self, inlet_secs: f32, outlet_secs: f32) {
        self.inlet_ontime_secs = self.inlet_ontime_secs.max(inlet_secs);
        self.outlet_ontime_secs = self.outlet_ontime_secs.max(outlet_secs);
    }
}
