//! Parameters structure for the control pipeline

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::time::Duration;

use crate::pid::{PidParams, PidParamsError};
use comms_if::tc::{Dof, NUM_DOF};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the control pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Params {
    /// How command values are turned into a wrench.
    #[serde(default)]
    pub mode: CtrlMode,

    /// Maximum time to wait for a stage to respond. If unset stages are waited on
    /// indefinitely.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub stage_timeout_ms: Option<u64>,

    /// Controller for each axis, only used in `CtrlMode::Pid`.
    #[serde(default)]
    pub pid: AxisPidParams,
}

/// One set of controller parameters per axis.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AxisPidParams {
    #[serde(default)]
    pub surge: PidParams,
    #[serde(default)]
    pub sway: PidParams,
    #[serde(default)]
    pub heave: PidParams,
    #[serde(default)]
    pub roll: PidParams,
    #[serde(default)]
    pub pitch: PidParams,
    #[serde(default)]
    pub yaw: PidParams,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtrlMode {
    /// Command values are the wrench, allocated as they are.
    Direct,

    /// Command values are setpoints for the per-axis controllers, whose outputs are
    /// allocated.
    Pid,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CtrlMode {
    fn default() -> Self {
        CtrlMode::Direct
    }
}

impl Params {
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }
}

impl AxisPidParams {
    /// Get the parameters for one axis.
    pub fn get(&self, dof: Dof) -> &PidParams {
        match dof {
            Dof::Surge => &self.surge,
            Dof::Sway => &self.sway,
            Dof::Heave => &self.heave,
            Dof::Roll => &self.roll,
            Dof::Pitch => &self.pitch,
            Dof::Yaw => &self.yaw,
        }
    }

    /// Parameters for every axis in wire order.
    pub fn to_array(&self) -> [PidParams; NUM_DOF] {
        let mut arr = [PidParams::default(); NUM_DOF];
        for dof in Dof::ALL.iter() {
            arr[dof.index()] = *self.get(*dof);
        }
        arr
    }

    /// Validate every axis, reporting the first failure.
    pub fn validate(&self) -> Result<(), (Dof, PidParamsError)> {
        for dof in Dof::ALL.iter() {
            self.get(*dof).validate().map_err(|e| (*dof, e))?;
        }
        Ok(())
    }
}
