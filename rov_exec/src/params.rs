//! # Rover Executable Parameters
//!
//! This module provide parameters for the vehicle executable, loaded from `rov_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{ctrl_pipeline, eqpt, thrust_alloc};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RovExecParams {
    /// Thruster geometry and actuation mapping
    pub thrust_alloc: thrust_alloc::Params,

    /// Control mode, stage timeouts and per-axis controllers
    #[serde(default)]
    pub ctrl: ctrl_pipeline::Params,

    /// Hardware selection
    #[serde(default)]
    pub eqpt: eqpt::Params,
}
