//! # Ground Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::tc::DEFAULT_ROLE_MARKER;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the surface station. Network addresses are taken from `net.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GndExecParams {
    /// Change in demand applied by one key press
    #[serde(default = "default_step")]
    pub key_step: f64,

    /// Role marker appended to every command
    #[serde(default = "default_role")]
    pub role: String,

    /// Hold time used for script lines which do not give one
    ///
    /// Units: seconds
    #[serde(default)]
    pub default_hold_s: f64,
}

impl Default for GndExecParams {
    fn default() -> Self {
        Self {
            key_step: default_step(),
            role: default_role(),
            default_hold_s: 0.0,
        }
    }
}

fn default_step() -> f64 {
    0.1
}

fn default_role() -> String {
    DEFAULT_ROLE_MARKER.to_string()
}
