//! # Equipment Interface
//!
//! This module defines the structures exchanged with the vehicle's equipment: demands sent to
//! the thrusters and the readings returned by the hardware.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands sent to the thruster drivers, one value per thruster in actuation units (e.g. PWM
/// pulse width in microseconds).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ThrusterDems {
    pub act: Vec<f64>,
}

/// A reading returned by the hardware after actuation, as reported by the device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SensReading(pub String);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ThrusterDems {
    /// Number of thrusters addressed by these demands.
    pub fn len(&self) -> usize {
        self.act.len()
    }

    pub fn is_empty(&self) -> bool {
        self.act.is_empty()
    }

    /// Format the demands the way the thruster driver board expects them, rounded to whole
    /// units and terminated by the role marker, e.g. `1500,1500,1500,1500,1500,1500R`.
    pub fn to_driver_string(&self, role: &str) -> String {
        let fields: Vec<String> = self
            .act
            .iter()
            .map(|v| format!("{}", v.round() as i64))
            .collect();

        format!("{}{}", fields.join(","), role)
    }
}
