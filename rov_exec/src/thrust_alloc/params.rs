//! Parameters structure for ThrustAlloc

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{ActuationRange, SaturationMode, ThrusterSpec};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for thrust allocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Params {
    // ---- GEOMETRY ----
    /// Ordered list of the vehicle's thrusters. The order here is the order of the demands sent
    /// to the hardware.
    pub thrusters: Vec<ThrusterSpec>,

    // ---- ACTUATION ----
    /// Range mapping between allocator output and actuation units.
    #[serde(default)]
    pub actuation_range: ActuationRange,

    /// What to do with raw commands outside the input range.
    #[serde(default)]
    pub saturation: SaturationMode,
}
