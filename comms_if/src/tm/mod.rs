//! # Telemetry module
//!
//! Telemetry records are sent from the vehicle to the surface once per control cycle, as the
//! JSON payload of a single frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    eqpt::{SensReading, ThrusterDems},
    tc::NUM_DOF,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry produced by one control cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tm {
    /// Number of the cycle which produced this record, starting at zero.
    pub cycle: u64,

    /// Time the record was produced.
    pub timestamp: DateTime<Utc>,

    /// What the vehicle did with the command which started the cycle.
    pub cmd_status: CmdStatus,

    /// Command values received from the surface.
    pub demand: Option<[f64; NUM_DOF]>,

    /// Measured value of each axis used as controller feedback.
    pub axis_meas: Option<[f64; NUM_DOF]>,

    /// Output of the per-axis controllers, if running in closed loop.
    pub pid_output: Option<[f64; NUM_DOF]>,

    /// Wrench passed to the thruster allocator.
    pub wrench: Option<[f64; NUM_DOF]>,

    /// Raw allocator output, one value per thruster.
    pub thr_raw: Vec<f64>,

    /// Demands sent to the thrusters.
    pub thr_dems: Option<ThrusterDems>,

    /// Auxiliary command channels, passed through.
    pub aux: Vec<f64>,

    /// Reading returned by the hardware, or `None` if the hardware was unavailable.
    pub sens_reading: Option<SensReading>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Status of the command that started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmdStatus {
    /// The command was executed.
    Ok,

    /// The command could not be parsed and was ignored.
    Invalid,

    /// The vehicle has been stopped and the session is ending.
    Stopped,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tm {
    /// Create an empty record for the given cycle, timestamped now.
    pub fn new(cycle: u64, cmd_status: CmdStatus) -> Self {
        Self {
            cycle,
            timestamp: Utc::now(),
            cmd_status,
            demand: None,
            axis_meas: None,
            pid_output: None,
            wrench: None,
            thr_raw: Vec::new(),
            thr_dems: None,
            aux: Vec::new(),
            sens_reading: None,
        }
    }
}
