//! # Equipment collaborators
//!
//! Interfaces to the hardware driven by the control pipeline. The thruster drivers are an
//! [`Actuator`], anything providing measurements of the vehicle's axes for closed loop control
//! is an [`AxisSensor`]. Dry run implementations allow the vehicle executable to run without
//! any hardware attached.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Deserialize;

// Internal
use comms_if::{
    eqpt::{SensReading, ThrusterDems},
    tc::{DEFAULT_ROLE_MARKER, NUM_DOF},
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which executes thruster demands.
pub trait Actuator {
    /// Send the demands to the hardware, returning the reading the hardware reports back.
    fn actuate(&mut self, dems: &ThrusterDems) -> Result<SensReading, EqptError>;
}

/// Something which measures the current value of each axis.
pub trait AxisSensor {
    /// Get the current measurement, in the order surge, sway, heave, roll, pitch, yaw.
    fn sense(&mut self) -> Result<[f64; NUM_DOF], EqptError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Equipment selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub actuator: ActuatorSel,

    #[serde(default)]
    pub sensor: SensorSel,
}

/// Actuator which only logs the demands it is given.
///
/// The returned reading echoes the demands in the format used by the driver board.
#[derive(Debug, Clone)]
pub struct DryRunActuator {
    role: String,
    num_actuations: u64,
}

/// Sensor which always reports the same measurement.
#[derive(Debug, Clone, Copy)]
pub struct FixedSensor {
    values: [f64; NUM_DOF],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActuatorSel {
    DryRun {
        #[serde(default = "default_role")]
        role: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorSel {
    /// No sensing, closed loop control is unavailable.
    None,

    /// Report fixed values on every axis.
    Fixed { values: [f64; NUM_DOF] },
}

#[derive(Debug, thiserror::Error)]
pub enum EqptError {
    #[error("Hardware is unavailable: {0}")]
    HardwareUnavailable(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ActuatorSel {
    fn default() -> Self {
        ActuatorSel::DryRun {
            role: default_role(),
        }
    }
}

impl Default for SensorSel {
    fn default() -> Self {
        SensorSel::None
    }
}

impl ActuatorSel {
    /// Build the selected actuator.
    pub fn build(&self) -> Box<dyn Actuator + Send> {
        match self {
            ActuatorSel::DryRun { role } => Box::new(DryRunActuator::new(role)),
        }
    }
}

impl SensorSel {
    /// Build the selected sensor, if any.
    pub fn build(&self) -> Option<Box<dyn AxisSensor + Send>> {
        match self {
            SensorSel::None => None,
            SensorSel::Fixed { values } => Some(Box::new(FixedSensor::new(*values))),
        }
    }
}

impl DryRunActuator {
    pub fn new(role: &str) -> Self {
        Self {
            role: role.to_string(),
            num_actuations: 0,
        }
    }
}

impl Actuator for DryRunActuator {
    fn actuate(&mut self, dems: &ThrusterDems) -> Result<SensReading, EqptError> {
        let line = dems.to_driver_string(&self.role);
        self.num_actuations += 1;

        debug!("Dry run actuation {}: {}", self.num_actuations, line);

        Ok(SensReading(line))
    }
}

impl FixedSensor {
    pub fn new(values: [f64; NUM_DOF]) -> Self {
        Self { values }
    }
}

impl AxisSensor for FixedSensor {
    fn sense(&mut self) -> Result<[f64; NUM_DOF], EqptError> {
        trace!("Fixed sensor: {:?}", self.values);
        Ok(self.values)
    }
}

fn default_role() -> String {
    DEFAULT_ROLE_MARKER.to_string()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run() {
        let mut act = DryRunActuator::new("R");

        let reading = act
            .actuate(&ThrusterDems {
                act: vec![1500.0, 1750.0],
            })
            .unwrap();

        assert_eq!(reading, SensReading("1500,1750R".into()));
    }

    #[test]
    fn test_selection() {
        let params: Params = util::params::from_str(
            r#"
            [actuator]
            type = "dry_run"

            [sensor]
            type = "fixed"
            values = [0.0, 0.0, 0.5, 0.0, 0.0, 0.0]
            "#,
        )
        .unwrap();

        let mut sensor = params.sensor.build().unwrap();
        assert_eq!(sensor.sense().unwrap()[2], 0.5);

        let mut act = params.actuator.build();
        assert!(act.actuate(&ThrusterDems { act: vec![] }).is_ok());

        let defaults: Params = util::params::from_str("").unwrap();
        assert!(defaults.sensor.build().is_none());
    }
}
