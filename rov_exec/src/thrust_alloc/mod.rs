//! # Thruster allocation module
//!
//! Converts a 6 degree of freedom wrench demand into individual thruster demands. The wrench is
//! multiplied by a mixing matrix derived from the thruster geometry, optionally saturated, and
//! then mapped linearly into the actuation range of the thruster drivers.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod matrix;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::Vector6;
use serde::{Deserialize, Serialize};

// Internal
pub use matrix::*;
pub use params::Params;

use comms_if::eqpt::ThrusterDems;
use util::maths::{self, MathsError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of degrees of freedom in a wrench.
pub const NUM_DOF: usize = comms_if::tc::NUM_DOF;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A combined force/torque demand, in the order surge, sway, heave, roll, pitch, yaw.
pub type Wrench = Vector6<f64>;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Geometry of one thruster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrusterSpec {
    /// Position of the thruster.
    ///
    /// Units: meters,
    /// Frame: Vehicle body
    pub pos_m_vb: [f64; 3],

    /// Direction of the force produced by a positive demand. Not required to be unit length.
    ///
    /// Frame: Vehicle body
    pub dir_vb: [f64; 3],
}

/// Linear mapping from allocator output to actuation units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuationRange {
    pub in_min: f64,
    pub in_max: f64,

    /// Actuation value for `in_min`, e.g. a PWM pulse width
    ///
    /// Units: microseconds
    pub out_min: f64,

    /// Actuation value for `in_max`
    ///
    /// Units: microseconds
    pub out_max: f64,
}

/// Thruster allocator for one vehicle configuration.
#[derive(Debug, Clone)]
pub struct ThrustAlloc {
    matrix: MixingMatrix,
    range: ActuationRange,
    saturation: SaturationMode,
}

/// Output of one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocOutput {
    /// Raw allocator output before saturation.
    pub raw: Vec<f64>,

    /// Demands in actuation units.
    pub dems: ThrusterDems,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Treatment of raw commands which fall outside the actuation input range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationMode {
    /// Commands are mapped as they are, so out of range values extrapolate.
    None,

    /// Each command is clamped into the input range.
    Clamp,

    /// All commands are scaled down together until they fit the input range, keeping the
    /// direction of the resulting wrench.
    Normalise,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AllocError {
    #[error("Actuation input range ({0}, {1}) is degenerate")]
    DegenerateRange(f64, f64),

    #[error("Invalid thruster geometry: {0}")]
    InvalidGeometry(String),

    #[error("Thruster {0} demand is not finite")]
    NonFiniteOutput(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ActuationRange {
    fn default() -> Self {
        Self {
            in_min: -1.0,
            in_max: 1.0,
            out_min: 1000.0,
            out_max: 2000.0,
        }
    }
}

impl ActuationRange {
    /// Map a value into the actuation range.
    ///
    /// Values outside the input range extrapolate linearly, use a `SaturationMode` to limit
    /// them beforehand.
    pub fn map(&self, value: f64) -> Result<f64, AllocError> {
        maths::lin_map(
            (self.in_min, self.in_max),
            (self.out_min, self.out_max),
            value,
        )
        .map_err(|e| match e {
            MathsError::DegenerateRange(a, b) => AllocError::DegenerateRange(a, b),
        })
    }

    /// Check the range can be mapped from.
    pub fn validate(&self) -> Result<(), AllocError> {
        self.map(0.0).map(|_| ())
    }

    /// Lowest and highest values of the input range.
    fn input_bounds(&self) -> (f64, f64) {
        (self.in_min.min(self.in_max), self.in_min.max(self.in_max))
    }
}

impl Default for SaturationMode {
    fn default() -> Self {
        SaturationMode::None
    }
}

impl SaturationMode {
    /// Apply the saturation to a set of raw commands.
    pub fn apply(&self, raw: &[f64], range: &ActuationRange) -> Vec<f64> {
        let (lo, hi) = range.input_bounds();

        match self {
            SaturationMode::None => raw.to_vec(),
            SaturationMode::Clamp => raw
                .iter()
                .map(|v| maths::clamp(*v, Some(lo), Some(hi)))
                .collect(),
            SaturationMode::Normalise => {
                // Largest common scale which brings every command inside the range
                let mut scale = 1f64;
                for v in raw {
                    if *v > hi && hi >= 0.0 {
                        scale = scale.min(hi / v);
                    } else if *v < lo && lo <= 0.0 {
                        scale = scale.min(lo / v);
                    }
                }

                // Ranges which exclude zero cannot be reached by scaling alone
                raw.iter()
                    .map(|v| maths::clamp(v * scale, Some(lo), Some(hi)))
                    .collect()
            }
        }
    }
}

impl ThrustAlloc {
    /// Create a new allocator from the parameters.
    ///
    /// The geometry and the actuation range are validated here so that allocation cannot fail
    /// on bad configuration once the control loop is running.
    pub fn new(params: &Params) -> Result<Self, AllocError> {
        if params.thrusters.is_empty() {
            return Err(AllocError::InvalidGeometry(
                "At least one thruster is required".into(),
            ));
        }

        for (i, t) in params.thrusters.iter().enumerate() {
            if t.pos_m_vb.iter().chain(t.dir_vb.iter()).any(|v| !v.is_finite()) {
                return Err(AllocError::InvalidGeometry(format!(
                    "Thruster {} has a non-finite position or direction",
                    i
                )));
            }
        }

        params.actuation_range.validate()?;

        let matrix = build_mixing_matrix(&params.thrusters);

        let diag = matrix.diagnostics();
        if diag.rank < NUM_DOF {
            warn!(
                "Mixing matrix has rank {} (< {}), some wrench axes cannot be produced",
                diag.rank, NUM_DOF
            );
        }
        debug!("Mixing matrix: {:?}", diag);

        Ok(Self {
            matrix,
            range: params.actuation_range,
            saturation: params.saturation,
        })
    }

    pub fn matrix(&self) -> &MixingMatrix {
        &self.matrix
    }

    pub fn num_thrusters(&self) -> usize {
        self.matrix.num_thrusters()
    }

    /// Allocate, saturate and map a wrench into thruster demands.
    pub fn process(&self, wrench: &Wrench) -> Result<AllocOutput, AllocError> {
        let raw = self.matrix.allocate(wrench);
        check_finite(&raw)?;

        let act = self
            .saturation
            .apply(&raw, &self.range)
            .into_iter()
            .map(|v| self.range.map(v))
            .collect::<Result<Vec<_>, _>>()?;
        check_finite(&act)?;

        Ok(AllocOutput {
            raw,
            dems: ThrusterDems { act },
        })
    }

    /// Demands produced by a zero wrench, i.e. every thruster at the mapped zero.
    pub fn neutral_dems(&self) -> Result<ThrusterDems, AllocError> {
        self.process(&Wrench::zeros()).map(|o| o.dems)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Huge demands can overflow in the matrix product or the range mapping.
fn check_finite(values: &[f64]) -> Result<(), AllocError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(AllocError::NonFiniteOutput(i)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> Params {
        Params {
            thrusters: vec![
                ThrusterSpec {
                    pos_m_vb: [1.0, 0.0, 0.0],
                    dir_vb: [0.0, 0.0, 1.0],
                },
                ThrusterSpec {
                    pos_m_vb: [-1.0, 0.0, 0.0],
                    dir_vb: [0.0, 0.0, 1.0],
                },
                ThrusterSpec {
                    pos_m_vb: [0.0, 0.0, 0.0],
                    dir_vb: [1.0, 0.0, 0.0],
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_map_endpoints() {
        let range = ActuationRange::default();

        assert_eq!(range.map(-1.0), Ok(1000.0));
        assert_eq!(range.map(0.0), Ok(1500.0));
        assert_eq!(range.map(1.0), Ok(2000.0));
        assert_eq!(range.map(1.5), Ok(2250.0));
    }

    #[test]
    fn test_degenerate_range() {
        let range = ActuationRange {
            in_min: 0.5,
            in_max: 0.5,
            ..Default::default()
        };

        assert_eq!(range.map(0.1), Err(AllocError::DegenerateRange(0.5, 0.5)));

        let mut p = params();
        p.actuation_range = range;
        assert!(matches!(
            ThrustAlloc::new(&p),
            Err(AllocError::DegenerateRange(..))
        ));
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(matches!(
            ThrustAlloc::new(&Params::default()),
            Err(AllocError::InvalidGeometry(_))
        ));

        let mut p = params();
        p.thrusters[1].dir_vb[2] = std::f64::NAN;
        assert!(matches!(
            ThrustAlloc::new(&p),
            Err(AllocError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_saturation_modes() {
        let range = ActuationRange::default();
        let raw = [2.0, -0.5, 0.25, -4.0];

        assert_eq!(SaturationMode::None.apply(&raw, &range), raw.to_vec());
        assert_eq!(
            SaturationMode::Clamp.apply(&raw, &range),
            vec![1.0, -0.5, 0.25, -1.0]
        );

        let norm = SaturationMode::Normalise.apply(&raw, &range);
        let expected = [0.5, -0.125, 0.0625, -1.0];
        for (n, e) in norm.iter().zip(expected.iter()) {
            assert_relative_eq!(n, e);
        }

        // In range commands are untouched
        assert_eq!(
            SaturationMode::Normalise.apply(&[0.5, -0.5], &range),
            vec![0.5, -0.5]
        );
    }

    #[test]
    fn test_process() {
        let alloc = ThrustAlloc::new(&params()).unwrap();
        assert_eq!(alloc.num_thrusters(), 3);

        let out = alloc
            .process(&Wrench::new(0.5, 0.0, 1.0, 0.0, 0.0, 0.0))
            .unwrap();

        assert_eq!(out.raw, vec![1.0, 1.0, 0.5]);
        assert_eq!(out.dems.act, vec![2000.0, 2000.0, 1750.0]);
    }

    #[test]
    fn test_process_clamped() {
        let mut p = params();
        p.saturation = SaturationMode::Clamp;
        let alloc = ThrustAlloc::new(&p).unwrap();

        // Pitch demand pushes the vertical thrusters out of range
        let out = alloc
            .process(&Wrench::new(0.0, 0.0, 1.0, 0.0, -1.0, 0.0))
            .unwrap();

        assert_eq!(out.raw, vec![2.0, 0.0, 0.0]);
        assert_eq!(out.dems.act, vec![2000.0, 1500.0, 1500.0]);
    }

    #[test]
    fn test_process_overflow() {
        let alloc = ThrustAlloc::new(&params()).unwrap();

        // Finite demand which overflows once mapped into the actuation range
        assert_eq!(
            alloc.process(&Wrench::new(0.0, 0.0, 1e306, 0.0, 0.0, 0.0)),
            Err(AllocError::NonFiniteOutput(0))
        );

        // Overflow in the matrix product itself
        assert!(matches!(
            alloc.process(&Wrench::new(0.0, 0.0, 1e308, 0.0, -1e308, 0.0)),
            Err(AllocError::NonFiniteOutput(_))
        ));
    }

    #[test]
    fn test_neutral() {
        let alloc = ThrustAlloc::new(&params()).unwrap();

        assert_eq!(alloc.neutral_dems().unwrap().act, vec![1500.0; 3]);
    }
}
