//! Mixing matrix construction and allocation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector, Vector3};
use serde::Serialize;

// Internal
use super::{ThrusterSpec, Wrench, NUM_DOF};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Singular values below this are treated as zero when computing the rank.
pub const RANK_EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The N x 6 matrix mapping a wrench onto N thruster commands.
///
/// Row `i` is `[dir_i, pos_i x dir_i]`. The matrix is never modified after it has been built.
#[derive(Debug, Clone, PartialEq)]
pub struct MixingMatrix {
    matrix: DMatrix<f64>,
}

/// Conditioning of a mixing matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatrixDiagnostics {
    /// Numerical rank. Full six degree of freedom control needs a rank of 6.
    pub rank: usize,

    /// Ratio of the largest to the smallest singular value, infinite if the smallest is zero.
    pub condition_number: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the mixing matrix for an ordered set of thrusters.
///
/// Directions are used as given, without normalisation.
pub fn build_mixing_matrix(specs: &[ThrusterSpec]) -> MixingMatrix {
    let mut matrix = DMatrix::<f64>::zeros(specs.len(), NUM_DOF);

    for (i, spec) in specs.iter().enumerate() {
        let pos = Vector3::from(spec.pos_m_vb);
        let dir = Vector3::from(spec.dir_vb);
        let torque = pos.cross(&dir);

        for j in 0..3 {
            matrix[(i, j)] = dir[j];
            matrix[(i, j + 3)] = torque[j];
        }
    }

    MixingMatrix { matrix }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MixingMatrix {
    /// Number of thrusters, i.e. rows.
    pub fn num_thrusters(&self) -> usize {
        self.matrix.nrows()
    }

    /// Get the wrench contribution of one thruster, `None` if there is no such thruster.
    pub fn row(&self, thruster: usize) -> Option<[f64; NUM_DOF]> {
        if thruster >= self.num_thrusters() {
            return None;
        }

        let mut row = [0f64; NUM_DOF];
        for (j, r) in row.iter_mut().enumerate() {
            *r = self.matrix[(thruster, j)];
        }
        Some(row)
    }

    /// Compute the raw thruster commands for the wrench as `matrix * wrench`.
    ///
    /// Commands are not limited to any range. Rank deficient matrices are accepted.
    pub fn allocate(&self, wrench: &Wrench) -> Vec<f64> {
        let w = DVector::from_column_slice(wrench.as_slice());

        (&self.matrix * w).iter().copied().collect()
    }

    /// Rank and condition number of the matrix.
    pub fn diagnostics(&self) -> MatrixDiagnostics {
        if self.matrix.is_empty() {
            return MatrixDiagnostics {
                rank: 0,
                condition_number: std::f64::INFINITY,
            };
        }

        let sv = self.matrix.clone().svd(false, false).singular_values;
        let max = sv.iter().cloned().fold(0f64, f64::max);
        let min = sv.iter().cloned().fold(std::f64::INFINITY, f64::min);

        // Fewer thrusters than axes always leaves some of the wrench uncontrolled
        let condition_number = if min <= 0f64 || sv.len() < NUM_DOF {
            std::f64::INFINITY
        } else {
            max / min
        };

        MatrixDiagnostics {
            rank: sv.iter().filter(|s| **s > RANK_EPS).count(),
            condition_number,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
