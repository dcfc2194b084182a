//! # PID Axis Controller
//!
//! A single degree of freedom feedback controller with optional clamping of both the integral
//! accumulation and the output. The dispatcher owns one controller per axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and bounds for one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    #[serde(default)]
    pub k_i: f64,

    /// Derivative gain
    #[serde(default)]
    pub k_d: f64,

    /// Lower bound on the integral accumulation
    #[serde(default)]
    pub i_min: Option<f64>,

    /// Upper bound on the integral accumulation
    #[serde(default)]
    pub i_max: Option<f64>,

    /// Lower bound on the output
    #[serde(default)]
    pub out_min: Option<f64>,

    /// Upper bound on the output
    #[serde(default)]
    pub out_max: Option<f64>,
}

/// A PID controller
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    params: PidParams,

    /// Target value of the controlled quantity
    setpoint: f64,

    /// The integral accumulation
    integral: f64,

    /// Previous error
    prev_error: f64,

    /// Time of the previous update, unset before the first update
    ///
    /// Units: seconds
    prev_time: Option<f64>,

    /// Terms calculated during the last update
    last_terms: PidTerms,
}

/// The individual terms making up one controller output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PidTerms {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PidParamsError {
    #[error("Gain {0} is not finite")]
    NonFiniteGain(&'static str),

    #[error("Integral bounds are inverted (min {0} > max {1})")]
    InvertedIntegralBounds(f64, f64),

    #[error("Output bounds are inverted (min {0} > max {1})")]
    InvertedOutputBounds(f64, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidParams {
    /// Unbounded controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            ..Default::default()
        }
    }

    /// Check the gains are usable and the bounds are ordered.
    pub fn validate(&self) -> Result<(), PidParamsError> {
        for (name, gain) in [("k_p", self.k_p), ("k_i", self.k_i), ("k_d", self.k_d)].iter() {
            if !gain.is_finite() {
                return Err(PidParamsError::NonFiniteGain(*name));
            }
        }

        if let (Some(min), Some(max)) = (self.i_min, self.i_max) {
            if min > max {
                return Err(PidParamsError::InvertedIntegralBounds(min, max));
            }
        }

        if let (Some(min), Some(max)) = (self.out_min, self.out_max) {
            if min > max {
                return Err(PidParamsError::InvertedOutputBounds(min, max));
            }
        }

        Ok(())
    }
}

impl PidController {
    /// Create a new controller from the given parameters, with a zero setpoint.
    pub fn new(params: PidParams) -> Self {
        Self {
            params,
            setpoint: 0f64,
            integral: 0f64,
            prev_error: 0f64,
            prev_time: None,
            last_terms: PidTerms::default(),
        }
    }

    /// Set the target value. The integral and derivative state are not affected.
    pub fn set_target(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn target(&self) -> f64 {
        self.setpoint
    }

    /// Current value of the integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Terms calculated by the last call to `update`.
    pub fn last_terms(&self) -> PidTerms {
        self.last_terms
    }

    /// Get the controller output for the given measurement.
    ///
    /// `current_time` is in seconds and must be on the same timebase for every call. On the
    /// first call after construction or `reset` no integral is accumulated and the derivative
    /// term is zero.
    pub fn update(&mut self, current_value: f64, current_time: f64) -> f64 {
        let error = self.setpoint - current_value;

        let dt = match self.prev_time {
            Some(t0) => current_time - t0,
            None => 0f64,
        };

        if self.prev_time.is_some() {
            self.integral = clamp(
                self.integral + error * dt,
                self.params.i_min,
                self.params.i_max,
            );
        }

        let p = self.params.k_p * error;
        let i = self.params.k_i * self.integral;

        // No derivative on zero (or backwards) time steps
        let d = if dt > 0f64 {
            self.params.k_d * (error - self.prev_error) / dt
        } else {
            0f64
        };

        self.last_terms = PidTerms { p, i, d };

        self.prev_error = error;
        self.prev_time = Some(current_time);

        clamp(p + i + d, self.params.out_min, self.params.out_max)
    }

    /// Clear the integral and derivative state, the next update behaves as a first call.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = 0f64;
        self.prev_time = None;
        self.last_terms = PidTerms::default();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_proportional_only() {
        let mut pid = PidController::new(PidParams::new(1.0, 0.0, 0.0));
        pid.set_target(0.0);

        assert_eq!(pid.update(0.4, 10.0), -0.4);
    }

    #[test]
    fn test_first_call() {
        let mut pid = PidController::new(PidParams::new(1.0, 2.0, 3.0));
        pid.set_target(1.0);

        let out = pid.update(0.0, 5.0);

        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.last_terms().d, 0.0);
        assert_eq!(pid.last_terms().i, 0.0);
        assert_eq!(out, 1.0);
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut pid = PidController::new(PidParams::new(0.0, 1.0, 1.0));
        pid.set_target(1.0);

        pid.update(0.0, 0.0);
        let out = pid.update(0.5, 0.5);

        // error = 0.5, integral = 0.5 * 0.5, derivative = (0.5 - 1.0) / 0.5
        assert_relative_eq!(pid.integral(), 0.25);
        assert_relative_eq!(pid.last_terms().d, -1.0);
        assert_relative_eq!(out, 0.25 - 1.0);
    }

    #[test]
    fn test_zero_dt() {
        let mut pid = PidController::new(PidParams::new(0.0, 1.0, 1.0));
        pid.set_target(1.0);

        pid.update(0.0, 2.0);
        pid.update(0.5, 2.0);

        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.last_terms().d, 0.0);
    }

    #[test]
    fn test_clamp_invariants() {
        let params = PidParams {
            k_p: 3.0,
            k_i: 2.0,
            k_d: 0.5,
            i_min: Some(-0.2),
            i_max: Some(0.3),
            out_min: Some(-1.0),
            out_max: Some(0.8),
        };
        params.validate().unwrap();

        let mut pid = PidController::new(params);
        pid.set_target(0.5);

        // Drive the measurement around so both bounds are hit
        for i in 0..200 {
            let t = i as f64 * 0.05;
            let meas = 2.0 * (t * 1.7).sin();
            let out = pid.update(meas, t);

            assert!(out >= -1.0 && out <= 0.8, "output {} out of bounds", out);
            assert!(pid.integral() >= -0.2 && pid.integral() <= 0.3);
        }
    }

    #[test]
    fn test_reset() {
        let mut pid = PidController::new(PidParams::new(1.0, 1.0, 1.0));
        pid.set_target(1.0);

        pid.update(0.0, 0.0);
        pid.update(0.2, 1.0);
        assert!(pid.integral() != 0.0);

        pid.reset();
        assert_eq!(pid.integral(), 0.0);

        // Next update is a first call again, setpoint is kept
        let out = pid.update(0.0, 7.0);
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.last_terms().d, 0.0);
        assert_eq!(out, 1.0);
        assert_eq!(pid.target(), 1.0);
    }

    #[test]
    fn test_set_target_keeps_state() {
        let mut pid = PidController::new(PidParams::new(0.0, 1.0, 0.0));
        pid.set_target(1.0);
        pid.update(0.0, 0.0);
        pid.update(0.0, 1.0);

        pid.set_target(-4.0);

        assert_eq!(pid.integral(), 1.0);
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            PidParams::new(std::f64::NAN, 0.0, 0.0).validate(),
            Err(PidParamsError::NonFiniteGain("k_p"))
        );

        let mut params = PidParams::new(1.0, 0.0, 0.0);
        params.out_min = Some(1.0);
        params.out_max = Some(-1.0);
        assert_eq!(
            params.validate(),
            Err(PidParamsError::InvertedOutputBounds(1.0, -1.0))
        );
    }
}
