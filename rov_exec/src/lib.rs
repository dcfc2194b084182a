//! # Rover library.
//!
//! This library allows other crates in the workspace to access items defined inside the vehicle
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// PID axis controller - single degree of freedom feedback control
pub mod pid;

/// Thruster allocation - converts a wrench demand into individual thruster demands
pub mod thrust_alloc;

/// Equipment - interfaces to the thrusters and the axis sensors
pub mod eqpt;

/// Control pipeline - runs the control cycle for one session with the surface
pub mod ctrl_pipeline;

/// Parameters for the vehicle executable
pub mod params;
