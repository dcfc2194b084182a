//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the wire protocol spoken
//! between the surface station and the vehicle, and the messages exchanged over it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands, i.e. control commands sent from the surface to the vehicle
pub mod tc;

/// Telemetry sent from the vehicle back to the surface
pub mod tm;

/// Demand and sensor definitions for equipment (like thrusters)
pub mod eqpt;

/// Network module
pub mod net;
