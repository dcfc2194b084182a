//! # Network Module
//!
//! This module provides the wire protocol used between the surface station and the vehicle over
//! a single TCP connection, and the parameters describing where each end lives on the network.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Length-prefixed frame codec
pub mod frame;

/// Surface and vehicle link endpoints
pub mod link;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use frame::{Decoded, Frame, FrameCodec, FrameError};
pub use link::{CmdRecv, LinkError, SurfaceLink, VehicleLink};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, shared by the vehicle and surface executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Address the vehicle listens on for the control connection.
    pub vehicle_bind_addr: String,

    /// Address the surface station connects to in order to reach the vehicle.
    pub vehicle_addr: String,

    /// Address the surface station listens on when relaying commands from an external
    /// controller.
    pub relay_bind_addr: String,

    /// Largest frame length which will be accepted from the peer.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,

    /// Largest command line length which will be accepted from the peer.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,

    /// Optional read timeout on the connection. If unset reads block indefinitely.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NetParams {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for NetParams {
    fn default() -> Self {
        Self {
            vehicle_bind_addr: String::from("0.0.0.0:9999"),
            vehicle_addr: String::from("127.0.0.1:9999"),
            relay_bind_addr: String::from("0.0.0.0:9998"),
            max_frame_len: default_max_frame_len(),
            max_line_len: default_max_line_len(),
            read_timeout_ms: None,
        }
    }
}

fn default_max_frame_len() -> usize {
    frame::DEFAULT_MAX_FRAME_LEN
}

fn default_max_line_len() -> usize {
    frame::DEFAULT_MAX_LINE_LEN
}
