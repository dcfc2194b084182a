//! # Link endpoints
//!
//! The two ends of the control connection. By convention the surface sends unframed command
//! lines (see [`crate::tc`]) and the vehicle replies to each with one length-prefixed frame
//! holding a JSON telemetry record (see [`crate::tm`]). The direction fixes the framing rule, so
//! no discriminator byte is needed on the wire.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use log::{debug, info};

use super::{
    frame::{Decoded, FrameCodec, FrameError},
    NetParams,
};
use crate::{
    tc::{CtrlMsg, TcParseError},
    tm::Tm,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The vehicle end of the link. Receives command lines and sends telemetry frames.
pub struct VehicleLink<S> {
    codec: FrameCodec<S>,
}

/// The surface end of the link. Sends command lines and receives telemetry frames.
pub struct SurfaceLink<S> {
    codec: FrameCodec<S>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Outcome of receiving a command on the vehicle.
#[derive(Debug)]
pub enum CmdRecv {
    /// A valid command message.
    Cmd(CtrlMsg),

    /// A line was received but could not be parsed as a command.
    Invalid { line: String, error: TcParseError },

    /// The surface closed the connection.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Could not bind to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("Could not accept a connection: {0}")]
    AcceptError(std::io::Error),

    #[error("Could not connect to {0}: {1}")]
    ConnectError(String, std::io::Error),

    #[error("Could not configure the connection: {0}")]
    SocketOptionError(std::io::Error),

    #[error("Framing error: {0}")]
    FrameError(#[from] FrameError),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the telemetry from the vehicle: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehicleLink<TcpStream> {
    /// Listen on the vehicle bind address and block until the surface connects.
    pub fn accept(params: &NetParams) -> Result<(Self, SocketAddr), LinkError> {
        let listener = TcpListener::bind(&params.vehicle_bind_addr)
            .map_err(|e| LinkError::BindError(params.vehicle_bind_addr.clone(), e))?;

        info!("Listening for the surface on {}", params.vehicle_bind_addr);

        Self::accept_from(&listener, params)
    }

    /// Block until a connection is made on the given listener.
    pub fn accept_from(
        listener: &TcpListener,
        params: &NetParams,
    ) -> Result<(Self, SocketAddr), LinkError> {
        let (stream, addr) = listener.accept().map_err(LinkError::AcceptError)?;

        configure_stream(&stream, params)?;

        info!("Connection accepted from {}", addr);

        Ok((Self::new(stream, params), addr))
    }
}

impl<S> VehicleLink<S> {
    /// Create a vehicle link over an already connected stream.
    pub fn new(stream: S, params: &NetParams) -> Self {
        Self {
            codec: FrameCodec::with_limits(stream, params.max_frame_len, params.max_line_len),
        }
    }
}

impl<S: Read + Write> VehicleLink<S> {
    /// Block until the next command line arrives from the surface.
    ///
    /// A malformed command is reported as `CmdRecv::Invalid` and leaves the link usable. Framing
    /// and I/O errors are returned as errors, after which the link should be closed.
    pub fn recv_cmd(&mut self) -> Result<CmdRecv, LinkError> {
        let line = match self.codec.decode_line()? {
            Decoded::Item(l) => l,
            Decoded::EndOfStream => return Ok(CmdRecv::Closed),
        };

        debug!("Command line received: {:?}", line);

        Ok(match CtrlMsg::parse(&line) {
            Ok(msg) => CmdRecv::Cmd(msg),
            Err(error) => CmdRecv::Invalid { line, error },
        })
    }

    /// Send a telemetry record to the surface as a single frame.
    pub fn send_tm(&mut self, tm: &Tm) -> Result<(), LinkError> {
        let payload = serde_json::to_vec(tm).map_err(LinkError::SerializationError)?;

        self.codec.send_frame(&payload)?;

        Ok(())
    }
}

impl SurfaceLink<TcpStream> {
    /// Connect to the vehicle.
    pub fn connect(params: &NetParams) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(&params.vehicle_addr)
            .map_err(|e| LinkError::ConnectError(params.vehicle_addr.clone(), e))?;

        configure_stream(&stream, params)?;

        info!("Connected to the vehicle at {}", params.vehicle_addr);

        Ok(Self::new(stream, params))
    }
}

impl<S> SurfaceLink<S> {
    /// Create a surface link over an already connected stream.
    pub fn new(stream: S, params: &NetParams) -> Self {
        Self {
            codec: FrameCodec::with_limits(stream, params.max_frame_len, params.max_line_len),
        }
    }
}

impl<S: Read + Write> SurfaceLink<S> {
    /// Send a command message to the vehicle.
    pub fn send_cmd(&mut self, msg: &CtrlMsg) -> Result<(), LinkError> {
        self.codec.send_raw(msg.to_wire().as_bytes())?;
        Ok(())
    }

    /// Block until the next telemetry frame arrives from the vehicle.
    ///
    /// Returns `None` if the vehicle closed the connection.
    pub fn recv_tm(&mut self) -> Result<Option<Tm>, LinkError> {
        match self.codec.decode_next()? {
            Decoded::Item(frame) => serde_json::from_slice(&frame.payload)
                .map(Some)
                .map_err(LinkError::DeserializeError),
            Decoded::EndOfStream => Ok(None),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Apply the configured socket options to a connected stream.
fn configure_stream(stream: &TcpStream, params: &NetParams) -> Result<(), LinkError> {
    stream
        .set_nodelay(true)
        .and_then(|_| stream.set_read_timeout(params.read_timeout()))
        .map_err(LinkError::SocketOptionError)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
