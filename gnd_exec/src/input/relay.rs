//! Relay input
//!
//! Accepts a single external controller on the relay address and forwards the command lines it
//! sends. When the controller disconnects the vehicle is stopped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use std::net::{SocketAddr, TcpListener, TcpStream};

use super::{InputDevice, InputError};
use comms_if::{
    net::{Decoded, FrameCodec, NetParams},
    tc::CtrlMsg,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct RelayInput {
    codec: FrameCodec<TcpStream>,
    role: String,
    finished: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RelayInput {
    /// Listen on the relay address and block until a controller connects.
    pub fn accept(params: &NetParams, role: &str) -> Result<(Self, SocketAddr), InputError> {
        let listener =
            TcpListener::bind(&params.relay_bind_addr).map_err(InputError::RelaySetupError)?;

        info!("Waiting for a controller on {}", params.relay_bind_addr);

        let (stream, addr) = listener.accept().map_err(InputError::RelaySetupError)?;

        info!("Controller connected from {}", addr);

        Ok((
            Self::new(stream, params.max_frame_len, params.max_line_len, role),
            addr,
        ))
    }

    pub fn new(stream: TcpStream, max_frame_len: usize, max_line_len: usize, role: &str) -> Self {
        Self {
            codec: FrameCodec::with_limits(stream, max_frame_len, max_line_len),
            role: role.to_string(),
            finished: false,
        }
    }
}

impl InputDevice for RelayInput {
    fn next_msg(&mut self) -> Result<Option<CtrlMsg>, InputError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let line = match self.codec.decode_line().map_err(InputError::RelayError)? {
                Decoded::Item(l) => l,
                Decoded::EndOfStream => {
                    info!("Controller disconnected, stopping the vehicle");
                    self.finished = true;
                    return Ok(Some(CtrlMsg::Stop));
                }
            };

            match CtrlMsg::parse(&line) {
                Ok(CtrlMsg::Demand(mut c)) => {
                    if c.role.is_none() {
                        c.role = Some(self.role.clone());
                    }
                    return Ok(Some(CtrlMsg::Demand(c)));
                }
                Ok(CtrlMsg::Stop) => {
                    self.finished = true;
                    return Ok(Some(CtrlMsg::Stop));
                }
                Err(e) => warn!("Dropping invalid line {:?} from the controller: {}", line, e),
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
