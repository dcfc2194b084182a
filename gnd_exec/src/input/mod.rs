//! # Input devices
//!
//! Sources of control messages for the surface station.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod keyboard;
mod relay;
mod script;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use keyboard::KeyboardInput;
pub use relay::RelayInput;
pub use script::ScriptInput;

use comms_if::{net::FrameError, tc::CtrlMsg, tc::TcParseError};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of control messages.
pub trait InputDevice {
    /// Block until the next message to send is available.
    ///
    /// Returns `None` once the device has nothing more to send.
    fn next_msg(&mut self) -> Result<Option<CtrlMsg>, InputError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Could not read from the terminal: {0}")]
    ReadlineError(rustyline::error::ReadlineError),

    #[error("Unknown key {0:?}")]
    UnknownKey(char),

    #[error("Invalid command: {0}")]
    ParseError(TcParseError),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("Script line {0}: {1}")]
    ScriptSyntaxError(usize, String),

    #[error("Could not set up the relay: {0}")]
    RelaySetupError(std::io::Error),

    #[error("Relay connection error: {0}")]
    RelayError(FrameError),
}
