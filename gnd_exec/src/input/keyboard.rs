//! Keyboard input
//!
//! Each line typed at the prompt is either a raw comma separated command, or a sequence of keys
//! which nudge the current demand:
//!
//! | Axis  | + | - |
//! |-------|---|---|
//! | Surge | w | s |
//! | Sway  | d | a |
//! | Heave | r | f |
//! | Roll  | o | u |
//! | Pitch | i | k |
//! | Yaw   | l | j |
//!
//! `0` returns every axis to neutral, an empty line resends the current demand and `x` stops
//! the vehicle and quits.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use rustyline::{error::ReadlineError, DefaultEditor};

use super::{InputDevice, InputError};
use comms_if::tc::{CtrlCmd, CtrlMsg, Dof, NUM_DOF, STOP_SENTINEL};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "ROV $ ";

/// Key which stops the vehicle and quits.
const QUIT_KEY: &str = "x";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The demand built up from key presses.
#[derive(Debug, Clone)]
pub struct KeyState {
    dofs: [f64; NUM_DOF],
    step: f64,
    role: String,
}

/// Keyboard input from an interactive prompt.
pub struct KeyboardInput {
    editor: DefaultEditor,
    state: KeyState,
    quit: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl KeyState {
    pub fn new(step: f64, role: &str) -> Self {
        Self {
            dofs: [0f64; NUM_DOF],
            step,
            role: role.to_string(),
        }
    }

    /// Apply one line of input, returning the message to send.
    pub fn apply(&mut self, line: &str) -> Result<CtrlMsg, InputError> {
        let line = line.trim();

        if line == QUIT_KEY || line == STOP_SENTINEL {
            return Ok(CtrlMsg::Stop);
        }

        if line.contains(',') {
            let mut cmd = CtrlCmd::parse(line).map_err(InputError::ParseError)?;
            if cmd.role.is_none() {
                cmd.role = Some(self.role.clone());
            }
            self.dofs = cmd.dofs;
            return Ok(CtrlMsg::Demand(cmd));
        }

        // Validate the whole line before changing anything
        let mut dofs = self.dofs;
        for key in line.chars().filter(|c| !c.is_whitespace()) {
            if key == '0' {
                dofs = [0f64; NUM_DOF];
                continue;
            }

            let (dof, sign) = key_binding(key).ok_or(InputError::UnknownKey(key))?;
            let d = &mut dofs[dof.index()];
            *d = util::maths::clamp(*d + sign * self.step, Some(-1.0), Some(1.0));
        }
        self.dofs = dofs;

        Ok(CtrlMsg::Demand(CtrlCmd {
            dofs: self.dofs,
            aux: Vec::new(),
            role: Some(self.role.clone()),
        }))
    }

    pub fn dofs(&self) -> [f64; NUM_DOF] {
        self.dofs
    }
}

impl KeyboardInput {
    pub fn new(step: f64, role: &str) -> Result<Self, InputError> {
        Ok(Self {
            editor: DefaultEditor::new().map_err(InputError::ReadlineError)?,
            state: KeyState::new(step, role),
            quit: false,
        })
    }
}

impl InputDevice for KeyboardInput {
    fn next_msg(&mut self) -> Result<Option<CtrlMsg>, InputError> {
        if self.quit {
            return Ok(None);
        }

        loop {
            let line = match self.editor.readline(PROMPT) {
                Ok(l) => l,
                // Ctrl-C or Ctrl-D quit
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    self.quit = true;
                    return Ok(Some(CtrlMsg::Stop));
                }
                Err(e) => return Err(InputError::ReadlineError(e)),
            };

            if !line.trim().is_empty() {
                self.editor.add_history_entry(line.as_str()).ok();
            }

            match self.state.apply(&line) {
                Ok(msg) => {
                    if msg == CtrlMsg::Stop {
                        self.quit = true;
                    }
                    return Ok(Some(msg));
                }
                Err(e) => warn!("{}", e),
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn key_binding(key: char) -> Option<(Dof, f64)> {
    Some(match key.to_ascii_lowercase() {
        'w' => (Dof::Surge, 1.0),
        's' => (Dof::Surge, -1.0),
        'd' => (Dof::Sway, 1.0),
        'a' => (Dof::Sway, -1.0),
        'r' => (Dof::Heave, 1.0),
        'f' => (Dof::Heave, -1.0),
        'o' => (Dof::Roll, 1.0),
        'u' => (Dof::Roll, -1.0),
        'i' => (Dof::Pitch, 1.0),
        'k' => (Dof::Pitch, -1.0),
        'l' => (Dof::Yaw, 1.0),
        'j' => (Dof::Yaw, -1.0),
        _ => return None,
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
