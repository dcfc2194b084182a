//! Scripted input
//!
//! A script is a text file with one command per line, optionally preceded by the time to hold
//! that command before the next line is sent:
//!
//! ```text
//! # hold_s command
//! 2.0 0,0,0.5,0,0,0
//! 1.5 0.3,0,0,0,0,0
//! 0,0,0,0,0,0
//! q
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. A stop is sent at the end of the script
//! if the script does not end with one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use std::{collections::VecDeque, fs::read_to_string, path::Path, thread, time::Duration};

use super::{InputDevice, InputError};
use comms_if::tc::CtrlMsg;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One line of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEntry {
    pub hold: Duration,
    pub msg: CtrlMsg,
}

/// Input read from a script file.
#[derive(Debug)]
pub struct ScriptInput {
    entries: VecDeque<ScriptEntry>,

    /// Hold time of the last entry returned, waited out before the next one
    pending_hold: Option<Duration>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ScriptInput {
    /// Load a script from a file.
    pub fn load<P: AsRef<Path>>(
        path: P,
        role: &str,
        default_hold_s: f64,
    ) -> Result<Self, InputError> {
        let script = read_to_string(path).map_err(InputError::ScriptLoadError)?;

        Self::parse(&script, role, default_hold_s)
    }

    /// Parse a script.
    pub fn parse(script: &str, role: &str, default_hold_s: f64) -> Result<Self, InputError> {
        let mut entries = VecDeque::new();

        for (i, raw) in script.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // An optional hold time is separated from the command by whitespace
            let (hold_s, cmd) = match line.split_once(char::is_whitespace) {
                Some((h, c)) => (
                    h.parse::<f64>()
                        .map_err(|e| InputError::ScriptSyntaxError(i + 1, e.to_string()))?,
                    c.trim(),
                ),
                None => (default_hold_s, line),
            };

            if !hold_s.is_finite() || hold_s < 0.0 {
                return Err(InputError::ScriptSyntaxError(
                    i + 1,
                    format!("Invalid hold time {}", hold_s),
                ));
            }

            let mut msg = CtrlMsg::parse(cmd)
                .map_err(|e| InputError::ScriptSyntaxError(i + 1, e.to_string()))?;

            if let CtrlMsg::Demand(ref mut c) = msg {
                if c.role.is_none() {
                    c.role = Some(role.to_string());
                }
            }

            entries.push_back(ScriptEntry {
                hold: Duration::from_secs_f64(hold_s),
                msg,
            });
        }

        if entries.back().map(|e| &e.msg) != Some(&CtrlMsg::Stop) {
            entries.push_back(ScriptEntry {
                hold: Duration::from_secs(0),
                msg: CtrlMsg::Stop,
            });
        }

        Ok(Self {
            entries,
            pending_hold: None,
        })
    }

    /// Number of entries remaining.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total time the script will take to run.
    pub fn duration(&self) -> Duration {
        self.entries.iter().map(|e| e.hold).sum()
    }

    /// Take the next entry without waiting.
    fn pop(&mut self) -> Option<ScriptEntry> {
        self.entries.pop_front()
    }
}

impl InputDevice for ScriptInput {
    fn next_msg(&mut self) -> Result<Option<CtrlMsg>, InputError> {
        if let Some(hold) = self.pending_hold.take() {
            thread::sleep(hold);
        }

        Ok(self.pop().map(|entry| {
            info!("Script: {:?} for {:.2} s", entry.msg, entry.hold.as_secs_f64());
            self.pending_hold = Some(entry.hold);
            entry.msg
        }))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use comms_if::tc::CtrlCmd;

    #[test]
    fn test_parse_script() {
        let script = "\
            # dive then stop\n\
            \n\
            0.5 0,0,0.5,0,0,0\n\
            0.25,0,0,0,0,0,R\n";

        let mut input = ScriptInput::parse(script, "R", 0.0).unwrap();

        assert_eq!(input.len(), 3);
        assert_eq!(input.duration(), Duration::from_millis(500));

        let first = input.pop().unwrap();
        assert_eq!(first.hold, Duration::from_millis(500));
        assert_eq!(
            first.msg,
            CtrlMsg::Demand(CtrlCmd::from_dofs([0.0, 0.0, 0.5, 0.0, 0.0, 0.0]))
        );

        assert_eq!(input.pop().unwrap().hold, Duration::from_secs(0));

        // Stop is appended
        assert_eq!(input.pop().unwrap().msg, CtrlMsg::Stop);
        assert!(input.is_empty());
    }

    #[test]
    fn test_explicit_stop_not_duplicated() {
        let mut input = ScriptInput::parse("0,0,0,0,0,0\nq\n", "R", 0.0).unwrap();

        assert_eq!(input.len(), 2);
        assert!(input.next_msg().unwrap().is_some());
        assert_eq!(input.next_msg().unwrap(), Some(CtrlMsg::Stop));
        assert_eq!(input.next_msg().unwrap(), None);
    }

    #[test]
    fn test_script_errors() {
        assert!(matches!(
            ScriptInput::parse("abc 0,0,0", "R", 0.0),
            Err(InputError::ScriptSyntaxError(1, _))
        ));
        assert!(matches!(
            ScriptInput::parse("0,0,0\n-1 0,0,0", "R", 0.0),
            Err(InputError::ScriptSyntaxError(2, _))
        ));
        assert!(matches!(
            ScriptInput::parse("1.0 0,nan,0", "R", 0.0),
            Err(InputError::ScriptSyntaxError(1, _))
        ));
    }
}
