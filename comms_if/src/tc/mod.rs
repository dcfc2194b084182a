//! # Telecommand module
//!
//! Control commands sent by the surface station to the vehicle.
//!
//! A command travels as one line of UTF-8 text holding comma-separated decimal values followed by
//! an optional role marker, for example:
//!
//! ```text
//! 0.10,-0.20,0.00,0.00,0.00,R
//! ```
//!
//! Values are assigned to the degrees of freedom in the order surge, sway, heave, roll, pitch,
//! yaw. Missing trailing axes are zero, values past the sixth are kept as auxiliary channels. The
//! line `q` asks the vehicle to stop and end the session.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of controlled degrees of freedom.
pub const NUM_DOF: usize = 6;

/// The line which terminates a session.
pub const STOP_SENTINEL: &str = "q";

/// The role marker appended by the surface station.
pub const DEFAULT_ROLE_MARKER: &str = "R";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A desired-motion command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrlCmd {
    /// Demand for each degree of freedom, nominally in [-1, 1].
    ///
    /// Depending on the vehicle's control mode these are either a wrench to allocate directly
    /// or the setpoints of the per-axis controllers.
    pub dofs: [f64; NUM_DOF],

    /// Auxiliary channels following the six axes (such as a gripper).
    pub aux: Vec<f64>,

    /// Role marker terminating the command, if any.
    pub role: Option<String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Degrees of freedom of the vehicle, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dof {
    Surge,
    Sway,
    Heave,
    Roll,
    Pitch,
    Yaw,
}

/// A message sent from the surface to the vehicle.
#[derive(Debug, Clone, PartialEq)]
pub enum CtrlMsg {
    /// Drive the vehicle with the given command.
    Demand(CtrlCmd),

    /// Bring the vehicle to a stop and end the session.
    Stop,
}

/// Possible parsing errors.
#[derive(Debug, Error, PartialEq)]
pub enum TcParseError {
    #[error("Command line is empty")]
    Empty,

    #[error("Command contains no values")]
    NoValues,

    #[error("Value {index} ({value:?}) is not a number")]
    InvalidValue { index: usize, value: String },

    #[error("Value {0} is not finite")]
    NonFinite(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Dof {
    /// All degrees of freedom in wire order.
    pub const ALL: [Dof; NUM_DOF] = [
        Dof::Surge,
        Dof::Sway,
        Dof::Heave,
        Dof::Roll,
        Dof::Pitch,
        Dof::Yaw,
    ];

    /// Position of this degree of freedom in a command or wrench.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl CtrlCmd {
    /// A command demanding zero on every axis.
    pub fn neutral() -> Self {
        Self {
            dofs: [0.0; NUM_DOF],
            aux: Vec::new(),
            role: Some(DEFAULT_ROLE_MARKER.to_string()),
        }
    }

    /// Build a command from the six axis demands, with the default role marker.
    pub fn from_dofs(dofs: [f64; NUM_DOF]) -> Self {
        Self {
            dofs,
            ..Self::neutral()
        }
    }

    /// Parse the body of a command line.
    pub fn parse(line: &str) -> Result<Self, TcParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(TcParseError::Empty);
        }

        let tokens: Vec<&str> = line.split(',').map(str::trim).collect();

        let mut values = Vec::with_capacity(tokens.len());
        let mut role = None;

        for (index, token) in tokens.iter().enumerate() {
            match token.parse::<f64>() {
                Ok(v) if v.is_finite() => values.push(v),
                Ok(_) => return Err(TcParseError::NonFinite(index)),
                // The final token may be a role marker
                Err(_) if index == tokens.len() - 1 && is_role_marker(token) => {
                    role = Some(token.to_string())
                }
                Err(_) => {
                    return Err(TcParseError::InvalidValue {
                        index,
                        value: token.to_string(),
                    })
                }
            }
        }

        if values.is_empty() {
            return Err(TcParseError::NoValues);
        }

        let mut dofs = [0f64; NUM_DOF];
        let num_axes = values.len().min(NUM_DOF);
        dofs[..num_axes].copy_from_slice(&values[..num_axes]);

        Ok(Self {
            dofs,
            aux: values.split_off(num_axes),
            role,
        })
    }

    /// Get the demand on one degree of freedom.
    pub fn get(&self, dof: Dof) -> f64 {
        self.dofs[dof.index()]
    }
}

impl CtrlMsg {
    /// Parse a received command line.
    pub fn parse(line: &str) -> Result<Self, TcParseError> {
        if line.trim() == STOP_SENTINEL {
            return Ok(CtrlMsg::Stop);
        }

        CtrlCmd::parse(line).map(CtrlMsg::Demand)
    }

    /// Format the message as a newline-terminated line ready to be sent.
    pub fn to_wire(&self) -> String {
        match self {
            CtrlMsg::Stop => format!("{}\n", STOP_SENTINEL),
            CtrlMsg::Demand(cmd) => {
                let mut fields: Vec<String> = cmd
                    .dofs
                    .iter()
                    .chain(cmd.aux.iter())
                    .map(|v| v.to_string())
                    .collect();

                if let Some(ref r) = cmd.role {
                    fields.push(r.clone());
                }

                format!("{}\n", fields.join(","))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn is_role_marker(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command() {
        let cmd = CtrlCmd::parse("0.10,-0.20,0.00,0.30,0.00,1.0,R\n").unwrap();

        assert_eq!(cmd.dofs, [0.1, -0.2, 0.0, 0.3, 0.0, 1.0]);
        assert!(cmd.aux.is_empty());
        assert_eq!(cmd.role.as_deref(), Some("R"));
        assert_eq!(cmd.get(Dof::Yaw), 1.0);
    }

    #[test]
    fn test_parse_short_command() {
        // Five value senders leave the remaining axes at zero
        let cmd = CtrlCmd::parse("1.0,0.0,-1.0,0.0,0.5").unwrap();

        assert_eq!(cmd.dofs, [1.0, 0.0, -1.0, 0.0, 0.5, 0.0]);
        assert_eq!(cmd.role, None);
    }

    #[test]
    fn test_parse_aux_channels() {
        let cmd = CtrlCmd::parse("0,0,0,0,0,0,0.75,R").unwrap();

        assert_eq!(cmd.aux, vec![0.75]);
        assert_eq!(cmd.role.as_deref(), Some("R"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(CtrlCmd::parse("  \n"), Err(TcParseError::Empty));
        assert_eq!(CtrlCmd::parse("R"), Err(TcParseError::NoValues));
        assert_eq!(
            CtrlCmd::parse("0.1,abc,0.3"),
            Err(TcParseError::InvalidValue {
                index: 1,
                value: "abc".into()
            })
        );
        assert_eq!(
            CtrlCmd::parse("0.1,,0.3"),
            Err(TcParseError::InvalidValue {
                index: 1,
                value: "".into()
            })
        );
        assert_eq!(CtrlCmd::parse("0.1,NaN,0.3"), Err(TcParseError::NonFinite(1)));
        assert_eq!(CtrlCmd::parse("inf"), Err(TcParseError::NonFinite(0)));

        // Role marker is only accepted at the end
        assert!(matches!(
            CtrlCmd::parse("R,0.1"),
            Err(TcParseError::InvalidValue { index: 0, .. })
        ));
    }

    #[test]
    fn test_stop_sentinel() {
        assert_eq!(CtrlMsg::parse("q"), Ok(CtrlMsg::Stop));
        assert_eq!(CtrlMsg::parse("q\r\n"), Ok(CtrlMsg::Stop));
        assert_eq!(CtrlMsg::Stop.to_wire(), "q\n");
    }

    #[test]
    fn test_to_wire() {
        let mut cmd = CtrlCmd::from_dofs([0.1, -0.2, 0.0, 0.0, 0.0, 1.0]);
        cmd.aux.push(0.5);

        let wire = CtrlMsg::Demand(cmd.clone()).to_wire();
        assert_eq!(wire, "0.1,-0.2,0,0,0,1,0.5,R\n");
        assert_eq!(CtrlMsg::parse(&wire), Ok(CtrlMsg::Demand(cmd)));
    }

    #[test]
    fn test_dof_order() {
        for (i, dof) in Dof::ALL.iter().enumerate() {
            assert_eq!(dof.index(), i);
        }
    }
}
