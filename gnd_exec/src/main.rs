//! # Ground Station Executable
//!
//! The operator's end of the link. Control messages are taken from an input device, sent to the
//! vehicle, and the telemetry the vehicle returns for each one is logged.
//!
//! Input devices:
//!
//!     - `drive`: interactive keyboard control
//!     - `script <path>`: commands read from a script file
//!     - `relay`: command lines forwarded from an external controller

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod input;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::{io::{Read, Write}, path::PathBuf};
use structopt::StructOpt;

// Internal
use comms_if::{
    net::{NetParams, SurfaceLink},
    tc::CtrlMsg,
    tm::{CmdStatus, Tm},
};
use input::{InputDevice, KeyboardInput, RelayInput, ScriptInput};
use params::GndExecParams;
use util::{
    logger::{logger_init_with, LevelFilter, LogConfig},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "gnd_exec", about = "ROV surface station")]
struct Opt {
    /// Address of the vehicle, overrides the value in `net.toml`
    #[structopt(long)]
    vehicle_addr: Option<String>,

    #[structopt(subcommand)]
    source: Source,
}

#[derive(Debug, StructOpt)]
enum Source {
    /// Drive the vehicle from the keyboard
    #[structopt(name = "drive")]
    Drive,

    /// Run a script of commands
    #[structopt(name = "script")]
    Script {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },

    /// Forward commands from an external controller
    #[structopt(name = "relay")]
    Relay,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("gnd_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init_with(
        &LogConfig::new(LevelFilter::Info).module("rustyline", LevelFilter::Warn),
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    info!("ROV Ground Station Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    if let Some(addr) = opt.vehicle_addr {
        net_params.vehicle_addr = addr;
    }

    let params: GndExecParams =
        util::params::load("gnd_exec.toml").wrap_err("Could not load gnd_exec params")?;

    // ---- INITIALISE INPUT ----

    let mut input: Box<dyn InputDevice> = match opt.source {
        Source::Drive => {
            info!("Keyboard control, w/s surge, d/a sway, r/f heave, o/u roll, i/k pitch, l/j yaw");
            info!("0 returns to neutral, x stops the vehicle and quits\n");
            Box::new(
                KeyboardInput::new(params.key_step, &params.role)
                    .wrap_err("Failed to initialise the keyboard")?,
            )
        }
        Source::Script { path } => {
            let script = ScriptInput::load(&path, &params.role, params.default_hold_s)
                .wrap_err_with(|| format!("Failed to load script {:?}", path))?;
            info!(
                "Loaded script of {} commands lasting {:.02} s",
                script.len(),
                script.duration().as_secs_f64()
            );
            Box::new(script)
        }
        Source::Relay => {
            let (relay, _) = RelayInput::accept(&net_params, &params.role)
                .wrap_err("Failed to start the relay")?;
            Box::new(relay)
        }
    };

    // ---- CONNECT ----

    let mut link = SurfaceLink::connect(&net_params).wrap_err("Failed to connect to the vehicle")?;

    // ---- MAIN LOOP ----

    let num_sent = run(&mut link, input.as_mut())?;

    info!("{} commands sent, end of execution", num_sent);

    Ok(())
}

/// Send messages from the input to the vehicle until either side stops, returning the number of
/// messages sent.
fn run<S: Read + Write>(
    link: &mut SurfaceLink<S>,
    input: &mut dyn InputDevice,
) -> Result<u64, Report> {
    let mut num_sent = 0;
    let mut stopped = false;

    while let Some(msg) = input.next_msg().wrap_err("Input device failed")? {
        link.send_cmd(&msg).wrap_err("Failed to send the command")?;
        num_sent += 1;

        // Every message is answered with one telemetry frame
        match link.recv_tm().wrap_err("Failed to receive telemetry")? {
            Some(tm) => log_tm(&tm),
            None => {
                warn!("Vehicle closed the connection");
                return Ok(num_sent);
            }
        }

        if msg == CtrlMsg::Stop {
            stopped = true;
            break;
        }
    }

    if !stopped {
        info!("Input exhausted, stopping the vehicle");
        link.send_cmd(&CtrlMsg::Stop).wrap_err("Failed to send stop")?;
        num_sent += 1;
        if let Some(tm) = link.recv_tm().wrap_err("Failed to receive telemetry")? {
            log_tm(&tm);
        }
    }

    Ok(num_sent)
}

fn log_tm(tm: &Tm) {
    match tm.cmd_status {
        CmdStatus::Ok => info!(
            "[{}] thrusters: {:?}, reading: {:?}",
            tm.cycle,
            tm.thr_dems.as_ref().map(|d| &d.act),
            tm.sens_reading
        ),
        CmdStatus::Invalid => warn!("[{}] vehicle rejected the command", tm.cycle),
        CmdStatus::Stopped => info!("[{}] vehicle stopped", tm.cycle),
    }

    debug!("{:#?}", tm);
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
