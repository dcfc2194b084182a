//! Main vehicle-side executable entry point.
//!
//! # Architecture
//!
//! The executable listens for the surface station and serves one control session per
//! connection:
//!
//!     - Load and validate all parameters
//!     - Build the thruster allocator
//!     - For each connection from the surface:
//!         - Start the actuation and sensing stages
//!         - Run the control pipeline until the session ends
//!         - Drive the thrusters to neutral
//!
//! Any invalid parameter aborts start up before the first connection is accepted.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{error, info, warn};
use std::{net::TcpListener, path::PathBuf};
use structopt::StructOpt;

// Internal
use comms_if::net::{NetParams, VehicleLink};
use rov_lib::{
    ctrl_pipeline::{CtrlPipeline, SessionEnd},
    params::RovExecParams,
    thrust_alloc::ThrustAlloc,
};
use util::{
    logger::{logger_init_with, LevelFilter, LogConfig},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "rov_exec", about = "Vehicle control executable")]
struct Opt {
    /// Serve a single session and exit instead of waiting for the surface to reconnect
    #[structopt(long)]
    once: bool,

    /// Path to the executable parameters, defaults to `$ROV_SW_ROOT/params/rov_exec.toml`
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Path to the network parameters, defaults to `$ROV_SW_ROOT/params/net.toml`
    #[structopt(long, parse(from_os_str))]
    net_params: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("rov_exec", "sessions").wrap_err("Failed to create the session")?;

    // Per cycle records are only kept in the log file
    logger_init_with(
        &LogConfig::new(LevelFilter::Debug).console(LevelFilter::Info),
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("ROV Vehicle Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams = match opt.net_params {
        Some(ref p) => util::params::load_path(p),
        None => util::params::load("net.toml"),
    }
    .wrap_err("Could not load net params")?;

    let params: RovExecParams = match opt.params {
        Some(ref p) => util::params::load_path(p),
        None => util::params::load("rov_exec.toml"),
    }
    .wrap_err("Could not load rov_exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    let thrust_alloc =
        ThrustAlloc::new(&params.thrust_alloc).wrap_err("Failed to initialise ThrustAlloc")?;
    info!(
        "ThrustAlloc init complete ({} thrusters)",
        thrust_alloc.num_thrusters()
    );

    params
        .ctrl
        .pid
        .validate()
        .map_err(|(dof, e)| eyre!("Invalid {:?} PID parameters: {}", dof, e))?;

    // ---- INITIALISE NETWORK ----

    let listener = TcpListener::bind(&net_params.vehicle_bind_addr)
        .wrap_err_with(|| format!("Could not bind to {}", net_params.vehicle_bind_addr))?;

    info!("Listening for the surface on {}", net_params.vehicle_bind_addr);

    // ---- SESSION LOOP ----

    let mut tm_path = session.session_root.clone();
    tm_path.push("tm.jsonl");

    loop {
        let (link, addr) = VehicleLink::accept_from(&listener, &net_params)
            .wrap_err("Failed to accept a connection from the surface")?;

        info!("Starting session with {}", addr);

        let mut pipeline = CtrlPipeline::new(
            link,
            &params.ctrl,
            thrust_alloc.clone(),
            params.eqpt.actuator.build(),
            params.eqpt.sensor.build(),
        )
        .wrap_err("Failed to start the control pipeline")?;

        if let Err(e) = pipeline.set_archive(&tm_path) {
            warn!("Telemetry will not be archived: {}", e);
        }

        match pipeline.run() {
            Ok(SessionEnd::StopCommand) => info!("Session with {} stopped by the surface", addr),
            Ok(SessionEnd::PeerClosed) => warn!("Session with {} closed by the surface", addr),
            Err(e) => error!("Session with {} ended with an error: {}", addr, e),
        }

        if opt.once {
            break;
        }

        info!("Waiting for the surface to reconnect\n");
    }

    info!("End of execution");

    Ok(())
}
