//! # Control pipeline
//!
//! The dispatcher which runs one control session. It owns the connection to the surface, one
//! PID controller per axis, the thruster allocator, and the stages which talk to the hardware.
//!
//! Each cycle is started by one command line from the surface and runs strictly in order:
//!
//! - Command receipt
//! - Sensing and per-axis control (PID mode only)
//! - Allocation and range mapping
//! - Actuation
//! - Telemetry emission
//!
//! Every command line, valid or not, is answered with exactly one telemetry frame. The session
//! ends on the stop sentinel, when the surface closes the connection, or on a link error. In
//! each case the thrusters are driven to neutral before returning.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod stage;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use std::{
    fs::OpenOptions,
    io::{BufWriter, Read, Write},
    path::Path,
    time::Instant,
};

// Internal
pub use params::*;
pub use stage::*;

use crate::{
    eqpt::{Actuator, AxisSensor, EqptError},
    pid::{PidController, PidParamsError},
    thrust_alloc::{AllocError, ThrustAlloc, Wrench},
};
use comms_if::{
    eqpt::{SensReading, ThrusterDems},
    net::{CmdRecv, LinkError, VehicleLink},
    tc::{CtrlCmd, CtrlMsg, Dof, NUM_DOF},
    tm::{CmdStatus, Tm},
};

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

type ActuationStage = StageHandle<ThrusterDems, Result<SensReading, EqptError>>;
type SensingStage = StageHandle<(), Result<[f64; NUM_DOF], EqptError>>;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The control pipeline dispatcher.
pub struct CtrlPipeline<S> {
    link: VehicleLink<S>,

    mode: CtrlMode,

    /// One controller per axis, in wire order
    pids: Vec<PidController>,

    alloc: ThrustAlloc,

    actuation: ActuationStage,

    sensing: Option<SensingStage>,

    /// Time base for the controllers
    epoch: Instant,

    /// Number of the current cycle
    cycle: u64,

    /// Telemetry archive, one JSON record per line
    archive: Option<BufWriter<std::fs::File>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The reason a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The surface sent the stop sentinel.
    StopCommand,

    /// The surface closed the connection.
    PeerClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Link error: {0}")]
    LinkError(#[from] LinkError),

    #[error("Allocation error: {0}")]
    AllocError(#[from] AllocError),

    #[error("Invalid PID parameters for {0:?}: {1}")]
    InvalidPidParams(Dof, PidParamsError),

    #[error("PID control mode requires an axis sensor but none was provided")]
    MissingSensor,

    #[error("Stage error: {0}")]
    StageError(#[from] StageError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<S> CtrlPipeline<S>
where
    S: Read + Write,
{
    /// Create a new pipeline for one session, starting the hardware stages.
    pub fn new(
        link: VehicleLink<S>,
        params: &Params,
        alloc: ThrustAlloc,
        actuator: Box<dyn Actuator + Send>,
        sensor: Option<Box<dyn AxisSensor + Send>>,
    ) -> Result<Self, PipelineError> {
        params
            .pid
            .validate()
            .map_err(|(dof, e)| PipelineError::InvalidPidParams(dof, e))?;

        if params.mode == CtrlMode::Pid && sensor.is_none() {
            return Err(PipelineError::MissingSensor);
        }

        let timeout = params.stage_timeout();

        let mut actuator = actuator;
        let actuation = StageHandle::spawn("actuation", timeout, move |dems: ThrusterDems| {
            actuator.actuate(&dems)
        })?;

        let sensing = match sensor {
            Some(mut s) => Some(StageHandle::spawn("sensing", timeout, move |_: ()| {
                s.sense()
            })?),
            None => None,
        };

        let pids = params
            .pid
            .to_array()
            .iter()
            .map(|p| PidController::new(*p))
            .collect();

        info!(
            "Control pipeline ready: {:?} mode, {} thrusters",
            params.mode,
            alloc.num_thrusters()
        );

        Ok(Self {
            link,
            mode: params.mode,
            pids,
            alloc,
            actuation,
            sensing,
            epoch: Instant::now(),
            cycle: 0,
            archive: None,
        })
    }

    /// Append every telemetry record sent from now on to the file at `path`.
    pub fn set_archive<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.archive = Some(BufWriter::new(file));
        Ok(())
    }

    /// Number of cycles executed so far.
    pub fn num_cycles(&self) -> u64 {
        self.cycle
    }

    /// Run cycles until the session ends.
    ///
    /// Errors end the session, but the thrusters are still driven to neutral first.
    pub fn run(&mut self) -> Result<SessionEnd, PipelineError> {
        loop {
            match self.step() {
                Ok(None) => (),
                Ok(Some(end)) => {
                    info!("Session ended after {} cycles: {:?}", self.cycle, end);
                    return Ok(end);
                }
                Err(e) => {
                    error!("Session aborted: {}", e);
                    self.safe_stop();
                    return Err(e);
                }
            }
        }
    }

    /// Execute one cycle, returning the reason the session ended if it has.
    pub fn step(&mut self) -> Result<Option<SessionEnd>, PipelineError> {
        let tm = match self.link.recv_cmd()? {
            CmdRecv::Cmd(CtrlMsg::Demand(cmd)) => self.process_demand(&cmd)?,
            CmdRecv::Cmd(CtrlMsg::Stop) => {
                info!("Stop command received");

                let mut tm = Tm::new(self.cycle, CmdStatus::Stopped);
                let (dems, reading) = self.safe_stop();
                tm.wrench = Some([0f64; NUM_DOF]);
                tm.thr_dems = dems;
                tm.sens_reading = reading;

                self.emit_tm(&tm)?;

                return Ok(Some(SessionEnd::StopCommand));
            }
            CmdRecv::Invalid { line, error } => {
                warn!("Invalid command {:?} ignored: {}", line, error);
                Tm::new(self.cycle, CmdStatus::Invalid)
            }
            CmdRecv::Closed => {
                info!("Surface closed the connection");
                self.safe_stop();
                return Ok(Some(SessionEnd::PeerClosed));
            }
        };

        self.emit_tm(&tm)?;

        Ok(None)
    }

    /// Send the cycle's telemetry to the surface and archive it, ending the cycle.
    fn emit_tm(&mut self, tm: &Tm) -> Result<(), PipelineError> {
        self.link.send_tm(tm)?;
        self.cycle += 1;

        if let Some(ref mut w) = self.archive {
            let res = serde_json::to_writer(&mut *w, tm)
                .map_err(std::io::Error::from)
                .and_then(|_| writeln!(w))
                .and_then(|_| w.flush());

            if let Err(e) = res {
                warn!("Could not archive telemetry, archiving disabled: {}", e);
                self.archive = None;
            }
        }

        Ok(())
    }

    /// Run the control chain for one demand.
    fn process_demand(&mut self, cmd: &CtrlCmd) -> Result<Tm, PipelineError> {
        let mut tm = Tm::new(self.cycle, CmdStatus::Ok);
        tm.demand = Some(cmd.dofs);
        tm.aux = cmd.aux.clone();

        let wrench = match self.mode {
            CtrlMode::Direct => cmd.dofs,
            CtrlMode::Pid => match self.sense() {
                Some(meas) => {
                    let time_s = self.epoch.elapsed().as_secs_f64();
                    let mut out = [0f64; NUM_DOF];

                    for (i, pid) in self.pids.iter_mut().enumerate() {
                        pid.set_target(cmd.dofs[i]);
                        out[i] = pid.update(meas[i], time_s);
                    }

                    tm.axis_meas = Some(meas);
                    tm.pid_output = Some(out);
                    out
                }
                None => {
                    // Without feedback the controllers cannot run, hold the vehicle neutral
                    warn!("No axis measurement available, commanding a zero wrench");
                    [0f64; NUM_DOF]
                }
            },
        };

        let alloc_out = match self.alloc.process(&Wrench::from_column_slice(&wrench)) {
            Ok(o) => o,
            Err(e @ AllocError::NonFiniteOutput(_)) => {
                warn!("Demand {:?} rejected: {}", wrench, e);
                tm.cmd_status = CmdStatus::Invalid;
                return Ok(tm);
            }
            Err(e) => return Err(e.into()),
        };

        trace!("Raw thruster commands: {:?}", alloc_out.raw);
        debug!("Cycle {}: {:?}", self.cycle, alloc_out.dems.act);

        tm.sens_reading = self.actuate(&alloc_out.dems);
        tm.wrench = Some(wrench);
        tm.thr_raw = alloc_out.raw;
        tm.thr_dems = Some(alloc_out.dems);

        Ok(tm)
    }

    /// Get the current axis measurement, `None` if it is unavailable.
    fn sense(&mut self) -> Option<[f64; NUM_DOF]> {
        let stage = self.sensing.as_mut()?;

        match stage.request(()) {
            Ok(Ok(m)) => Some(m),
            Ok(Err(e)) => {
                warn!("Sensing failed: {}", e);
                None
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Send demands to the actuators, returning the hardware's reading if there was one.
    fn actuate(&mut self, dems: &ThrusterDems) -> Option<SensReading> {
        match self.actuation.request(dems.clone()) {
            Ok(Ok(r)) => Some(r),
            Ok(Err(e)) => {
                warn!("Actuation failed: {}", e);
                None
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Drive the thrusters to neutral and reset the controllers.
    fn safe_stop(&mut self) -> (Option<ThrusterDems>, Option<SensReading>) {
        for pid in self.pids.iter_mut() {
            pid.reset();
        }

        match self.alloc.neutral_dems() {
            Ok(dems) => {
                info!("Driving thrusters to neutral");
                let reading = self.actuate(&dems);
                (Some(dems), reading)
            }
            Err(e) => {
                error!("Could not compute neutral demands: {}", e);
                (None, None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        eqpt::FixedSensor,
        thrust_alloc::{self, ThrusterSpec},
    };
    use comms_if::net::{NetParams, SurfaceLink};
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    struct MemStream {
        input: Cursor<Vec<u8>>,
        output: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for MemStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MemStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Records every actuation it is given.
    struct RecordingActuator(Arc<Mutex<Vec<ThrusterDems>>>);

    impl Actuator for RecordingActuator {
        fn actuate(&mut self, dems: &ThrusterDems) -> Result<SensReading, EqptError> {
            self.0.lock().unwrap().push(dems.clone());
            Ok(SensReading(String::from("ack")))
        }
    }

    /// Actuator whose device never opened.
    struct MissingActuator;

    impl Actuator for MissingActuator {
        fn actuate(&mut self, _: &ThrusterDems) -> Result<SensReading, EqptError> {
            Err(EqptError::HardwareUnavailable("/dev/ttyACM0".into()))
        }
    }

    fn heave_alloc() -> ThrustAlloc {
        let spec = |x: f64| ThrusterSpec {
            pos_m_vb: [x, 0.0, 0.0],
            dir_vb: [0.0, 0.0, 1.0],
        };

        ThrustAlloc::new(&thrust_alloc::Params {
            thrusters: vec![spec(1.0), spec(-1.0), spec(1.0), spec(-1.0)],
            ..Default::default()
        })
        .unwrap()
    }

    /// Run a whole session over the given input, returning the end, the telemetry and the
    /// actuations.
    fn run_session(
        input: &[u8],
        params: &Params,
        actuator: Option<Box<dyn Actuator + Send>>,
        sensor: Option<Box<dyn AxisSensor + Send>>,
    ) -> (
        Result<SessionEnd, PipelineError>,
        Vec<Tm>,
        Vec<ThrusterDems>,
    ) {
        let output = Arc::new(Mutex::new(Vec::new()));
        let actuations = Arc::new(Mutex::new(Vec::new()));
        let net = NetParams::default();

        let link = VehicleLink::new(
            MemStream {
                input: Cursor::new(input.to_vec()),
                output: output.clone(),
            },
            &net,
        );

        let actuator: Box<dyn Actuator + Send> = match actuator {
            Some(a) => a,
            None => Box::new(RecordingActuator(actuations.clone())),
        };

        let end = {
            let mut pipeline =
                CtrlPipeline::new(link, params, heave_alloc(), actuator, sensor).unwrap();
            pipeline.run()
        };

        // Decode all telemetry sent to the surface
        let wire = output.lock().unwrap().clone();
        let mut surface = SurfaceLink::new(Cursor::new(wire), &net);
        let mut tms = Vec::new();
        while let Some(tm) = surface.recv_tm().unwrap() {
            tms.push(tm);
        }

        let acts = actuations.lock().unwrap().clone();
        (end, tms, acts)
    }

    #[test]
    fn test_direct_session() {
        let (end, tms, acts) = run_session(
            b"0,0,1,0,0,0,R\n0,0,0.5,0,0,0,0.3,R\nq\n",
            &Params::default(),
            None,
            None,
        );

        assert_eq!(end.unwrap(), SessionEnd::StopCommand);

        // One telemetry frame per command line
        assert_eq!(tms.len(), 3);
        assert_eq!(tms[0].cycle, 0);
        assert_eq!(tms[0].cmd_status, CmdStatus::Ok);
        assert_eq!(tms[0].thr_raw, vec![1.0; 4]);
        assert_eq!(tms[0].sens_reading, Some(SensReading("ack".into())));
        assert_eq!(tms[1].aux, vec![0.3]);
        assert_eq!(tms[2].cmd_status, CmdStatus::Stopped);

        // Final actuation is neutral
        assert_eq!(acts.len(), 3);
        assert_eq!(acts[0].act, vec![2000.0; 4]);
        assert_eq!(acts[1].act, vec![1750.0; 4]);
        assert_eq!(acts[2].act, vec![1500.0; 4]);
    }

    #[test]
    fn test_invalid_command() {
        let (end, tms, acts) = run_session(
            b"0,0,abc,0,0,0,R\n0,0,1,0,0,0,R\n",
            &Params::default(),
            None,
            None,
        );

        assert_eq!(end.unwrap(), SessionEnd::PeerClosed);

        assert_eq!(tms.len(), 2);
        assert_eq!(tms[0].cmd_status, CmdStatus::Invalid);
        assert_eq!(tms[0].thr_dems, None);
        assert_eq!(tms[1].cycle, 1);

        // Invalid command does not actuate, closing drives neutral
        assert_eq!(acts.len(), 2);
        assert_eq!(acts[1].act, vec![1500.0; 4]);
    }

    #[test]
    fn test_overflowing_demand() {
        let (end, tms, acts) = run_session(
            b"0,0,1e306,0,0,0,R\n0,0,1,0,0,0,R\n",
            &Params::default(),
            None,
            None,
        );

        assert_eq!(end.unwrap(), SessionEnd::PeerClosed);

        // Telemetry stays decodable and the thrusters are not driven
        assert_eq!(tms.len(), 2);
        assert_eq!(tms[0].cmd_status, CmdStatus::Invalid);
        assert_eq!(tms[0].demand.unwrap()[2], 1e306);
        assert_eq!(tms[0].thr_dems, None);
        assert_eq!(tms[1].cmd_status, CmdStatus::Ok);

        assert_eq!(acts.len(), 2);
        assert_eq!(acts[0].act, vec![2000.0; 4]);
    }

    #[test]
    fn test_framing_error_stops() {
        let mut input = b"0,0,1,0,0,0,R\n".to_vec();
        input.extend(std::iter::repeat(b'x').take(NetParams::default().max_line_len + 1));

        let (end, tms, acts) = run_session(&input, &Params::default(), None, None);

        assert!(matches!(end, Err(PipelineError::LinkError(_))));
        assert_eq!(tms.len(), 1);
        assert_eq!(acts.last().unwrap().act, vec![1500.0; 4]);
    }

    #[test]
    fn test_hardware_unavailable() {
        let (end, tms, _) = run_session(
            b"0,0,1,0,0,0,R\nq\n",
            &Params::default(),
            Some(Box::new(MissingActuator)),
            None,
        );

        assert_eq!(end.unwrap(), SessionEnd::StopCommand);
        assert_eq!(tms[0].sens_reading, None);
        assert_eq!(tms[0].thr_dems.as_ref().unwrap().act, vec![2000.0; 4]);
    }

    #[test]
    fn test_pid_mode() {
        let mut params = Params {
            mode: CtrlMode::Pid,
            ..Default::default()
        };
        params.pid.heave.k_p = 1.0;

        // Sensor reports the vehicle 0.4 above the heave setpoint
        let sensor = FixedSensor::new([0.0, 0.0, 0.4, 0.0, 0.0, 0.0]);

        let (end, tms, acts) = run_session(
            b"0,0,0,0,0,0,R\n",
            &params,
            None,
            Some(Box::new(sensor)),
        );

        assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
        assert_eq!(tms[0].axis_meas.unwrap()[2], 0.4);
        assert_eq!(tms[0].pid_output.unwrap()[2], -0.4);
        assert_eq!(tms[0].wrench.unwrap()[2], -0.4);
        assert_eq!(acts[0].act, vec![1300.0; 4]);
    }

    #[test]
    fn test_archive() {
        let path = std::env::temp_dir().join(format!("rov_tm_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let link = VehicleLink::new(
            MemStream {
                input: Cursor::new(b"0,0,1,0,0,0,R\nbad\nq\n".to_vec()),
                output: Arc::new(Mutex::new(Vec::new())),
            },
            &NetParams::default(),
        );
        let mut pipeline = CtrlPipeline::new(
            link,
            &Params::default(),
            heave_alloc(),
            Box::new(crate::eqpt::DryRunActuator::new("R")),
            None,
        )
        .unwrap();
        pipeline.set_archive(&path).unwrap();

        assert_eq!(pipeline.run().unwrap(), SessionEnd::StopCommand);
        assert_eq!(pipeline.num_cycles(), 3);
        drop(pipeline);

        let archived: Vec<Tm> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        std::fs::remove_file(&path).unwrap();

        let statuses: Vec<CmdStatus> = archived.iter().map(|t| t.cmd_status).collect();
        assert_eq!(
            statuses,
            vec![CmdStatus::Ok, CmdStatus::Invalid, CmdStatus::Stopped]
        );
    }

    #[test]
    fn test_pid_mode_requires_sensor() {
        let params = Params {
            mode: CtrlMode::Pid,
            ..Default::default()
        };
        let link = VehicleLink::new(
            MemStream {
                input: Cursor::new(Vec::new()),
                output: Arc::new(Mutex::new(Vec::new())),
            },
            &NetParams::default(),
        );

        let res = CtrlPipeline::new(
            link,
            &params,
            heave_alloc(),
            Box::new(crate::eqpt::DryRunActuator::new("R")),
            None,
        );

        assert!(matches!(res, Err(PipelineError::MissingSensor)));
    }
}
