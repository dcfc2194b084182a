//! Whole session tests over a loopback TCP connection.

use std::{
    net::{TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
};

use comms_if::{
    eqpt::{SensReading, ThrusterDems},
    net::{NetParams, SurfaceLink, VehicleLink},
    tc::{CtrlCmd, CtrlMsg},
    tm::CmdStatus,
};
use rov_lib::{
    ctrl_pipeline::{self, CtrlPipeline, PipelineError, SessionEnd},
    eqpt::{Actuator, EqptError},
    thrust_alloc::{self, ThrustAlloc, ThrusterSpec},
};

type Actuations = Arc<Mutex<Vec<ThrusterDems>>>;

struct RecordingActuator(Actuations);

impl Actuator for RecordingActuator {
    fn actuate(&mut self, dems: &ThrusterDems) -> Result<SensReading, EqptError> {
        self.0.lock().unwrap().push(dems.clone());
        Ok(SensReading(format!("{}", dems.len())))
    }
}

fn alloc() -> ThrustAlloc {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let spec = |pos_m_vb: [f64; 3], dir_vb: [f64; 3]| ThrusterSpec { pos_m_vb, dir_vb };

    ThrustAlloc::new(&thrust_alloc::Params {
        thrusters: vec![
            spec([0.2, 0.15, 0.0], [h, -h, 0.0]),
            spec([0.2, -0.15, 0.0], [h, h, 0.0]),
            spec([-0.2, 0.15, 0.0], [h, h, 0.0]),
            spec([-0.2, -0.15, 0.0], [h, -h, 0.0]),
            spec([0.0, 0.15, 0.0], [0.0, 0.0, 1.0]),
            spec([0.0, -0.15, 0.0], [0.0, 0.0, 1.0]),
        ],
        ..Default::default()
    })
    .unwrap()
}

/// Start a vehicle serving one session on an ephemeral port.
fn start_vehicle() -> (
    String,
    Actuations,
    thread::JoinHandle<Result<SessionEnd, PipelineError>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let actuations = Actuations::default();
    let acts = actuations.clone();

    let jh = thread::spawn(move || {
        let (link, _) = VehicleLink::accept_from(&listener, &NetParams::default()).unwrap();
        let mut pipeline = CtrlPipeline::new(
            link,
            &ctrl_pipeline::Params::default(),
            alloc(),
            Box::new(RecordingActuator(acts)),
            None,
        )
        .unwrap();

        pipeline.run()
    });

    (addr, actuations, jh)
}

fn connect(addr: &str) -> SurfaceLink<TcpStream> {
    let params = NetParams {
        vehicle_addr: addr.to_string(),
        ..Default::default()
    };

    SurfaceLink::connect(&params).unwrap()
}

#[test]
fn session_with_stop() {
    let (addr, actuations, jh) = start_vehicle();
    let mut surface = connect(&addr);

    let demands = [
        [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        [0.5, 0.0, 0.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0, 0.0, 0.2],
    ];

    for (i, d) in demands.iter().enumerate() {
        surface
            .send_cmd(&CtrlMsg::Demand(CtrlCmd::from_dofs(*d)))
            .unwrap();

        let tm = surface.recv_tm().unwrap().unwrap();
        assert_eq!(tm.cycle, i as u64);
        assert_eq!(tm.cmd_status, CmdStatus::Ok);
        assert_eq!(tm.demand, Some(*d));
        assert_eq!(tm.thr_raw.len(), 6);
        assert_eq!(tm.sens_reading, Some(SensReading("6".into())));
    }

    surface.send_cmd(&CtrlMsg::Stop).unwrap();
    let tm = surface.recv_tm().unwrap().unwrap();
    assert_eq!(tm.cmd_status, CmdStatus::Stopped);

    // Vehicle closes the connection once stopped
    assert_eq!(surface.recv_tm().unwrap(), None);
    assert_eq!(jh.join().unwrap().unwrap(), SessionEnd::StopCommand);

    let acts = actuations.lock().unwrap();
    assert_eq!(acts.len(), 4);

    // Pure heave only drives the vertical thrusters
    assert_eq!(&acts[0].act[..4], &[1500.0; 4]);
    assert_eq!(&acts[0].act[4..], &[2000.0; 2]);

    // Stop leaves every thruster at neutral
    assert_eq!(acts[3].act, vec![1500.0; 6]);
}

#[test]
fn invalid_command_then_close() {
    let (addr, actuations, jh) = start_vehicle();
    let stream = TcpStream::connect(&addr).unwrap();
    let mut surface = SurfaceLink::new(stream.try_clone().unwrap(), &NetParams::default());

    // Raw line through the surface link's stream
    use std::io::Write;
    (&stream).write_all(b"1.0,nope,2\n").unwrap();

    let tm = surface.recv_tm().unwrap().unwrap();
    assert_eq!(tm.cmd_status, CmdStatus::Invalid);
    assert_eq!(tm.thr_dems, None);

    // Closing without a stop still drives the thrusters to neutral
    drop(surface);
    stream.shutdown(std::net::Shutdown::Both).unwrap();

    assert_eq!(jh.join().unwrap().unwrap(), SessionEnd::PeerClosed);

    let acts = actuations.lock().unwrap();
    assert_eq!(acts.len(), 1);
    assert_eq!(acts[0].act, vec![1500.0; 6]);
}
