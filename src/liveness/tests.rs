use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};

use crate::config::Config;
use crate::election::{ElectionHandle, Phase, Status, Trigger};
use crate::liveness::LivenessMonitor;
use crate::peer::{PeerId, PeerTable};
use crate::protocol::{decode_probe, Probe};

const LIVENESS_PORT_BASE: u16 = 47100;

fn table() -> PeerTable {
    PeerTable::new(vec![
        (SocketAddr::from(([127, 0, 0, 1], 47000)), 1),
        (SocketAddr::from(([127, 0, 0, 1], 47001)), 2),
    ])
    .unwrap()
}

fn config() -> Config {
    Config {
        probe_timeout: Duration::from_millis(200),
        average_election_time: Duration::from_millis(100),
        poll_interval: Duration::from_millis(20),
        liveness_port_base: LIVENESS_PORT_BASE,
        ..Default::default()
    }
}

struct Monitor {
    status: Arc<RwLock<Status>>,
    running: Arc<AtomicBool>,
    triggers: Receiver<Trigger>,
    join_handle: JoinHandle<()>,
}

impl Monitor {
    fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.join_handle.join().unwrap();
    }
}

/// Start a monitor for peer #0 that believes `leader` was elected.
fn start_monitor(leader: PeerId) -> Monitor {
    let table = table();
    let me = *table.get(0).unwrap();

    let status = Arc::new(RwLock::new(Status {
        phase: Phase::Elected,
        leader: Some(leader),
    }));
    let (sender, triggers) = unbounded();
    let handle = ElectionHandle::new(table, status.clone(), sender);

    let socket = UdpSocket::bind(me.liveness_addr(LIVENESS_PORT_BASE).unwrap()).unwrap();
    let running = Arc::new(AtomicBool::new(true));

    let monitor = LivenessMonitor::new(me, config(), socket, handle, running.clone());
    let join_handle = thread::spawn(move || monitor.run());

    Monitor {
        status,
        running,
        triggers,
        join_handle,
    }
}

/// Send one ping to peer #0 and wait `timeout` for its answer.
fn ping_monitor(prober: &UdpSocket, timeout: Duration) -> Option<Probe> {
    let me = *table().get(0).unwrap();
    prober.set_read_timeout(Some(timeout)).unwrap();
    prober
        .send_to(
            &Probe::Ping.encode(),
            me.liveness_addr(LIVENESS_PORT_BASE).unwrap(),
        )
        .unwrap();

    let mut buf = [0; 8];
    match prober.recv_from(&mut buf) {
        Ok((len, _)) => Some(decode_probe(&buf[..len]).unwrap()),
        Err(_) => None,
    }
}

fn leader_socket() -> UdpSocket {
    let leader = *table().get(1).unwrap();
    let socket = UdpSocket::bind(leader.liveness_addr(LIVENESS_PORT_BASE).unwrap()).unwrap();
    socket
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    socket
}

#[test]
#[serial]
fn test_silent_leader_triggers_election() {
    // bound but never answering
    let _leader = leader_socket();
    let monitor = start_monitor(1);

    assert_eq!(
        monitor.triggers.recv_timeout(Duration::from_secs(5)),
        Ok(Trigger::StartElection)
    );

    monitor.stop();
}

#[test]
#[serial]
fn test_answering_leader_is_left_alone() {
    let leader = leader_socket();
    let leader_running = Arc::new(AtomicBool::new(true));

    let answering = leader_running.clone();
    let responder = thread::spawn(move || {
        let mut buf = [0; 8];
        let mut probes = 0;

        while answering.load(Ordering::SeqCst) {
            if let Ok((len, from)) = leader.recv_from(&mut buf) {
                assert_eq!(decode_probe(&buf[..len]), Ok(Probe::Ping));
                let _ = leader.send_to(&Probe::Ack.encode(), from);
                probes += 1;
            }
        }

        probes
    });

    let monitor = start_monitor(1);

    assert!(monitor.triggers.recv_timeout(Duration::from_secs(1)).is_err());

    monitor.stop();

    leader_running.store(false, Ordering::SeqCst);
    assert!(responder.join().unwrap() > 0);
}

#[test]
#[serial]
fn test_leader_answers_probes() {
    let monitor = start_monitor(0);
    let prober = UdpSocket::bind("127.0.0.1:0").unwrap();

    // the monitor may not have read its status yet
    let answered =
        (0..5).any(|_| ping_monitor(&prober, Duration::from_secs(2)) == Some(Probe::Ack));

    assert!(answered);
    assert!(monitor.triggers.try_recv().is_err());

    monitor.stop();
}

#[test]
#[serial]
fn test_demoted_leader_stops_answering() {
    let monitor = start_monitor(0);
    let prober = UdpSocket::bind("127.0.0.1:0").unwrap();

    let answered =
        (0..5).any(|_| ping_monitor(&prober, Duration::from_secs(2)) == Some(Probe::Ack));
    assert!(answered);

    *monitor.status.write().unwrap() = Status::default();
    // let the monitor notice the running election
    thread::sleep(Duration::from_millis(300));

    assert_eq!(ping_monitor(&prober, Duration::from_millis(500)), None);

    monitor.stop();
}
