#![allow(dead_code)]

use std::net::SocketAddr;
use std::thread::sleep;
use std::time::{Duration, Instant};

use ring_elector::{Config, Node, PeerId, PeerTable};

pub const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(20);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config(liveness_port_base: u16) -> Config {
    Config {
        ack_timeout: Duration::from_millis(200),
        probe_timeout: Duration::from_millis(200),
        average_election_time: Duration::from_millis(200),
        poll_interval: Duration::from_millis(20),
        election_stall_timeout: Duration::from_secs(3),
        restart_backoff: Duration::from_millis(100),
        liveness_port_base,
    }
}

/// Localhost ring, one `(port, aptitude)` entry per peer.
pub fn table(peers: &[(u16, u8)]) -> PeerTable {
    PeerTable::new(
        peers
            .iter()
            .map(|(port, aptitude)| (SocketAddr::from(([127, 0, 0, 1], *port)), *aptitude)),
    )
    .unwrap()
}

/// Ring spread over loopback addresses, one `(address, port, aptitude)` entry per peer.
pub fn table_on(peers: &[([u8; 4], u16, u8)]) -> PeerTable {
    PeerTable::new(
        peers
            .iter()
            .map(|(address, port, aptitude)| (SocketAddr::from((*address, *port)), *aptitude)),
    )
    .unwrap()
}

pub fn start_nodes(table: &PeerTable, ids: &[PeerId], config: &Config) -> Vec<Node> {
    ids.iter()
        .map(|id| {
            let mut node = Node::new(table.clone(), *id, config.clone()).unwrap();
            node.start().unwrap();
            node
        })
        .collect()
}

/// Wait until every node reports `leader` as elected.
pub fn wait_for_leader(nodes: &[Node], leader: PeerId, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        let agreed = nodes.iter().all(|node| match node.elected() {
            Ok(elected) => elected.id() == leader,
            Err(_) => false,
        });

        if agreed {
            return true;
        }

        sleep(Duration::from_millis(20));
    }

    false
}

pub fn stop_nodes(nodes: &mut [Node]) {
    for node in nodes.iter_mut() {
        node.stop();
    }
}
