//! Leader liveness monitor.
//!
//! Runs next to the election coordinator on its own socket and thread. The
//! leader answers probes; every other node probes the leader once per
//! [`Config::average_election_time`] and asks for a new election when the
//! leader stays silent for [`Config::probe_timeout`].

#[cfg(test)]
mod tests;

use std::cmp;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::election::ElectionHandle;
use crate::error::Error;
use crate::peer::Peer;
use crate::protocol::{decode_probe, Probe};

const RECEIVE_BUFFER_SIZE: usize = 8;

pub struct LivenessMonitor {
    me: Peer,
    config: Config,
    socket: UdpSocket,
    election: ElectionHandle,
    running: Arc<AtomicBool>,
    last_leader: Option<Peer>,
    buffer: [u8; RECEIVE_BUFFER_SIZE],
}

impl LivenessMonitor {
    pub(crate) fn new(
        me: Peer,
        config: Config,
        socket: UdpSocket,
        election: ElectionHandle,
        running: Arc<AtomicBool>,
    ) -> Self {
        LivenessMonitor {
            me,
            config,
            socket,
            election,
            running,
            last_leader: None,
            buffer: [0; RECEIVE_BUFFER_SIZE],
        }
    }

    pub fn run(mut self) {
        info!("liveness monitor of {} started", self.me);

        while self.is_running() {
            match self.election.elected() {
                Ok(leader) => {
                    self.last_leader = Some(leader);

                    if leader == self.me {
                        self.idle(self.config.poll_interval);
                    } else {
                        self.probe(&leader);
                    }
                }
                // election in progress, nobody is the leader until it ends
                Err(_) => {
                    self.last_leader = None;
                    self.idle(self.config.average_election_time);
                }
            }
        }

        info!("liveness monitor of {} stopped", self.me);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_leader(&self) -> bool {
        self.last_leader == Some(self.me)
    }

    /// Send one probe to `leader` and trigger an election if it stays unanswered.
    fn probe(&mut self, leader: &Peer) {
        let leader_addr = match leader.liveness_addr(self.config.liveness_port_base) {
            Some(leader_addr) => leader_addr,
            None => {
                error!("{}: leader {} has no liveness port", self.me, leader);
                self.idle(self.config.average_election_time);
                return;
            }
        };

        match self.socket.send_to(&Probe::Ping.encode(), leader_addr) {
            Ok(_) => {
                if self.await_ack(leader_addr) {
                    debug!("{}: leader {} is alive", self.me, leader);
                } else if self.is_running() {
                    warn!(
                        "{}: leader {} did not answer within {:?}, starting a new election",
                        self.me, leader, self.config.probe_timeout
                    );
                    self.election.start_new_election();
                }
            }
            Err(err) => error!("{}: could not probe leader {}: {}", self.me, leader, err),
        }

        self.idle(self.config.average_election_time);
    }

    fn await_ack(&mut self, leader_addr: SocketAddr) -> bool {
        let deadline = Instant::now() + self.config.probe_timeout;

        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let wait = cmp::min(deadline - now, self.config.poll_interval);

            match self.receive(wait) {
                Ok(Some((Probe::Ack, from))) if from == leader_addr => return true,
                Ok(Some((Probe::Ack, from))) => {
                    debug!("{}: ignoring PROBE_ACK from {}", self.me, from)
                }
                Ok(Some((Probe::Ping, from))) => self.answer(from),
                Ok(None) => {}
                Err(err) => self.report(err),
            }
        }

        false
    }

    /// Wait for `duration`, answering probes meanwhile if we are the leader.
    fn idle(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;

        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return;
            }

            let wait = cmp::min(deadline - now, self.config.poll_interval);

            match self.receive(wait) {
                Ok(Some((Probe::Ping, from))) => self.answer(from),
                Ok(Some((Probe::Ack, from))) => {
                    debug!("{}: late PROBE_ACK from {}", self.me, from)
                }
                Ok(None) => {}
                Err(err) => self.report(err),
            }
        }
    }

    fn answer(&self, to: SocketAddr) {
        if !self.is_leader() {
            debug!("{}: probed by {} but not the leader", self.me, to);
            return;
        }

        if let Err(err) = self.socket.send_to(&Probe::Ack.encode(), to) {
            error!("{}: could not answer probe from {}: {}", self.me, to, err);
        }
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<(Probe, SocketAddr)>, Error> {
        self.socket.set_read_timeout(Some(timeout))?;

        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, from)) => {
                let probe = decode_probe(&self.buffer[..len])?;
                Ok(Some((probe, from)))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(err) => Err(Error::Transport(err)),
        }
    }

    fn report(&self, err: Error) {
        match err {
            // echo of an earlier probe to a closed port
            Error::Transport(err) if err.kind() == ErrorKind::ConnectionRefused => {}
            Error::Protocol(err) => warn!("{}: discarding probe datagram: {}", self.me, err),
            err => error!("{}: liveness receive failed: {}", self.me, err),
        }
    }
}
