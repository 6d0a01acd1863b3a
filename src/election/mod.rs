//! Ring election coordinator.
//!
//! The [`Coordinator`] owns the election socket of a node and runs on its own
//! thread. Every `Election` and `Result` it forwards goes through a reliable
//! send: the datagram is sent to the successor, and if no `Response` comes back
//! within [`Config::ack_timeout`] the successor is presumed crashed and the next
//! peer around the ring is tried instead. Messages arriving during that wait
//! are acknowledged at once but only processed once the wait is over.
//!
//! Other threads interact with the coordinator through an [`ElectionHandle`]:
//! they read the published [`Status`] and may ask for a new election.


mod state;

pub use state::{Ballot, Outcome, Phase, Status};

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use rand::Rng;

use crate::config::Config;
use crate::error::Error;
use crate::node::NodeEvent;
use crate::peer::{Peer, PeerTable};
use crate::protocol::{decode, Message};

const RECEIVE_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    StartElection,
}

/// Thread-safe view on a running election.
#[derive(Clone)]
pub struct ElectionHandle {
    table: PeerTable,
    status: Arc<RwLock<Status>>,
    triggers: Sender<Trigger>,
}

impl ElectionHandle {
    pub(crate) fn new(
        table: PeerTable,
        status: Arc<RwLock<Status>>,
        triggers: Sender<Trigger>,
    ) -> Self {
        ElectionHandle {
            table,
            status,
            triggers,
        }
    }

    pub fn status(&self) -> Status {
        match self.status.read() {
            Ok(status) => *status,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.status().phase
    }

    /// The elected leader, or [`Error::NotReady`] while an election is running.
    pub fn elected(&self) -> Result<Peer, Error> {
        match self.status() {
            Status {
                phase: Phase::Elected,
                leader: Some(id),
            } => self.table.get(id).copied().ok_or(Error::UnknownPeer(id)),
            _ => Err(Error::NotReady),
        }
    }

    /// Ask the coordinator to drop the current leader and elect a new one.
    pub fn start_new_election(&self) {
        let _ = self.triggers.send(Trigger::StartElection);
    }
}

struct Inbound {
    message: Message,
    from: SocketAddr,
}

pub struct Coordinator {
    table: PeerTable,
    me: Peer,
    config: Config,
    socket: UdpSocket,
    ballot: Ballot,
    published: Status,
    status: Arc<RwLock<Status>>,
    triggers: Receiver<Trigger>,
    running: Arc<AtomicBool>,
    events: Sender<NodeEvent>,
    deferred: VecDeque<Inbound>,
    restart_at: Option<Instant>,
    // refreshed whenever a message moves the election forward
    last_progress: Instant,
    stall_timeout: Duration,
    buffer: [u8; RECEIVE_BUFFER_SIZE],
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        table: PeerTable,
        me: Peer,
        config: Config,
        socket: UdpSocket,
        status: Arc<RwLock<Status>>,
        triggers: Receiver<Trigger>,
        running: Arc<AtomicBool>,
        events: Sender<NodeEvent>,
    ) -> Self {
        let stall_timeout = config.stall_timeout(table.len());

        Coordinator {
            table,
            me,
            config,
            socket,
            ballot: Ballot::new(me),
            published: Status::default(),
            status,
            triggers,
            running,
            events,
            deferred: VecDeque::new(),
            restart_at: None,
            last_progress: Instant::now(),
            stall_timeout,
            buffer: [0; RECEIVE_BUFFER_SIZE],
        }
    }

    /// Serve the election channel until the running flag is cleared.
    pub fn run(mut self) {
        info!("election coordinator of {} started", self.me);

        while self.is_running() {
            self.poll_triggers();
            self.check_restart();

            match self.receive(self.config.poll_interval) {
                Ok(Some(inbound)) => self.on_inbound(inbound),
                Ok(None) => {}
                Err(Error::Transport(err)) if err.kind() == ErrorKind::ConnectionRefused => {
                    debug!("{}: peer port unreachable: {}", self.me, err)
                }
                Err(Error::Protocol(err)) => warn!("{}: discarding datagram: {}", self.me, err),
                Err(err) => error!("{}: receive failed: {}", self.me, err),
            }

            self.process_deferred();
        }

        info!("election coordinator of {} stopped", self.me);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn poll_triggers(&mut self) {
        let mut requested = false;

        while let Ok(Trigger::StartElection) = self.triggers.try_recv() {
            requested = true;
        }

        if requested {
            self.start_election();
        }
    }

    fn check_restart(&mut self) {
        let now = Instant::now();

        match self.restart_at {
            Some(restart_at) if now >= restart_at => self.start_election(),
            Some(_) => {}
            None => {
                if self.ballot.phase() != Phase::Elected
                    && now.duration_since(self.last_progress) >= self.stall_timeout
                {
                    warn!(
                        "{}: no progress for {:?} in phase {:?}, restarting election",
                        self.me,
                        self.stall_timeout,
                        self.ballot.phase()
                    );
                    self.schedule_restart();
                }
            }
        }
    }

    fn schedule_restart(&mut self) {
        let backoff = self.config.restart_backoff.as_millis() as u64;
        let delay = if backoff == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=backoff)
        };

        self.last_progress = Instant::now();
        self.restart_at = Some(self.last_progress + Duration::from_millis(delay));
    }

    fn start_election(&mut self) {
        self.restart_at = None;
        self.last_progress = Instant::now();

        let message = self.ballot.start();
        info!("{} starts a new election", self.me);
        let _ = self.events.send(NodeEvent::ElectionStarted);

        self.publish_status();
        self.reliable_send(message);
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<Inbound>, Error> {
        self.socket.set_read_timeout(Some(timeout))?;

        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, from)) => {
                let message = decode(&self.buffer[..len], &self.table)?;
                Ok(Some(Inbound { message, from }))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(err) => Err(Error::Transport(err)),
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        match inbound.message {
            Message::Response => warn!(
                "{}: RESPONSE from {} while no acknowledgment is awaited",
                self.me, inbound.from
            ),
            Message::Election(_) | Message::Result(_) => {
                self.acknowledge(inbound.from);
                self.dispatch(inbound);
            }
        }
    }

    fn acknowledge(&self, to: SocketAddr) {
        if let Err(err) = self.socket.send_to(&Message::Response.encode(), to) {
            error!("{}: could not acknowledge {}: {}", self.me, to, err);
        }
    }

    fn process_deferred(&mut self) {
        while self.is_running() {
            match self.deferred.pop_front() {
                Some(inbound) => self.dispatch(inbound),
                None => break,
            }
        }
    }

    fn dispatch(&mut self, inbound: Inbound) {
        let subject = match inbound.message.subject().and_then(|id| self.table.get(id)) {
            Some(peer) => *peer,
            None => return,
        };

        debug!("{} received {} from {}", self.me, inbound.message, inbound.from);
        self.last_progress = Instant::now();

        let outcome = match inbound.message {
            Message::Election(_) => self.ballot.on_election(&subject),
            Message::Result(_) => self.ballot.on_result(&subject),
            Message::Response => return,
        };

        self.publish_status();

        match outcome {
            Outcome::Forward(message) => self.reliable_send(message),
            Outcome::Restart => {
                warn!(
                    "{}: {} disagrees with the announced leader, restarting election",
                    self.me, inbound.message
                );
                self.schedule_restart();
            }
            Outcome::Ignore => {}
        }
    }

    /// Deliver `message` to the first live peer after us, skipping the ones that never acknowledge.
    fn reliable_send(&mut self, mut message: Message) {
        let mut dest_id = self.me.id();

        while self.is_running() {
            dest_id = self.table.successor(dest_id);

            if dest_id == self.me.id() {
                warn!("{}: no peer of the ring answers, electing itself", self.me);
                self.ballot.elect_self();
                self.publish_status();
                return;
            }

            let dest = match self.table.get(dest_id) {
                Some(peer) => *peer,
                None => return,
            };

            match self.send_and_await(&message, &dest) {
                Ok(true) => {
                    debug!("{} delivered {} to {}", self.me, message, dest);
                    self.last_progress = Instant::now();
                    return;
                }
                Ok(false) => warn!(
                    "{}: {} did not acknowledge {}, skipping it",
                    self.me, dest, message
                ),
                Err(err) => warn!(
                    "{}: could not send {} to {}: {}, skipping it",
                    self.me, message, dest, err
                ),
            }

            if message.subject() == Some(dest.id()) {
                warn!(
                    "{}: {} was the subject of {}, proposing itself instead",
                    self.me, dest, message
                );
                message = self.ballot.start();
                self.last_progress = Instant::now();
                let _ = self.events.send(NodeEvent::ElectionStarted);
                self.publish_status();
            }
        }
    }

    /// Send `message` to `dest` and wait for its `Response`. `Ok(false)` on timeout.
    fn send_and_await(&mut self, message: &Message, dest: &Peer) -> Result<bool, Error> {
        let dest_addr = dest.election_addr();
        self.socket.send_to(&message.encode(), dest_addr)?;

        let deadline = Instant::now() + self.config.ack_timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }

            match self.receive(deadline - now) {
                Ok(Some(Inbound {
                    message: Message::Response,
                    from,
                })) => {
                    if from == dest_addr {
                        return Ok(true);
                    }

                    debug!("{}: ignoring stray RESPONSE from {}", self.me, from);
                }
                Ok(Some(inbound)) => {
                    self.acknowledge(inbound.from);
                    self.deferred.push_back(inbound);
                }
                Ok(None) => {}
                // echo of an earlier datagram to a closed port
                Err(Error::Transport(err)) if err.kind() == ErrorKind::ConnectionRefused => {}
                Err(Error::Protocol(err)) => warn!("{}: discarding datagram: {}", self.me, err),
                Err(err) => return Err(err),
            }
        }
    }

    fn publish_status(&mut self) {
        let status = self.ballot.status();
        if status == self.published {
            return;
        }

        match self.status.write() {
            Ok(mut published) => *published = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }

        if status.phase != self.published.phase {
            debug!(
                "{}: phase {:?} -> {:?}",
                self.me, self.published.phase, status.phase
            );
            self.last_progress = Instant::now();
        }

        if let Some(leader) = status.leader.and_then(|id| self.table.get(id)).copied() {
            info!("{}: leader elected: {}", self.me, leader);
            self.restart_at = None;
            let _ = self.events.send(NodeEvent::LeaderElected(leader));
        }

        self.published = status;
    }
}
