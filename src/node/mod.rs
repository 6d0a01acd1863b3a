
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use log::{error, info};

use crate::bus::EventBus;
use crate::config::Config;
use crate::election::{Coordinator, ElectionHandle, Phase, Status, Trigger};
use crate::error::Error;
use crate::liveness::LivenessMonitor;
use crate::peer::{Peer, PeerId, PeerTable};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NodeEvent {
    Started,
    ElectionStarted,
    LeaderElected(Peer),
    Stopped,
}

/// One member of the ring: an election coordinator and a liveness monitor,
/// each on its own thread and socket.
pub struct Node {
    table: PeerTable,
    me: Peer,
    config: Config,
    status: Arc<RwLock<Status>>,
    handle: ElectionHandle,
    triggers: Receiver<Trigger>,
    running: Arc<AtomicBool>,
    bus: EventBus<NodeEvent>,
    threads: Vec<JoinHandle<()>>,
}

impl Node {
    pub fn new(table: PeerTable, id: PeerId, config: Config) -> Result<Self, Error> {
        let me = *table.get(id).ok_or(Error::UnknownPeer(id))?;
        config.validate(&table)?;

        let status = Arc::new(RwLock::new(Status::default()));
        let (trigger_sender, triggers) = unbounded();
        let handle = ElectionHandle::new(table.clone(), status.clone(), trigger_sender);

        Ok(Node {
            table,
            me,
            config,
            status,
            handle,
            triggers,
            running: Arc::new(AtomicBool::new(false)),
            bus: EventBus::new(),
            threads: vec![],
        })
    }

    pub fn me(&self) -> &Peer {
        &self.me
    }

    pub fn table(&self) -> &PeerTable {
        &self.table
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.threads.is_empty()
    }

    /// Bind both sockets, spawn the election and liveness threads and start the first election.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.is_running() {
            return Ok(());
        }

        let liveness_addr = self
            .me
            .liveness_addr(self.config.liveness_port_base)
            .ok_or_else(|| Error::InvalidConfig(format!("no liveness port for {}", self.me)))?;

        let election_socket = UdpSocket::bind(self.me.election_addr())?;
        let liveness_socket = UdpSocket::bind(liveness_addr)?;

        self.reset_status();
        while self.triggers.try_recv().is_ok() {}
        self.running.store(true, Ordering::SeqCst);

        let coordinator = Coordinator::new(
            self.table.clone(),
            self.me,
            self.config.clone(),
            election_socket,
            self.status.clone(),
            self.triggers.clone(),
            self.running.clone(),
            self.bus.sender(),
        );

        let monitor = LivenessMonitor::new(
            self.me,
            self.config.clone(),
            liveness_socket,
            self.handle.clone(),
            self.running.clone(),
        );

        let election_thread = thread::Builder::new()
            .name(format!("election-{}", self.me.id()))
            .spawn(move || coordinator.run())
            .map_err(|err| {
                self.running.store(false, Ordering::SeqCst);
                Error::Transport(err)
            })?;

        let liveness_thread = match thread::Builder::new()
            .name(format!("liveness-{}", self.me.id()))
            .spawn(move || monitor.run())
        {
            Ok(liveness_thread) => liveness_thread,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = election_thread.join();
                return Err(Error::Transport(err));
            }
        };

        self.threads = vec![election_thread, liveness_thread];

        info!(
            "node {} started (election {}, liveness {})",
            self.me,
            self.me.election_addr(),
            liveness_addr
        );
        self.bus.publish(NodeEvent::Started);

        self.handle.start_new_election();

        Ok(())
    }

    /// Signal both threads to exit and wait for them.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.running.store(false, Ordering::SeqCst);

        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                error!("a thread of node {} panicked", self.me);
            }
        }

        self.reset_status();

        info!("node {} stopped", self.me);
        self.bus.publish(NodeEvent::Stopped);
    }

    /// The leader this node agreed on, or [`Error::NotReady`] while an election is running.
    pub fn elected(&self) -> Result<Peer, Error> {
        self.handle.elected()
    }

    pub fn phase(&self) -> Phase {
        self.handle.phase()
    }

    pub fn start_new_election(&self) {
        self.handle.start_new_election()
    }

    pub fn handle(&self) -> ElectionHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> Receiver<NodeEvent> {
        self.bus.subscribe()
    }

    fn reset_status(&self) {
        match self.status.write() {
            Ok(mut status) => *status = Status::default(),
            Err(poisoned) => *poisoned.into_inner() = Status::default(),
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}
