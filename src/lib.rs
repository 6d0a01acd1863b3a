//! Leader election over a ring of peers, with failure detection.
//!
//! Every peer runs a [`Node`]: an election coordinator passing `Election` and
//! `Result` messages around the ring over UDP, and a liveness monitor probing
//! the elected leader and starting a new election when it stops answering.

#[cfg(test)]
#[macro_use]
extern crate serial_test;

pub mod bus;
pub mod config;
pub mod election;
pub mod error;
pub mod liveness;
pub mod node;
pub mod peer;
pub mod protocol;

pub use config::{Config, DEFAULT_CONFIG};
pub use election::{ElectionHandle, Phase, Status};
pub use error::Error;
pub use node::{Node, NodeEvent};
pub use peer::{Peer, PeerId, PeerTable};
