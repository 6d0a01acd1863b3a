use std::fmt::{Display, Formatter};
use std::io;

use crate::peer::{PeerId, PeerTableError};
use crate::protocol::ProtocolError;

#[derive(Debug)]
pub enum Error {
    // Socket creation, send or receive failure
    Transport(io::Error),
    // Malformed or out-of-range datagram
    Protocol(ProtocolError),
    // No leader yet, an election is still running
    NotReady,
    // Identifier outside of the peer table
    UnknownPeer(PeerId),
    PeerTable(PeerTableError),
    InvalidConfig(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {}", err),
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::NotReady => write!(f, "election not yet complete"),
            Self::UnknownPeer(id) => write!(f, "peer #{} is not in the table", id),
            Self::PeerTable(err) => write!(f, "peer table: {}", err),
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Protocol(err) => Some(err),
            Self::PeerTable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<PeerTableError> for Error {
    fn from(err: PeerTableError) -> Self {
        Self::PeerTable(err)
    }
}
