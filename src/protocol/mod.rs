//! Wire format of the election and liveness channels.
//!
//! Election channel, one message per datagram:
//!
//! ```text
//! ELECTION  | 0 | candidate id | candidate aptitude |
//! RESPONSE  | 1 |
//! RESULT    | 2 | leader id    | leader aptitude    |
//! ```
//!
//! Liveness channel, single byte: `0` for a probe, `1` for its acknowledgment.

#[cfg(test)]
mod tests;

pub mod error;

pub use error::{ProtocolError, ProtocolErrorKind};

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::peer::{Peer, PeerId, PeerTable};

pub const ELECTION: u8 = 0;
pub const RESPONSE: u8 = 1;
pub const RESULT: u8 = 2;

pub const PROBE: u8 = 0;
pub const PROBE_ACK: u8 = 1;

pub const MAX_MESSAGE_LENGTH: usize = 3;

/// The peer an `Election` or `Result` message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: PeerId,
    pub aptitude: u8,
}

impl From<&Peer> for Candidate {
    fn from(peer: &Peer) -> Self {
        Candidate {
            id: peer.id(),
            aptitude: peer.aptitude(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Proposes the candidate as the best leader seen so far.
    Election(Candidate),
    /// Announces the converged leader.
    Result(Candidate),
    /// Acknowledges a received `Election` or `Result`.
    Response,
}

impl Message {
    pub fn election(peer: &Peer) -> Self {
        Message::Election(Candidate::from(peer))
    }

    pub fn result(peer: &Peer) -> Self {
        Message::Result(Candidate::from(peer))
    }

    pub fn tag(&self) -> u8 {
        match self {
            Message::Election(_) => ELECTION,
            Message::Response => RESPONSE,
            Message::Result(_) => RESULT,
        }
    }

    /// The peer this message proposes or announces.
    pub fn subject(&self) -> Option<PeerId> {
        match self {
            Message::Election(candidate) | Message::Result(candidate) => Some(candidate.id),
            Message::Response => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        encode(self)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Election(candidate) => write!(f, "ELECTION(#{})", candidate.id),
            Message::Result(candidate) => write!(f, "RESULT(#{})", candidate.id),
            Message::Response => write!(f, "RESPONSE"),
        }
    }
}

pub fn encode(message: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(MAX_MESSAGE_LENGTH);
    buf.put_u8(message.tag());

    if let Message::Election(candidate) | Message::Result(candidate) = message {
        buf.put_u8(candidate.id);
        buf.put_u8(candidate.aptitude);
    }

    buf.freeze()
}

/// Decode one election datagram, checking the identifier against `table`.
pub fn decode(bytes: &[u8], table: &PeerTable) -> Result<Message, ProtocolError> {
    let (tag, payload) = match bytes.split_first() {
        Some((tag, payload)) => (*tag, payload),
        None => return Err(ProtocolError::empty()),
    };

    if bytes.len() > MAX_MESSAGE_LENGTH {
        return Err(ProtocolError::too_long(bytes.len()));
    }

    match tag {
        RESPONSE if payload.is_empty() => Ok(Message::Response),
        RESPONSE => Err(ProtocolError::bad_length(tag, bytes.len())),
        ELECTION | RESULT => {
            let (id, aptitude) = match payload {
                [id, aptitude] => (*id, *aptitude),
                _ => return Err(ProtocolError::bad_length(tag, bytes.len())),
            };

            let peer = table.get(id).ok_or_else(|| ProtocolError::unknown_peer(id))?;

            if peer.aptitude() != aptitude {
                return Err(ProtocolError::aptitude_mismatch(
                    id,
                    peer.aptitude(),
                    aptitude,
                ));
            }

            let candidate = Candidate { id, aptitude };

            if tag == ELECTION {
                Ok(Message::Election(candidate))
            } else {
                Ok(Message::Result(candidate))
            }
        }
        _ => Err(ProtocolError::unknown_tag(tag)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// "Are you still the leader?"
    Ping,
    /// "Yes."
    Ack,
}

impl Probe {
    pub fn encode(&self) -> [u8; 1] {
        match self {
            Probe::Ping => [PROBE],
            Probe::Ack => [PROBE_ACK],
        }
    }
}

pub fn decode_probe(bytes: &[u8]) -> Result<Probe, ProtocolError> {
    match bytes {
        [] => Err(ProtocolError::empty()),
        [PROBE] => Ok(Probe::Ping),
        [PROBE_ACK] => Ok(Probe::Ack),
        [tag] => Err(ProtocolError::unknown_tag(*tag)),
        _ => Err(ProtocolError::too_long(bytes.len())),
    }
}
