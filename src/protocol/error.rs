use std::fmt::{Display, Formatter};

use crate::peer::PeerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    // Zero-length datagram
    Empty,
    // Datagram longer than any message
    TooLong(usize),
    // First byte is not a known message kind
    UnknownTag(u8),
    // Known kind but wrong length for it
    BadLength { tag: u8, len: usize },
    // Identifier outside of the peer table
    UnknownPeer(PeerId),
    // Aptitude byte disagrees with the peer table
    AptitudeMismatch { id: PeerId, expected: u8, found: u8 },
}

/// A datagram that does not decode to a valid message for this ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
}

impl ProtocolError {
    pub(crate) fn empty() -> Self {
        Self {
            kind: ProtocolErrorKind::Empty,
        }
    }

    pub(crate) fn too_long(len: usize) -> Self {
        Self {
            kind: ProtocolErrorKind::TooLong(len),
        }
    }

    pub(crate) fn unknown_tag(tag: u8) -> Self {
        Self {
            kind: ProtocolErrorKind::UnknownTag(tag),
        }
    }

    pub(crate) fn bad_length(tag: u8, len: usize) -> Self {
        Self {
            kind: ProtocolErrorKind::BadLength { tag, len },
        }
    }

    pub(crate) fn unknown_peer(id: PeerId) -> Self {
        Self {
            kind: ProtocolErrorKind::UnknownPeer(id),
        }
    }

    pub(crate) fn aptitude_mismatch(id: PeerId, expected: u8, found: u8) -> Self {
        Self {
            kind: ProtocolErrorKind::AptitudeMismatch {
                id,
                expected,
                found,
            },
        }
    }

    pub fn kind(&self) -> &ProtocolErrorKind {
        &self.kind
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ProtocolErrorKind::Empty => write!(f, "empty datagram"),
            ProtocolErrorKind::TooLong(len) => write!(f, "datagram of {} bytes is too long", len),
            ProtocolErrorKind::UnknownTag(tag) => write!(f, "unknown message tag {}", tag),
            ProtocolErrorKind::BadLength { tag, len } => {
                write!(f, "message tag {} cannot be {} bytes long", tag, len)
            }
            ProtocolErrorKind::UnknownPeer(id) => write!(f, "peer #{} is not in the table", id),
            ProtocolErrorKind::AptitudeMismatch {
                id,
                expected,
                found,
            } => write!(
                f,
                "peer #{} has aptitude {} but message carries {}",
                id, expected, found
            ),
        }
    }
}

impl std::error::Error for ProtocolError {}
