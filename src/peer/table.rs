use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use super::{Peer, PeerId, PeerTable, MAX_PEERS};

#[derive(Debug)]
pub enum PeerTableErrorKind {
    // No peer at all
    Empty,
    // More peers than a single id byte can address
    TooManyPeers,
    // Line holds an address but no port
    MissingField,
    BadAddress(String),
    BadPort(String),
    BadAptitude(String),
    // Anything after the aptitude
    TrailingField(String),
    Io(io::Error),
}

/// A bootstrap failure, with the 1-based line it happened on (0 when not tied to a line).
#[derive(Debug)]
pub struct PeerTableError {
    line: usize,
    kind: PeerTableErrorKind,
}

impl PeerTableError {
    pub(crate) fn new(line: usize, kind: PeerTableErrorKind) -> Self {
        PeerTableError { line, kind }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn kind(&self) -> &PeerTableErrorKind {
        &self.kind
    }
}

impl Display for PeerTableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: ", self.line)?;
        }

        match &self.kind {
            PeerTableErrorKind::Empty => write!(f, "peer table is empty"),
            PeerTableErrorKind::TooManyPeers => {
                write!(f, "peer table holds more than {} peers", MAX_PEERS)
            }
            PeerTableErrorKind::MissingField => write!(f, "expected `<address> <port> [aptitude]`"),
            PeerTableErrorKind::BadAddress(value) => write!(f, "invalid address '{}'", value),
            PeerTableErrorKind::BadPort(value) => write!(f, "invalid port '{}'", value),
            PeerTableErrorKind::BadAptitude(value) => {
                write!(f, "invalid aptitude '{}' (expected 0-255)", value)
            }
            PeerTableErrorKind::TrailingField(value) => {
                write!(f, "unexpected trailing field '{}'", value)
            }
            PeerTableErrorKind::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PeerTableError {}

impl From<io::Error> for PeerTableError {
    fn from(err: io::Error) -> Self {
        PeerTableError::new(0, PeerTableErrorKind::Io(err))
    }
}

impl PeerTable {
    /// Parse a bootstrap listing, one `<address> <port> [aptitude]` per line.
    ///
    /// Blank lines and `#` comments are skipped; ids follow the order of the
    /// remaining lines. A missing aptitude is derived from address and port.
    pub fn parse(input: &str) -> Result<Self, PeerTableError> {
        let mut peers = vec![];

        for (index, raw_line) in input.lines().enumerate() {
            let line_number = index + 1;
            let line = match raw_line.find('#') {
                Some(comment_start) => &raw_line[..comment_start],
                None => raw_line,
            };

            if line.trim().is_empty() {
                continue;
            }

            if peers.len() >= MAX_PEERS {
                return Err(PeerTableError::new(
                    line_number,
                    PeerTableErrorKind::TooManyPeers,
                ));
            }

            let peer = parse_line(peers.len() as PeerId, line)
                .map_err(|kind| PeerTableError::new(line_number, kind))?;

            peers.push(peer);
        }

        PeerTable::from_peers(peers)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PeerTableError> {
        let content = fs::read_to_string(path)?;
        PeerTable::parse(&content)
    }
}

fn parse_line(id: PeerId, line: &str) -> Result<Peer, PeerTableErrorKind> {
    let mut fields = line.split_whitespace();

    let address = match fields.next() {
        Some(address) => IpAddr::from_str(address)
            .map_err(|_| PeerTableErrorKind::BadAddress(address.to_string()))?,
        None => return Err(PeerTableErrorKind::MissingField),
    };

    let port = match fields.next() {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| PeerTableErrorKind::BadPort(port.to_string()))?,
        None => return Err(PeerTableErrorKind::MissingField),
    };

    let peer = match fields.next() {
        Some(aptitude) => {
            let aptitude = aptitude
                .parse::<u8>()
                .map_err(|_| PeerTableErrorKind::BadAptitude(aptitude.to_string()))?;
            Peer::new(id, address, port, aptitude)
        }
        None => Peer::with_derived_aptitude(id, address, port),
    };

    if let Some(extra) = fields.next() {
        return Err(PeerTableErrorKind::TrailingField(extra.to_string()));
    }

    Ok(peer)
}
