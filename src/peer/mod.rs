
mod table;
pub mod util;

pub use table::{PeerTableError, PeerTableErrorKind};

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Index of a peer in the [`PeerTable`]. Travels as a single byte on the wire.
pub type PeerId = u8;

/// Ids are single bytes, so a ring holds at most this many peers.
pub const MAX_PEERS: usize = PeerId::MAX as usize + 1;

/// A member of the ring: where it listens and how eager it is to lead.
///
/// Two peers are equal when their id, address and port match. The aptitude is
/// only an election criterion and takes no part in identity.
#[derive(Debug, Clone, Copy)]
pub struct Peer {
    id: PeerId,
    address: IpAddr,
    port: u16,
    aptitude: u8,
}

impl Peer {
    pub fn new(id: PeerId, address: IpAddr, port: u16, aptitude: u8) -> Self {
        Peer {
            id,
            address,
            port,
            aptitude,
        }
    }

    /// Build a peer whose aptitude is computed from its own address and port.
    pub fn with_derived_aptitude(id: PeerId, address: IpAddr, port: u16) -> Self {
        Peer::new(id, address, port, derive_aptitude(address, port))
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn aptitude(&self) -> u8 {
        self.aptitude
    }

    /// Where the election coordinator of this peer listens.
    pub fn election_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Liveness port of this peer inside the band starting at `base`.
    pub fn liveness_port(&self, base: u16) -> Option<u16> {
        base.checked_add(u16::from(self.id))
    }

    pub fn liveness_addr(&self, base: u16) -> Option<SocketAddr> {
        self.liveness_port(base)
            .map(|port| SocketAddr::new(self.address, port))
    }

    /// Compare two peers as election candidates, `Greater` meaning `self` is the better leader.
    ///
    /// Higher aptitude wins. On equal aptitude the smaller address wins, then the
    /// smaller port and finally the smaller id, so two distinct peers never tie.
    pub fn rank(&self, other: &Peer) -> Ordering {
        self.aptitude
            .cmp(&other.aptitude)
            .then_with(|| other.address.cmp(&self.address))
            .then_with(|| other.port.cmp(&self.port))
            .then_with(|| other.id.cmp(&self.id))
    }

    pub fn outranks(&self, other: &Peer) -> bool {
        self.rank(other) == Ordering::Greater
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.address == other.address && self.port == other.port
    }
}

impl Eq for Peer {}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} (aptitude {})",
            self.id,
            self.election_addr(),
            self.aptitude
        )
    }
}

/// The better election candidate of `a` and `b`.
pub fn best<'a>(a: &'a Peer, b: &'a Peer) -> &'a Peer {
    if b.outranks(a) {
        b
    } else {
        a
    }
}

/// Last address byte plus port, modulo 256.
pub fn derive_aptitude(address: IpAddr, port: u16) -> u8 {
    let last_octet = match address {
        IpAddr::V4(address) => address.octets()[3],
        IpAddr::V6(address) => address.octets()[15],
    };

    last_octet.wrapping_add((port & 0xff) as u8)
}

/// Every peer of the ring, in ring order. The successor of index `i` is `(i + 1) mod N`.
///
/// Cheap to clone: all clones share the same immutable list.
#[derive(Debug, Clone)]
pub struct PeerTable {
    peers: Arc<[Peer]>,
}

impl PeerTable {
    /// Build a table from `(election address, aptitude)` entries, ids following the entry order.
    pub fn new<I>(entries: I) -> Result<Self, PeerTableError>
    where
        I: IntoIterator<Item = (SocketAddr, u8)>,
    {
        let mut peers = vec![];

        for (index, (socket_addr, aptitude)) in entries.into_iter().enumerate() {
            if index >= MAX_PEERS {
                return Err(PeerTableError::new(0, PeerTableErrorKind::TooManyPeers));
            }

            peers.push(Peer::new(
                index as PeerId,
                socket_addr.ip(),
                socket_addr.port(),
                aptitude,
            ));
        }

        PeerTable::from_peers(peers)
    }

    pub(crate) fn from_peers(peers: Vec<Peer>) -> Result<Self, PeerTableError> {
        if peers.is_empty() {
            return Err(PeerTableError::new(0, PeerTableErrorKind::Empty));
        }

        if peers.len() > MAX_PEERS {
            return Err(PeerTableError::new(0, PeerTableErrorKind::TooManyPeers));
        }

        Ok(PeerTable {
            peers: peers.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// A table always holds at least one peer.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(usize::from(id))
    }

    pub fn contains(&self, id: PeerId) -> bool {
        usize::from(id) < self.peers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> + '_ {
        self.peers.iter()
    }

    /// Next index around the ring.
    pub fn successor(&self, id: PeerId) -> PeerId {
        ((usize::from(id) + 1) % self.peers.len()) as PeerId
    }

    /// The peer every node should agree on when all of them are alive.
    pub fn best(&self) -> &Peer {
        let mut best_peer = &self.peers[0];

        for peer in self.peers.iter() {
            best_peer = best(best_peer, peer);
        }

        best_peer
    }

    /// Find the single peer whose address is one of `local_addresses`.
    ///
    /// Returns `None` when no peer, or more than one, matches.
    pub fn resolve_local(&self, local_addresses: &[IpAddr]) -> Option<PeerId> {
        let mut matching = self
            .peers
            .iter()
            .filter(|peer| local_addresses.contains(&peer.address));

        match (matching.next(), matching.next()) {
            (Some(peer), None) => Some(peer.id),
            _ => None,
        }
    }
}
