//! Election state machine of a single node, free of any I/O.
//!
//! A [`Ballot`] receives the peers carried by `Election` and `Result` messages
//! and answers with an [`Outcome`]: the message to forward to the next live
//! peer of the ring, a request to restart the election, or nothing.
//!
//! ```text
//!               start()                    Election(self)
//!   ----------> Electing -----------------------------------> Confirming
//!                 ^  |   Result(L), first pass                  |   |
//!                 |  +------------------------------------------+   | Result(L) again
//!                 |                                                 v
//!                 +--------- Election(c) / mismatch ----------- Elected
//! ```
//!
//! A `Result(L)` only ever originates at `L`. Its first lap moves nodes to
//! `Confirming`; once back at `L` it is forwarded for a second lap that moves
//! them to `Elected`, and `L` finally drops it.

use crate::peer::{best, Peer, PeerId};
use crate::protocol::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Proposals are travelling around the ring.
    Electing,
    /// A leader was announced and the announcement is travelling around the ring.
    Confirming,
    /// The leader is final until a new election starts.
    Elected,
}

/// What other threads may observe of an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub phase: Phase,
    /// Only set while `phase` is `Elected`.
    pub leader: Option<PeerId>,
}

impl Default for Status {
    fn default() -> Self {
        Status {
            phase: Phase::Electing,
            leader: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reliably send this message to the next live peer.
    Forward(Message),
    /// The ring disagrees on the leader, start a fresh election.
    Restart,
    /// Nothing to send.
    Ignore,
}

pub struct Ballot {
    me: Peer,
    phase: Phase,
    adopted: Option<PeerId>,
}

impl Ballot {
    pub fn new(me: Peer) -> Self {
        Ballot {
            me,
            phase: Phase::Electing,
            adopted: None,
        }
    }

    pub fn me(&self) -> &Peer {
        &self.me
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The leader announced to this node, final or not.
    pub fn adopted(&self) -> Option<PeerId> {
        self.adopted
    }

    pub fn status(&self) -> Status {
        Status {
            phase: self.phase,
            leader: match self.phase {
                Phase::Elected => self.adopted,
                Phase::Electing | Phase::Confirming => None,
            },
        }
    }

    /// Forget the current leader and propose ourselves.
    pub fn start(&mut self) -> Message {
        self.abandon();
        Message::election(&self.me)
    }

    pub fn abandon(&mut self) {
        self.phase = Phase::Electing;
        self.adopted = None;
    }

    /// Nobody else answers: lead alone.
    pub fn elect_self(&mut self) {
        self.phase = Phase::Elected;
        self.adopted = Some(self.me.id());
    }

    pub fn on_election(&mut self, candidate: &Peer) -> Outcome {
        if *candidate == self.me {
            // our own proposal made it around the ring
            if self.phase == Phase::Confirming && self.adopted == Some(self.me.id()) {
                return Outcome::Ignore;
            }

            self.phase = Phase::Confirming;
            self.adopted = Some(self.me.id());
            return Outcome::Forward(Message::result(&self.me));
        }

        let winner = *best(candidate, &self.me);
        self.abandon();

        Outcome::Forward(Message::election(&winner))
    }

    pub fn on_result(&mut self, leader: &Peer) -> Outcome {
        let matches_adopted = self.adopted == Some(leader.id());

        match self.phase {
            Phase::Electing => {
                self.phase = Phase::Confirming;
                self.adopted = Some(leader.id());
                Outcome::Forward(Message::result(leader))
            }
            Phase::Confirming if matches_adopted => {
                self.phase = Phase::Elected;
                Outcome::Forward(Message::result(leader))
            }
            Phase::Elected if matches_adopted => {
                if *leader == self.me {
                    // second lap is over
                    Outcome::Ignore
                } else {
                    Outcome::Forward(Message::result(leader))
                }
            }
            Phase::Confirming | Phase::Elected => {
                self.abandon();
                Outcome::Restart
            }
        }
    }
}
