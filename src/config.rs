use std::cmp;
use std::time::Duration;

use crate::error::Error;
use crate::peer::PeerTable;

/// Timing and port parameters shared by every peer of a ring.
///
/// All peers should run with the same values, in particular the same
/// `liveness_port_base`, since it decides where probes are sent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// How long a reliable send waits for a `Response` before skipping the peer.
    pub ack_timeout: Duration,

    /// How long a liveness probe waits for the leader to answer.
    pub probe_timeout: Duration,

    /// Rough duration of an election, used as the liveness monitor cadence.
    pub average_election_time: Duration,

    /// Receive timeout of the election loop; bounds stop and trigger latency.
    pub poll_interval: Duration,

    /// A node stuck outside `Elected` with no message traffic this long restarts
    /// the election. Never applied below three skip-all laps, see
    /// [`Config::stall_timeout`].
    pub election_stall_timeout: Duration,

    /// Upper bound of the random delay before an election restart.
    pub restart_backoff: Duration,

    /// The liveness port of peer `i` is `liveness_port_base + i`.
    pub liveness_port_base: u16,
}

pub const DEFAULT_CONFIG: Config = Config {
    ack_timeout: Duration::from_millis(1000),
    probe_timeout: Duration::from_millis(1000),
    average_election_time: Duration::from_millis(1000),
    poll_interval: Duration::from_millis(100),
    election_stall_timeout: Duration::from_secs(10),
    restart_backoff: Duration::from_millis(250),
    liveness_port_base: 2000,
};

impl Default for Config {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

impl Config {
    /// Stall timeout applied on a ring of `ring_len` peers.
    ///
    /// A lap where every other peer has to be skipped takes up to
    /// `ring_len * ack_timeout`, and a full election needs several laps, so the
    /// configured value is raised to at least three such laps.
    pub fn stall_timeout(&self, ring_len: usize) -> Duration {
        let laps = self.ack_timeout.saturating_mul(3 * ring_len as u32);
        cmp::max(self.election_stall_timeout, laps)
    }

    /// Check the configuration against the ring it will run on.
    pub fn validate(&self, table: &PeerTable) -> Result<(), Error> {
        let non_zero = [
            ("ack_timeout", self.ack_timeout),
            ("probe_timeout", self.probe_timeout),
            ("average_election_time", self.average_election_time),
            ("poll_interval", self.poll_interval),
        ];

        for (name, value) in non_zero.iter() {
            if *value == Duration::from_millis(0) {
                return Err(Error::InvalidConfig(format!("{} must not be zero", name)));
            }
        }

        for peer in table.iter() {
            let liveness_port = match peer.liveness_port(self.liveness_port_base) {
                Some(port) => port,
                None => {
                    return Err(Error::InvalidConfig(format!(
                        "liveness port of peer #{} overflows (base {})",
                        peer.id(),
                        self.liveness_port_base
                    )))
                }
            };

            if let Some(other) = table
                .iter()
                .find(|other| other.address() == peer.address() && other.port() == liveness_port)
            {
                return Err(Error::InvalidConfig(format!(
                    "liveness port {} of peer #{} collides with the election port of peer #{}",
                    liveness_port,
                    peer.id(),
                    other.id()
                )));
            }
        }

        Ok(())
    }
}
