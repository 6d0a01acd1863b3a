use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{info, warn, LevelFilter};

use ring_elector::peer::util::{get_ip_addresses, get_reachable_ip_addresses};
use ring_elector::{Config, Node, NodeEvent, PeerId, PeerTable, DEFAULT_CONFIG};

#[derive(Parser, Debug)]
#[command(name = "ring-elector")]
#[command(about = "Ring leader election with leader failure detection")]
struct Args {
    /// Bootstrap file listing every peer of the ring, one `address port [aptitude]` per line
    peers: PathBuf,

    /// Index of this node in the peer file (resolved from local interfaces if not provided)
    #[arg(long)]
    id: Option<PeerId>,

    /// How long to wait for a peer to acknowledge a message
    #[arg(long, default_value_t = DEFAULT_CONFIG.ack_timeout.as_millis() as u64)]
    ack_timeout_ms: u64,

    /// How long to wait for the leader to answer a probe
    #[arg(long, default_value_t = DEFAULT_CONFIG.probe_timeout.as_millis() as u64)]
    probe_timeout_ms: u64,

    /// Interval between two probes of the leader
    #[arg(long, default_value_t = DEFAULT_CONFIG.average_election_time.as_millis() as u64)]
    average_election_ms: u64,

    /// Restart an election that saw no traffic for this long (raised to three laps of skipped peers)
    #[arg(long, default_value_t = DEFAULT_CONFIG.election_stall_timeout.as_millis() as u64)]
    election_stall_timeout_ms: u64,

    /// Upper bound of the random delay before restarting a stalled or conflicting election
    #[arg(long, default_value_t = DEFAULT_CONFIG.restart_backoff.as_millis() as u64)]
    restart_backoff_ms: u64,

    /// First port of the liveness band, peer `i` listening on `base + i`
    #[arg(long, default_value_t = DEFAULT_CONFIG.liveness_port_base)]
    liveness_port_base: u16,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info).parse_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();

    let table = PeerTable::from_file(&args.peers)?;

    let id = match args.id {
        Some(id) => id,
        None => {
            let local_addresses = get_reachable_ip_addresses(get_ip_addresses());
            table.resolve_local(&local_addresses).ok_or_else(|| {
                ring_elector::Error::InvalidConfig(format!(
                    "no single peer of {} matches a local address, use --id",
                    args.peers.display()
                ))
            })?
        }
    };

    let config = Config {
        ack_timeout: Duration::from_millis(args.ack_timeout_ms),
        probe_timeout: Duration::from_millis(args.probe_timeout_ms),
        average_election_time: Duration::from_millis(args.average_election_ms),
        election_stall_timeout: Duration::from_millis(args.election_stall_timeout_ms),
        restart_backoff: Duration::from_millis(args.restart_backoff_ms),
        liveness_port_base: args.liveness_port_base,
        ..Default::default()
    };

    let mut node = Node::new(table, id, config)?;
    let events = node.subscribe();

    node.start()?;
    info!("running as {} in a ring of {}", node.me(), node.table().len());

    for event in events {
        match event {
            NodeEvent::Started => info!("node started"),
            NodeEvent::ElectionStarted => info!("election started"),
            NodeEvent::LeaderElected(leader) if leader == *node.me() => {
                info!("this node is the leader")
            }
            NodeEvent::LeaderElected(leader) => info!("leader is {}", leader),
            NodeEvent::Stopped => {
                warn!("node stopped");
                break;
            }
        }
    }

    Ok(())
}
