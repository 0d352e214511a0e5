use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::network::targets;
use crate::network::wire::DEFAULT_MAX_DATAGRAM;
use crate::registry::HostId;
use crate::sync::RetryPolicy;

/// Shares Bluetooth audio devices between the hosts of a LAN, one owner at a time.
#[derive(Parser, Debug, Clone)]
#[command(name = "bluebao", version)]
#[command(about = "Share Bluetooth audio devices between hosts on a LAN")]
pub struct Config {
    /// Identity announced to peers (defaults to the system hostname)
    #[arg(long, env = "BLUEBAO_HOST_ID")]
    pub host_id: Option<String>,

    /// UDP port the socket binds to
    #[arg(long, env = "BLUEBAO_LISTEN_PORT", default_value_t = 8829)]
    pub listen_port: u16,

    /// UDP port datagrams are sent to
    #[arg(long, env = "BLUEBAO_PEER_PORT", default_value_t = 8829)]
    pub peer_port: u16,

    /// Broadcast or multicast address to send to; repeatable. Defaults to
    /// every IPv4 interface broadcast address.
    #[arg(long = "target", env = "BLUEBAO_TARGETS", value_delimiter = ',')]
    pub targets: Vec<IpAddr>,

    /// Run standalone without any networking
    #[arg(long, env = "BLUEBAO_NO_NETWORK")]
    pub no_network: bool,

    /// Exclusion group assigned to locally discovered endpoints
    #[arg(long, env = "BLUEBAO_EXCLUSION_GROUP", default_value = "audio")]
    pub exclusion_group: String,

    /// Connect/disconnect attempts per address
    #[arg(long, env = "BLUEBAO_RETRY_ATTEMPTS", default_value_t = 5)]
    pub retry_attempts: u32,

    /// Delay between attempts, in milliseconds
    #[arg(long, env = "BLUEBAO_RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,

    #[arg(long, env = "BLUEBAO_PING_INTERVAL_MS", default_value_t = 1000)]
    pub ping_interval_ms: u64,

    /// Give up waiting for peers after this many seconds
    #[arg(long, env = "BLUEBAO_CONVERGE_TIMEOUT_SECS", default_value_t = 30)]
    pub converge_timeout_secs: u64,

    /// Re-broadcast the local snapshot every N seconds (0 disables)
    #[arg(long, env = "BLUEBAO_ANNOUNCE_INTERVAL_SECS", default_value_t = 0)]
    pub announce_interval_secs: u64,

    /// JSON snapshot file loaded as local seed state
    #[arg(long, env = "BLUEBAO_SEED")]
    pub seed: Option<PathBuf>,

    /// Skip scanning paired devices at startup
    #[arg(long, env = "BLUEBAO_NO_DISCOVERY")]
    pub no_discovery: bool,

    /// Default sink selected after a connect (substring match)
    #[arg(long, env = "BLUEBAO_SINK_MATCH", default_value = "bluez")]
    pub sink_match: String,

    /// Default sink selected after a disconnect (substring match)
    #[arg(long, env = "BLUEBAO_FALLBACK_SINK")]
    pub fallback_sink: Option<String>,

    /// Also broadcast per-address claim intents before connecting
    #[arg(long, env = "BLUEBAO_CLAIM_INTENTS")]
    pub claim_intents: bool,

    /// Size ceiling for one snapshot datagram, in bytes
    #[arg(long, env = "BLUEBAO_MAX_DATAGRAM", default_value_t = DEFAULT_MAX_DATAGRAM)]
    pub max_datagram: usize,

    /// Capacity of the ownership request queue
    #[arg(long, env = "BLUEBAO_QUEUE_DEPTH", default_value_t = 64)]
    pub queue_depth: usize,
}

impl Config {
    pub fn host_id(&self) -> HostId {
        match &self.host_id {
            Some(id) if !id.trim().is_empty() => HostId::new(id.trim()),
            _ => HostId::from_system(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms.max(1))
    }

    pub fn converge_timeout(&self) -> Duration {
        Duration::from_secs(self.converge_timeout_secs)
    }

    pub fn announce_interval(&self) -> Option<Duration> {
        (self.announce_interval_secs > 0).then(|| Duration::from_secs(self.announce_interval_secs))
    }

    pub fn targets(&self) -> Vec<SocketAddr> {
        targets::resolve(&self.targets, self.peer_port)
    }
}
