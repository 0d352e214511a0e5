//! Dissemination of registry snapshots: the wire codec, the UDP broadcast
//! socket, inbound message handling and the loops that drive convergence.

pub mod convergence;
pub mod inbound;
pub mod targets;
pub mod transport;
pub mod wire;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::registry::{Registry, Snapshot};

/// Sending half of the transport.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Broadcasts one datagram to every configured target.
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Receiving half of the transport.
#[async_trait]
pub trait Inbox: Send + Sync {
    /// Waits for the next datagram addressed to this host.
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;
}

/// Drops everything; used when networking is disabled.
pub struct Offline;

#[async_trait]
impl Outbound for Offline {
    async fn send(&self, _payload: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Broadcasts `snapshot`, split into as many datagrams as `limit` requires.
/// Returns the number of datagrams sent.
pub async fn announce(
    outbound: &dyn Outbound,
    snapshot: &Snapshot,
    limit: usize,
) -> Result<usize, TransportError> {
    if snapshot.is_empty() {
        return Ok(0);
    }
    let datagrams = wire::encode_snapshot(snapshot, limit)?;
    for datagram in &datagrams {
        outbound.send(datagram).await?;
    }
    debug!(
        endpoints = snapshot.len(),
        datagrams = datagrams.len(),
        "snapshot broadcast"
    );
    Ok(datagrams.len())
}

/// Re-broadcasts the local snapshot on a fixed period so a lost datagram is
/// repaired on the next tick.
pub struct Announcer {
    registry: Arc<Registry>,
    outbound: Arc<dyn Outbound>,
    interval: Duration,
    max_datagram: usize,
}

impl Announcer {
    pub fn new(
        registry: Arc<Registry>,
        outbound: Arc<dyn Outbound>,
        interval: Duration,
        max_datagram: usize,
    ) -> Self {
        Self {
            registry,
            outbound,
            interval,
            max_datagram,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = self.registry.snapshot();
            if let Err(e) = announce(self.outbound.as_ref(), &snapshot, self.max_datagram).await {
                warn!(error = %e, "periodic announce failed");
            }
        }
    }
}
