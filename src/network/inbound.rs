//! Inbound datagram handling. Every datagram is decoded on its own; a
//! malformed one is logged and dropped without touching the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::wire::Message;
use super::{Inbox, Outbound, announce};
use crate::registry::Registry;
use crate::sync::{Reconciler, Request};

/// Largest UDP payload; reads never truncate whatever `max_datagram` a peer uses.
const RECV_BUFFER: usize = 65_535;

/// Pause after a failed receive before trying again.
const RECV_BACKOFF: Duration = Duration::from_millis(100);

pub struct Inbound {
    reconciler: Arc<Reconciler>,
    registry: Arc<Registry>,
    outbound: Arc<dyn Outbound>,
    requests: mpsc::Sender<Request>,
    max_datagram: usize,
}

impl Inbound {
    pub fn new(
        reconciler: Arc<Reconciler>,
        registry: Arc<Registry>,
        outbound: Arc<dyn Outbound>,
        requests: mpsc::Sender<Request>,
        max_datagram: usize,
    ) -> Self {
        Self {
            reconciler,
            registry,
            outbound,
            requests,
            max_datagram,
        }
    }

    pub async fn handle(&self, payload: &[u8]) {
        let message = match Message::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, len = payload.len(), "dropping malformed datagram");
                return;
            }
        };

        match message {
            Message::Ping => {
                // nothing to share yet; a peer with state will answer
                if self.registry.is_empty() {
                    return;
                }
                let snapshot = self.registry.snapshot();
                if let Err(e) = announce(self.outbound.as_ref(), &snapshot, self.max_datagram).await {
                    warn!(error = %e, "failed to answer ping");
                }
            }
            Message::Snapshot(snapshot) => {
                debug!(endpoints = snapshot.len(), "snapshot received");
                let requests = self.reconciler.reconcile(snapshot);
                self.forward(requests).await;
            }
            Message::Intent(intent) => {
                debug!(host = %intent.host, address = %intent.address, "claim intent received");
                let requests = self.reconciler.reconcile_intent(&intent);
                self.forward(requests).await;
            }
        }
    }

    async fn forward(&self, requests: Vec<Request>) {
        for request in requests {
            if self.requests.send(request).await.is_err() {
                warn!("request queue closed, dropping transitions");
                return;
            }
        }
    }
}

/// Receive loop over the bound socket.
pub struct Listener {
    inbox: Arc<dyn Inbox>,
    inbound: Inbound,
}

impl Listener {
    pub fn new(inbox: Arc<dyn Inbox>, inbound: Inbound) -> Self {
        Self { inbox, inbound }
    }

    pub async fn run(self) {
        let mut buf = vec![0u8; RECV_BUFFER];
        loop {
            match self.inbox.recv(&mut buf).await {
                Ok((len, _source)) => self.inbound.handle(&buf[..len]).await,
                Err(e) => {
                    warn!(error = %e, "receive failed");
                    tokio::time::sleep(RECV_BACKOFF).await;
                }
            }
        }
    }
}
