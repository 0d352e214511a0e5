//! Per-endpoint ownership state machine.
//!
//! Transitions are applied one at a time (see [`super::Dispatcher`]) and each
//! re-reads the endpoint before acting, so a request that went stale while
//! queued degrades to a no-op. The registry lock is never held across
//! actuation or broadcast.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::actuation::{Actuator, Operation};
use super::Request;
use crate::error::{Error, Result};
use crate::network::wire::{ClaimIntent, DEFAULT_MAX_DATAGRAM, Message};
use crate::network::{Outbound, announce};
use crate::registry::{Endpoint, HostId, Registry};
use crate::ui::Presenter;

/// Pause between claim intents and the connect, so the previous owner has
/// time to drop the link.
const INTENT_PROPAGATION: Duration = Duration::from_millis(200);

pub struct Coordinator {
    local: HostId,
    registry: Arc<Registry>,
    actuator: Actuator,
    presenter: Arc<dyn Presenter>,
    outbound: Arc<dyn Outbound>,
    max_datagram: usize,
    claim_intents: bool,
}

impl Coordinator {
    pub fn new(
        local: HostId,
        registry: Arc<Registry>,
        actuator: Actuator,
        presenter: Arc<dyn Presenter>,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        Self {
            local,
            registry,
            actuator,
            presenter,
            outbound,
            max_datagram: DEFAULT_MAX_DATAGRAM,
            claim_intents: false,
        }
    }

    pub fn with_max_datagram(mut self, max_datagram: usize) -> Self {
        self.max_datagram = max_datagram;
        self
    }

    /// Also announce address-level claim intents before connecting.
    pub fn with_claim_intents(mut self, enabled: bool) -> Self {
        self.claim_intents = enabled;
        self
    }

    pub fn local(&self) -> &HostId {
        &self.local
    }

    /// A click on a checked entry releases it; anything else claims it.
    pub fn toggle_request(&self, name: &str) -> Result<Request> {
        let endpoint = self.endpoint(name)?;
        Ok(if endpoint.is_owned_by(&self.local) {
            Request::Release {
                name: name.to_string(),
                successor: None,
            }
        } else {
            Request::Claim {
                name: name.to_string(),
            }
        })
    }

    pub async fn apply(&self, request: Request) -> Result<()> {
        match request {
            Request::Claim { name } => self.claim(&name).await,
            Request::Release {
                name,
                successor: None,
            } => self.release(&name).await,
            Request::Release {
                name,
                successor: Some(owner),
            } => self.yield_to(&name, &owner).await,
            Request::Forfeit { name } => self.forfeit(&name).await,
        }
    }

    fn endpoint(&self, name: &str) -> Result<Endpoint> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::UnknownEndpoint(name.to_string()))
    }

    fn show_checked(&self, endpoint: &Endpoint, checked: bool) {
        if let Some(handle) = endpoint.handle {
            self.presenter.set_checked(handle, checked);
        }
    }

    fn show_busy(&self, endpoint: &Endpoint, busy: bool) {
        if let Some(handle) = endpoint.handle {
            self.presenter.set_enabled(handle, !busy);
        }
    }

    async fn broadcast(&self) {
        let snapshot = self.registry.snapshot();
        if let Err(e) = announce(self.outbound.as_ref(), &snapshot, self.max_datagram).await {
            warn!(error = %e, "failed to broadcast snapshot");
        }
    }

    async fn send_intents(&self, endpoint: &Endpoint) {
        for address in &endpoint.addresses {
            let intent = Message::Intent(ClaimIntent {
                host: self.local.to_string(),
                address: address.clone(),
            });
            let sent = match intent.encode() {
                Ok(payload) => self.outbound.send(&payload).await.map_err(Error::from),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = sent {
                warn!(address, error = %e, "failed to send claim intent");
            }
        }
    }

    /// Free/Owned-Remote → Owned-Local. Exclusion-group rivals owned here are
    /// released first; if any of them cannot be released the claim is abandoned.
    pub async fn claim(&self, name: &str) -> Result<()> {
        let endpoint = self.endpoint(name)?;
        if endpoint.is_owned_by(&self.local) {
            self.show_checked(&endpoint, true);
            return Ok(());
        }

        self.show_busy(&endpoint, true);
        if self.claim_intents {
            self.send_intents(&endpoint).await;
            tokio::time::sleep(INTENT_PROPAGATION).await;
        }

        for rival in self.registry.rivals_owned_by(name, &self.local) {
            info!(endpoint = %rival.name, claimed = name, "releasing exclusion group rival");
            if let Err(e) = self.release(&rival.name).await {
                warn!(endpoint = name, rival = %rival.name, error = %e, "claim abandoned");
                self.show_checked(&endpoint, false);
                self.show_busy(&endpoint, false);
                return Err(e);
            }
        }

        let endpoint = self.registry.get(name).unwrap_or(endpoint);
        let result = self.actuator.apply(Operation::Connect, &endpoint).await;
        if result.is_ok() {
            self.registry.upsert(name, |e| {
                e.owner = self.local.to_string();
                e.yielded_to = None;
            });
            info!(endpoint = name, "claimed");
        }
        self.show_checked(&endpoint, result.is_ok());
        self.show_busy(&endpoint, false);

        if result.is_ok() {
            self.broadcast().await;
        }
        result.map_err(Error::from)
    }

    /// Owned-Local → Free on local request. Ownership is only cleared once the
    /// disconnect succeeded.
    pub async fn release(&self, name: &str) -> Result<()> {
        let endpoint = self.endpoint(name)?;
        if !endpoint.is_owned_by(&self.local) {
            self.show_checked(&endpoint, false);
            return Ok(());
        }

        self.show_busy(&endpoint, true);
        let result = self.actuator.apply(Operation::Disconnect, &endpoint).await;
        if result.is_ok() {
            self.registry.update(name, |e| {
                if e.is_owned_by(&self.local) {
                    e.owner.clear();
                }
            });
            info!(endpoint = name, "released");
        }
        // a failed release leaves the entry checked
        self.show_checked(&endpoint, result.is_err());
        self.show_busy(&endpoint, false);

        if result.is_ok() {
            self.broadcast().await;
        }
        result.map_err(Error::from)
    }

    /// Owned-Local → Free because `successor` took the endpoint over.
    async fn yield_to(&self, name: &str, successor: &str) -> Result<()> {
        let endpoint = self.endpoint(name)?;
        if !endpoint.is_owned_by(&self.local) {
            return Ok(());
        }

        self.show_busy(&endpoint, true);
        if let Err(e) = self.actuator.apply(Operation::Disconnect, &endpoint).await {
            warn!(endpoint = name, error = %e, "disconnect failed, yielding anyway");
        }
        self.registry.update(name, |e| {
            if e.is_owned_by(&self.local) {
                e.owner = successor.to_string();
                e.yielded_to = Some(successor.to_string());
            }
        });
        info!(endpoint = name, successor, "yielded");
        self.show_checked(&endpoint, false);
        self.show_busy(&endpoint, false);

        self.broadcast().await;
        Ok(())
    }

    /// Owned-Remote → Free when the host this one yielded to has yielded back.
    /// Both sides disconnected, so the endpoint is announced as free instead of
    /// being reclaimed.
    async fn forfeit(&self, name: &str) -> Result<()> {
        let endpoint = self.endpoint(name)?;
        if endpoint.is_owned_by(&self.local) || endpoint.yielded_to.is_none() {
            return Ok(());
        }

        self.registry.update(name, |e| {
            if !e.is_owned_by(&self.local) {
                e.owner.clear();
                e.yielded_to = None;
            }
        });
        info!(endpoint = name, "crossed takeover, leaving endpoint free");
        self.show_checked(&endpoint, false);

        self.broadcast().await;
        Ok(())
    }
}
