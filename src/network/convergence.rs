//! Bootstrap loop. A fresh host pings the network until a peer's snapshot
//! fills its registry, it was seeded locally, or the timeout elapses.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Outbound;
use super::wire::PING;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Local state was loaded; only the opening ping went out.
    Seeded,
    Converged { pings: u32 },
    TimedOut { pings: u32 },
}

pub struct ConvergenceLoop {
    registry: Arc<Registry>,
    outbound: Arc<dyn Outbound>,
    interval: Duration,
    timeout: Duration,
}

impl ConvergenceLoop {
    pub fn new(
        registry: Arc<Registry>,
        outbound: Arc<dyn Outbound>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            outbound,
            interval,
            timeout,
        }
    }

    async fn ping(&self, pings: &mut u32) {
        *pings += 1;
        debug!(attempt = *pings, "pinging peers");
        if let Err(e) = self.outbound.send(PING).await {
            warn!(error = %e, "ping failed");
        }
    }

    /// Seeded hosts still send one ping so that peers' current owners are
    /// merged before this host announces anything itself.
    pub async fn run(&self, seeded: bool) -> Convergence {
        let mut pings = 0;
        self.ping(&mut pings).await;
        if seeded {
            return Convergence::Seeded;
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            tokio::time::sleep(self.interval).await;
            if !self.registry.is_empty() {
                info!(pings, endpoints = self.registry.len(), "converged with peers");
                return Convergence::Converged { pings };
            }
            if Instant::now() >= deadline {
                warn!(pings, "no peer answered");
                return Convergence::TimedOut { pings };
            }
            self.ping(&mut pings).await;
        }
    }
}
