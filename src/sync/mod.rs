//! Ownership synchronisation: the per-endpoint state machine, actuation with
//! bounded retry, and reconciliation of remote snapshots.

mod actuation;
mod dispatcher;
mod ownership;
mod reconcile;
mod seed;

pub use actuation::{Actuator, Operation, RetryPolicy};
pub use dispatcher::Dispatcher;
pub use ownership::Coordinator;
pub use reconcile::Reconciler;
pub use seed::{load_seed_file, seed_discovered};

/// An ownership transition waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Free/Owned-Remote → Owned-Local.
    Claim { name: String },
    /// Owned-Local → Free. A `successor` marks a takeover by another host:
    /// the disconnect is best-effort and the successor is recorded as owner.
    Release {
        name: String,
        successor: Option<String>,
    },
    /// Owned-Remote → Free after a crossed takeover: this host yielded and
    /// the host it yielded to has yielded back.
    Forfeit { name: String },
}

impl Request {
    pub fn name(&self) -> &str {
        match self {
            Request::Claim { name } | Request::Release { name, .. } | Request::Forfeit { name } => {
                name
            }
        }
    }
}
