use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Coordinator, Request};

/// Drains ownership requests from UI toggles and reconciliation one at a
/// time, so at most one transition is in flight per host.
pub struct Dispatcher {
    requests: mpsc::Receiver<Request>,
    coordinator: Arc<Coordinator>,
}

impl Dispatcher {
    pub fn new(requests: mpsc::Receiver<Request>, coordinator: Arc<Coordinator>) -> Self {
        Self {
            requests,
            coordinator,
        }
    }

    pub async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            debug!(?request, "applying");
            let name = request.name().to_string();
            if let Err(e) = self.coordinator.apply(request).await {
                warn!(endpoint = %name, error = %e, "ownership transition failed");
            }
        }
        debug!("request queue closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Ownership;
    use crate::test_utils::TestHost;

    #[tokio::test]
    async fn test_requests_run_in_order() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["SP"], "audio", "");
        host.seed("Headset", &["HS"], "audio", "");

        let (tx, rx) = mpsc::channel(8);
        let dispatcher = Dispatcher::new(rx, host.coordinator.clone());

        for request in [
            Request::Claim {
                name: "Speaker".to_string(),
            },
            Request::Claim {
                name: "Ghost".to_string(),
            },
            Request::Claim {
                name: "Headset".to_string(),
            },
        ] {
            tx.send(request).await.unwrap();
        }
        drop(tx);
        dispatcher.run().await;

        assert_eq!(host.ownership("Speaker"), Ownership::Free);
        assert_eq!(host.ownership("Headset"), Ownership::Local);
        assert_eq!(host.controller.calls().len(), 3);
    }
}
