//! Merges remote snapshots and claim intents into the registry.
//!
//! The decide phase runs under the registry lock and only records plain owner
//! changes; transitions that need actuation come back as [`Request`]s for the
//! dispatcher, so no device call ever happens while the lock is held.
//!
//! Local ownership always yields to a later-observed remote claim. Two hosts
//! claiming concurrently can both believe they own an endpoint until their
//! snapshots cross; after that both agree. This is a liveness guarantee, not
//! linearizability.

use std::sync::Arc;

use tracing::{debug, info};

use super::Request;
use crate::network::wire::ClaimIntent;
use crate::registry::{Endpoint, HostId, Registry, Snapshot};
use crate::ui::Presenter;

pub struct Reconciler {
    local: HostId,
    registry: Arc<Registry>,
    presenter: Arc<dyn Presenter>,
}

impl Reconciler {
    pub fn new(local: HostId, registry: Arc<Registry>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            local,
            registry,
            presenter,
        }
    }

    /// Applies a (possibly partial) remote snapshot. Endpoints it does not
    /// mention are left untouched.
    pub fn reconcile(&self, remote: Snapshot) -> Vec<Request> {
        let local = self.local.as_str();
        let mut requests = Vec::new();
        let mut created = Vec::new();

        self.registry.batch(|endpoints| {
            for (name, record) in remote {
                let endpoint = endpoints.entry(name.clone()).or_insert_with(|| {
                    created.push(name.clone());
                    Endpoint::new(name.clone())
                });
                endpoint.addresses = record.addresses.into_iter().collect();
                endpoint.exclusion_group = record.exclusion_group;

                let local_owns = endpoint.owner == local;
                let remote_claims_local = record.owner == local;
                match (local_owns, remote_claims_local) {
                    (true, false) => requests.push(Request::Release {
                        name,
                        successor: Some(record.owner),
                    }),
                    // our own yield came back: both hosts let go
                    (false, true) if endpoint.yielded_to.is_some() => {
                        requests.push(Request::Forfeit { name })
                    }
                    (false, true) => requests.push(Request::Claim { name }),
                    _ => {
                        if endpoint.yielded_to.as_deref() != Some(record.owner.as_str()) {
                            endpoint.yielded_to = None;
                        }
                        endpoint.owner = record.owner;
                    }
                }
            }
        });

        for name in created {
            let handle = self.presenter.register_endpoint(&name);
            self.registry.update(&name, |endpoint| endpoint.handle = Some(handle));
            info!(endpoint = %name, "learned endpoint from peer");
        }

        if !requests.is_empty() {
            debug!(?requests, "reconcile produced transitions");
        }
        requests
    }

    /// Another host wants `intent.address`: every local endpoint holding it is released.
    pub fn reconcile_intent(&self, intent: &ClaimIntent) -> Vec<Request> {
        if intent.host == self.local.as_str() {
            return Vec::new();
        }
        self.registry
            .all()
            .into_iter()
            .filter(|endpoint| {
                endpoint.is_owned_by(&self.local) && endpoint.addresses.contains(&intent.address)
            })
            .map(|endpoint| Request::Release {
                name: endpoint.name,
                successor: Some(intent.host.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EndpointRecord, Ownership};
    use crate::test_utils::TestHost;

    fn record(addresses: &[&str], group: &str, owner: &str) -> EndpointRecord {
        EndpointRecord {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            exclusion_group: group.to_string(),
            owner: owner.to_string(),
        }
    }

    fn snapshot(entries: &[(&str, EndpointRecord)]) -> Snapshot {
        entries
            .iter()
            .map(|(name, record)| (name.to_string(), record.clone()))
            .collect()
    }

    #[test]
    fn test_unknown_endpoint_is_created_and_registered() {
        let host = TestHost::new("desk");
        let requests = host
            .reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "laptop"))]));

        assert!(requests.is_empty());
        let speaker = host.registry.get("Speaker").unwrap();
        assert_eq!(speaker.owner, "laptop");
        assert_eq!(speaker.exclusion_group, "audio");
        assert!(speaker.handle.is_some());
        assert_eq!(host.presenter.checked("Speaker"), Some(false));
    }

    #[test]
    fn test_descriptive_fields_are_copied_verbatim() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA", "BB"], "audio", "");

        host.reconciler
            .reconcile(snapshot(&[("Speaker", record(&["CC"], "living-room", ""))]));

        let speaker = host.registry.get("Speaker").unwrap();
        assert_eq!(speaker.addresses.into_iter().collect::<Vec<_>>(), vec!["CC"]);
        assert_eq!(speaker.exclusion_group, "living-room");
    }

    #[test]
    fn test_remote_claim_on_local_endpoint_requests_release() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA"], "audio", "desk");

        let requests = host
            .reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "laptop"))]));

        assert_eq!(
            requests,
            vec![Request::Release {
                name: "Speaker".to_string(),
                successor: Some("laptop".to_string()),
            }]
        );
        // the owner only changes once the release has actually run
        assert_eq!(host.ownership("Speaker"), Ownership::Local);
    }

    #[test]
    fn test_remote_assertion_of_local_ownership_requests_claim() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA"], "audio", "");

        let requests = host
            .reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "desk"))]));

        assert_eq!(
            requests,
            vec![Request::Claim {
                name: "Speaker".to_string()
            }]
        );
    }

    #[test]
    fn test_claim_echoed_after_yield_is_forfeited() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA"], "audio", "laptop");
        host.registry
            .update("Speaker", |e| e.yielded_to = Some("laptop".to_string()));

        let requests = host
            .reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "desk"))]));

        assert_eq!(
            requests,
            vec![Request::Forfeit {
                name: "Speaker".to_string()
            }]
        );
    }

    #[test]
    fn test_new_remote_owner_clears_yield_marker() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA"], "audio", "laptop");
        host.registry
            .update("Speaker", |e| e.yielded_to = Some("laptop".to_string()));

        host.reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "laptop"))]));
        assert!(host.registry.get("Speaker").unwrap().yielded_to.is_some());

        host.reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "tablet"))]));
        assert!(host.registry.get("Speaker").unwrap().yielded_to.is_none());

        // a later assertion of local ownership is a real claim again
        let requests = host
            .reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "desk"))]));
        assert_eq!(
            requests,
            vec![Request::Claim {
                name: "Speaker".to_string()
            }]
        );
    }

    #[test]
    fn test_remote_owner_changes_are_stored() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA"], "audio", "laptop");

        let requests = host
            .reconciler
            .reconcile(snapshot(&[("Speaker", record(&["AA"], "audio", "tablet"))]));

        assert!(requests.is_empty());
        assert_eq!(
            host.ownership("Speaker"),
            Ownership::Remote("tablet".to_string())
        );
        assert!(host.controller.calls().is_empty());
    }

    #[test]
    fn test_partial_snapshot_leaves_others_untouched() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA"], "audio", "desk");
        host.seed("Headset", &["BB"], "audio", "");
        let before = host.registry.get("Speaker").unwrap();

        host.reconciler
            .reconcile(snapshot(&[("Headset", record(&["BB"], "audio", "laptop"))]));

        assert_eq!(host.registry.get("Speaker").unwrap(), before);
        assert_eq!(
            host.ownership("Headset"),
            Ownership::Remote("laptop".to_string())
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let host = TestHost::new("desk");
        host.seed("Speaker", &["AA"], "audio", "");
        let remote = snapshot(&[
            ("Speaker", record(&["AA"], "audio", "laptop")),
            ("Headset", record(&["BB", "CC"], "audio", "")),
            ("Radio", record(&["DD"], "", "tablet")),
        ]);

        host.reconciler.reconcile(remote.clone());
        let once = host.registry.snapshot();
        let requests = host.reconciler.reconcile(remote);
        let twice = host.registry.snapshot();

        assert!(requests.is_empty());
        assert_eq!(once, twice);
        assert_eq!(host.registry.len(), 3);
    }

    #[test]
    fn test_intent_releases_matching_local_endpoint() {
        let host = TestHost::new("desk");
        host.seed("Earbuds", &["AA", "BB"], "audio", "desk");
        host.seed("Speaker", &["CC"], "audio", "laptop");

        let intent = ClaimIntent {
            host: "laptop".to_string(),
            address: "BB".to_string(),
        };
        assert_eq!(
            host.reconciler.reconcile_intent(&intent),
            vec![Request::Release {
                name: "Earbuds".to_string(),
                successor: Some("laptop".to_string()),
            }]
        );

        let unrelated = ClaimIntent {
            host: "laptop".to_string(),
            address: "CC".to_string(),
        };
        assert!(host.reconciler.reconcile_intent(&unrelated).is_empty());
    }

    #[test]
    fn test_own_intent_is_ignored() {
        let host = TestHost::new("desk");
        host.seed("Earbuds", &["AA"], "audio", "desk");

        let intent = ClaimIntent {
            host: "desk".to_string(),
            address: "AA".to_string(),
        };
        assert!(host.reconciler.reconcile_intent(&intent).is_empty());
    }
}
