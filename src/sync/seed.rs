//! Local seeding: paired devices found at startup, or an operator-supplied
//! snapshot file.

use std::path::Path;

use tracing::{info, warn};

use super::Request;
use crate::device::DiscoveredEndpoint;
use crate::error::{Error, Result, WireError};
use crate::network::wire::Message;
use crate::registry::{HostId, Registry, Snapshot};
use crate::ui::Presenter;

/// Records discovered endpoints. Devices already connected count as owned
/// here; a second connected device in the same exclusion group is returned
/// as a release request.
pub fn seed_discovered(
    registry: &Registry,
    presenter: &dyn Presenter,
    local: &HostId,
    exclusion_group: &str,
    found: Vec<DiscoveredEndpoint>,
) -> Vec<Request> {
    let mut requests = Vec::new();
    for discovered in found {
        let name = discovered.name;
        let handle = match registry.get(&name).and_then(|endpoint| endpoint.handle) {
            Some(handle) => handle,
            None => presenter.register_endpoint(&name),
        };

        registry.upsert(&name, |endpoint| {
            endpoint.handle = Some(handle);
            endpoint.addresses.extend(discovered.addresses);
            if endpoint.exclusion_group.is_empty() {
                endpoint.exclusion_group = exclusion_group.to_string();
            }
            if discovered.connected {
                endpoint.owner = local.to_string();
            }
        });
        presenter.set_checked(handle, discovered.connected);

        if discovered.connected && !registry.rivals_owned_by(&name, local).is_empty() {
            warn!(endpoint = %name, "another endpoint in the same group is already connected");
            requests.push(Request::Release {
                name: name.clone(),
                successor: None,
            });
        }
        info!(endpoint = %name, connected = discovered.connected, "discovered");
    }
    requests
}

/// Reads a snapshot file in wire format.
pub fn load_seed_file(path: &Path) -> Result<Snapshot> {
    let bytes = std::fs::read(path).map_err(|source| Error::Seed {
        path: path.to_path_buf(),
        source,
    })?;
    match Message::decode(&bytes)? {
        Message::Snapshot(snapshot) => Ok(snapshot),
        _ => Err(WireError::Unrecognised(path.display().to_string()).into()),
    }
}
