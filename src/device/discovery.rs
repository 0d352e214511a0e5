//! Turns paired audio devices into endpoints. Devices sharing a display label
//! collapse into one endpoint with several addresses.

use std::collections::{BTreeMap, BTreeSet};

use super::DeviceController;
use crate::error::DeviceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpoint {
    pub name: String,
    pub addresses: BTreeSet<String>,
    pub connected: bool,
}

pub async fn discover_endpoints(
    controller: &dyn DeviceController,
) -> Result<Vec<DiscoveredEndpoint>, DeviceError> {
    let mut by_name: BTreeMap<String, DiscoveredEndpoint> = BTreeMap::new();
    for device in controller.list_paired_devices().await? {
        if !device.audio_capable {
            continue;
        }
        let entry = by_name
            .entry(device.display_name.clone())
            .or_insert_with(|| DiscoveredEndpoint {
                name: device.display_name.clone(),
                addresses: BTreeSet::new(),
                connected: false,
            });
        entry.addresses.insert(device.address);
        entry.connected |= device.connected;
    }
    Ok(by_name.into_values().collect())
}
