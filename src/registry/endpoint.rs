//! Endpoint model. An endpoint is a named audio sink reachable through one or
//! more device addresses, plus the host currently believed to own it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ui::UiHandle;

/// Stable identity of a participating host, written into `owner` on claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Hostname of this machine, falling back to `localhost` when it cannot be read.
    pub fn from_system() -> Self {
        Self(dns_lookup::get_hostname().unwrap_or_else(|_| "localhost".to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ownership state of an endpoint as seen from one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    Free,
    Local,
    Remote(String),
}

impl std::fmt::Display for Ownership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ownership::Free => write!(f, "free"),
            Ownership::Local => write!(f, "local"),
            Ownership::Remote(host) => write!(f, "owned by {}", host),
        }
    }
}

/// Wire form of an endpoint. The UI handle never leaves the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRecord {
    pub addresses: Vec<String>,
    pub exclusion_group: String,
    pub owner: String,
}

/// Endpoint name to record. Ordered so encodings are deterministic.
pub type Snapshot = BTreeMap<String, EndpointRecord>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub addresses: BTreeSet<String>,
    pub exclusion_group: String,
    pub owner: String,
    pub handle: Option<UiHandle>,
    /// Host this endpoint was last yielded to; never leaves the host.
    pub yielded_to: Option<String>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addresses: BTreeSet::new(),
            exclusion_group: String::new(),
            owner: String::new(),
            handle: None,
            yielded_to: None,
        }
    }

    pub fn record(&self) -> EndpointRecord {
        EndpointRecord {
            addresses: self.addresses.iter().cloned().collect(),
            exclusion_group: self.exclusion_group.clone(),
            owner: self.owner.clone(),
        }
    }

    pub fn ownership(&self, local: &HostId) -> Ownership {
        if self.owner.is_empty() {
            Ownership::Free
        } else if self.owner == local.as_str() {
            Ownership::Local
        } else {
            Ownership::Remote(self.owner.clone())
        }
    }

    pub fn is_owned_by(&self, host: &HostId) -> bool {
        self.owner == host.as_str()
    }

    /// True when both endpoints share a non-empty exclusion group.
    pub fn excludes(&self, other: &Endpoint) -> bool {
        self.name != other.name
            && !self.exclusion_group.is_empty()
            && self.exclusion_group == other.exclusion_group
    }
}
