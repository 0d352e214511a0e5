//! Endpoint registry. A single mutex guards the whole map; every critical
//! section is a plain map mutation and never spans I/O.

mod endpoint;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use endpoint::{Endpoint, EndpointRecord, HostId, Ownership, Snapshot};

#[derive(Debug, Default)]
pub struct Registry {
    endpoints: Mutex<HashMap<String, Endpoint>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Endpoint>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<Endpoint> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Atomic read-modify-write of one endpoint, creating it when absent.
    pub fn upsert<R>(&self, name: &str, mutate: impl FnOnce(&mut Endpoint) -> R) -> R {
        let mut endpoints = self.lock();
        let endpoint = endpoints
            .entry(name.to_string())
            .or_insert_with(|| Endpoint::new(name));
        mutate(endpoint)
    }

    /// Like `upsert`, but leaves unknown names alone.
    pub fn update<R>(&self, name: &str, mutate: impl FnOnce(&mut Endpoint) -> R) -> Option<R> {
        self.lock().get_mut(name).map(mutate)
    }

    /// Runs `apply` with the whole map locked, for multi-endpoint decisions
    /// that must observe one consistent state.
    pub fn batch<R>(&self, apply: impl FnOnce(&mut HashMap<String, Endpoint>) -> R) -> R {
        apply(&mut self.lock())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock()
            .values()
            .map(|endpoint| (endpoint.name.clone(), endpoint.record()))
            .collect()
    }

    /// Copy of every endpoint, ordered by name.
    pub fn all(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self.lock().values().cloned().collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));
        endpoints
    }

    /// Endpoints sharing `name`'s exclusion group that `host` currently owns.
    pub fn rivals_owned_by(&self, name: &str, host: &HostId) -> Vec<Endpoint> {
        let endpoints = self.lock();
        let Some(target) = endpoints.get(name) else {
            return Vec::new();
        };
        let mut rivals: Vec<Endpoint> = endpoints
            .values()
            .filter(|other| target.excludes(other) && other.is_owned_by(host))
            .cloned()
            .collect();
        rivals.sort_by(|a, b| a.name.cmp(&b.name));
        rivals
    }
}
