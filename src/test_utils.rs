use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::device::{AudioProfile, AudioRouter, DeviceController, PairedDevice};
use crate::error::{DeviceError, TransportError};
use crate::network::Outbound;
use crate::network::inbound::Inbound;
use crate::registry::{Endpoint, HostId, Ownership, Registry};
use crate::sync::{Actuator, Coordinator, Operation, Reconciler, Request, RetryPolicy};
use crate::ui::{Presenter, UiHandle};

/// Builds a detached endpoint.
pub fn endpoint(name: &str, addresses: &[&str], group: &str, owner: &str) -> Endpoint {
    let mut endpoint = Endpoint::new(name);
    endpoint.addresses = addresses.iter().map(|a| a.to_string()).collect::<BTreeSet<_>>();
    endpoint.exclusion_group = group.to_string();
    endpoint.owner = owner.to_string();
    endpoint
}

/// Device controller that records every attempt and fails on request.
#[derive(Default)]
pub struct RecordingController {
    calls: Mutex<Vec<(Operation, String)>>,
    // remaining failures per address; `None` fails forever
    failures: Mutex<HashMap<String, Option<usize>>>,
    paired: Vec<PairedDevice>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paired(paired: Vec<PairedDevice>) -> Self {
        Self {
            paired,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self, address: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, called)| called == address)
            .count()
    }

    pub fn fail_address(&self, address: &str) {
        self.failures.lock().unwrap().insert(address.to_string(), None);
    }

    pub fn fail_times(&self, address: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(address.to_string(), Some(times));
    }

    fn record(&self, operation: Operation, address: &str) -> Result<(), DeviceError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation, address.to_string()));

        let mut failures = self.failures.lock().unwrap();
        let fail = match failures.get_mut(address) {
            Some(None) => true,
            Some(Some(0)) | None => false,
            Some(Some(remaining)) => {
                *remaining -= 1;
                true
            }
        };
        if fail {
            return Err(DeviceError::Failed {
                program: "bluetoothctl".to_string(),
                args: format!("{} {}", operation, address),
                status: "exit status: 1".to_string(),
                stderr: format!("Failed to {}", operation),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceController for RecordingController {
    async fn connect(&self, address: &str) -> Result<(), DeviceError> {
        self.record(Operation::Connect, address)
    }

    async fn disconnect(&self, address: &str) -> Result<(), DeviceError> {
        self.record(Operation::Disconnect, address)
    }

    async fn power_on(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn list_paired_devices(&self) -> Result<Vec<PairedDevice>, DeviceError> {
        Ok(self.paired.clone())
    }
}

#[derive(Default)]
pub struct RecordingRouter {
    sinks: Mutex<Vec<String>>,
    profiles: Mutex<Vec<(String, AudioProfile)>>,
}

impl RecordingRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sinks(&self) -> Vec<String> {
        self.sinks.lock().unwrap().clone()
    }

    pub fn profiles(&self) -> Vec<(String, AudioProfile)> {
        self.profiles.lock().unwrap().clone()
    }

    /// Sink switches run on spawned tasks; waits until `count` have landed.
    pub async fn wait_for_sinks(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let sinks = self.sinks();
            if sinks.len() >= count {
                return sinks;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} sink switches, saw {:?}", count, self.sinks());
    }
}

#[async_trait]
impl AudioRouter for RecordingRouter {
    async fn set_default_sink(&self, criterion: &str) -> Result<(), DeviceError> {
        self.sinks.lock().unwrap().push(criterion.to_string());
        Ok(())
    }

    async fn set_profile(&self, card_match: &str, profile: AudioProfile) -> Result<(), DeviceError> {
        self.profiles
            .lock()
            .unwrap()
            .push((card_match.to_string(), profile));
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PresentedEndpoint {
    name: String,
    checked: bool,
    enabled: bool,
}

#[derive(Default)]
pub struct RecordingPresenter {
    next: AtomicU64,
    entries: Mutex<HashMap<u64, PresentedEndpoint>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn find(&self, name: &str) -> Option<PresentedEndpoint> {
        self.entries
            .lock()
            .unwrap()
            .values()
            .find(|entry| entry.name == name)
            .cloned()
    }

    pub fn checked(&self, name: &str) -> Option<bool> {
        self.find(name).map(|entry| entry.checked)
    }

    pub fn enabled(&self, name: &str) -> Option<bool> {
        self.find(name).map(|entry| entry.enabled)
    }
}

impl Presenter for RecordingPresenter {
    fn register_endpoint(&self, name: &str) -> UiHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().insert(
            id,
            PresentedEndpoint {
                name: name.to_string(),
                checked: false,
                enabled: true,
            },
        );
        UiHandle(id)
    }

    fn set_checked(&self, handle: UiHandle, checked: bool) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&handle.0) {
            entry.checked = checked;
        }
    }

    fn set_enabled(&self, handle: UiHandle, enabled: bool) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&handle.0) {
            entry.enabled = enabled;
        }
    }
}

/// Collects outgoing datagrams instead of sending them.
#[derive(Default)]
pub struct MemoryOutbound {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MemoryOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Outbound for MemoryOutbound {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// One fully wired host with recording collaborators and no real I/O.
pub struct TestHost {
    pub local: HostId,
    pub registry: Arc<Registry>,
    pub controller: Arc<RecordingController>,
    pub router: Arc<RecordingRouter>,
    pub presenter: Arc<RecordingPresenter>,
    pub outbound: Arc<MemoryOutbound>,
    pub coordinator: Arc<Coordinator>,
    pub reconciler: Arc<Reconciler>,
    pub inbound: Inbound,
    requests: Mutex<mpsc::Receiver<Request>>,
}

impl TestHost {
    pub fn new(host: &str) -> Self {
        Self::build(host, false)
    }

    pub fn with_claim_intents(host: &str) -> Self {
        Self::build(host, true)
    }

    fn build(host: &str, claim_intents: bool) -> Self {
        let local = HostId::new(host);
        let registry = Arc::new(Registry::new());
        let controller = Arc::new(RecordingController::new());
        let router = Arc::new(RecordingRouter::new());
        let presenter = Arc::new(RecordingPresenter::new());
        let outbound = Arc::new(MemoryOutbound::new());

        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        };
        let actuator = Actuator::new(controller.clone(), router.clone(), policy);
        let coordinator = Arc::new(
            Coordinator::new(
                local.clone(),
                registry.clone(),
                actuator,
                presenter.clone(),
                outbound.clone(),
            )
            .with_claim_intents(claim_intents),
        );
        let reconciler = Arc::new(Reconciler::new(
            local.clone(),
            registry.clone(),
            presenter.clone(),
        ));

        let (tx, rx) = mpsc::channel(64);
        let inbound = Inbound::new(
            reconciler.clone(),
            registry.clone(),
            outbound.clone(),
            tx,
            crate::network::wire::DEFAULT_MAX_DATAGRAM,
        );

        Self {
            local,
            registry,
            controller,
            router,
            presenter,
            outbound,
            coordinator,
            reconciler,
            inbound,
            requests: Mutex::new(rx),
        }
    }

    /// Registers an endpoint the way local discovery would.
    pub fn seed(&self, name: &str, addresses: &[&str], group: &str, owner: &str) {
        let handle = self.presenter.register_endpoint(name);
        self.registry.upsert(name, |e| {
            *e = endpoint(name, addresses, group, owner);
            e.handle = Some(handle);
        });
        self.presenter.set_checked(handle, owner == self.local.as_str());
    }

    pub fn ownership(&self, name: &str) -> Ownership {
        self.registry
            .get(name)
            .map(|e| e.ownership(&self.local))
            .unwrap_or_else(|| panic!("no endpoint named {}", name))
    }

    /// Requests queued by inbound handling and not yet applied.
    pub fn pending_requests(&self) -> Vec<Request> {
        let mut requests = self.requests.lock().unwrap();
        let mut pending = Vec::new();
        while let Ok(request) = requests.try_recv() {
            pending.push(request);
        }
        pending
    }

    /// Handles one datagram and applies whatever transitions it queued.
    pub async fn deliver(&self, payload: &[u8]) {
        self.inbound.handle(payload).await;
        for request in self.pending_requests() {
            self.coordinator.apply(request).await.unwrap();
        }
    }
}

/// Delivers everything `from` has sent so far to `to`.
pub async fn relay(from: &TestHost, to: &TestHost) {
    for payload in from.outbound.take_sent() {
        to.deliver(&payload).await;
    }
}
