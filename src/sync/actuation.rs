//! Drives connect/disconnect through the device controller, one address at a
//! time, with a bounded number of attempts per address.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::device::{AudioRouter, DeviceController};
use crate::error::ActuationError;
use crate::registry::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Disconnect,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Connect => write!(f, "connect"),
            Operation::Disconnect => write!(f, "disconnect"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

pub struct Actuator {
    controller: Arc<dyn DeviceController>,
    router: Arc<dyn AudioRouter>,
    policy: RetryPolicy,
    sink_match: String,
    fallback_sink: Option<String>,
}

impl Actuator {
    pub fn new(
        controller: Arc<dyn DeviceController>,
        router: Arc<dyn AudioRouter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            controller,
            router,
            policy,
            sink_match: "bluez".to_string(),
            fallback_sink: None,
        }
    }

    /// Sink criteria used after a connect and, optionally, after a disconnect.
    pub fn with_sinks(mut self, sink_match: impl Into<String>, fallback: Option<String>) -> Self {
        self.sink_match = sink_match.into();
        self.fallback_sink = fallback;
        self
    }

    /// Applies `operation` to every address of `endpoint`. Every address is
    /// attempted; the first exhausted address is reported.
    pub async fn apply(&self, operation: Operation, endpoint: &Endpoint) -> Result<(), ActuationError> {
        if endpoint.addresses.is_empty() {
            return Err(ActuationError::NoAddresses(endpoint.name.clone()));
        }

        let mut failure = None;
        for address in &endpoint.addresses {
            if let Err(e) = self.apply_address(operation, address).await {
                warn!(endpoint = %endpoint.name, error = %e, "actuation failed");
                failure.get_or_insert(e);
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        info!(endpoint = %endpoint.name, %operation, "actuation succeeded");
        match operation {
            Operation::Connect => self.route_audio(self.sink_match.clone()),
            Operation::Disconnect => {
                if let Some(fallback) = &self.fallback_sink {
                    self.route_audio(fallback.clone());
                }
            }
        }
        Ok(())
    }

    async fn apply_address(&self, operation: Operation, address: &str) -> Result<(), ActuationError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match operation {
                Operation::Connect => self.controller.connect(address).await,
                Operation::Disconnect => self.controller.disconnect(address).await,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(last) if attempt >= max_attempts => {
                    return Err(ActuationError::Exhausted {
                        operation,
                        address: address.to_string(),
                        attempts: attempt,
                        last,
                    });
                }
                Err(e) => {
                    warn!(%operation, address, attempt, error = %e, "retrying");
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }

    /// Best-effort; never rolls back the transition that triggered it.
    fn route_audio(&self, criterion: String) {
        let router = self.router.clone();
        tokio::spawn(async move {
            if let Err(e) = router.set_default_sink(&criterion).await {
                warn!(criterion, error = %e, "failed to switch default audio output");
            }
        });
    }
}
