//! Probe seams consumed by the Observer and Verifier.

use async_trait::async_trait;

use crate::health::types::{EndpointCheck, ProbeError, ProcessCheck};

/// Is a named process/service/container running?
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    async fn is_running(&self, process_name: &str) -> Result<ProcessCheck, ProbeError>;
}

/// Probe an HTTP health endpoint.
///
/// `Ok` covers every answered request, including non-2xx responses.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    async fn check_endpoint(&self, url: &str) -> Result<EndpointCheck, ProbeError>;
}
