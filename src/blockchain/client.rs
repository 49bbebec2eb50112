//! Blockchain RPC client with failover, timeouts and request throttling.
//!
//! # Responsibilities
//! - Connect to the primary JSON-RPC endpoint and any failovers
//! - Report dependency health (chain position + latency) from the active endpoint
//! - Scan recent block receipts for reverted operations sent by a subject
//! - Rotate the active endpoint on request, only onto an endpoint that answers
//!
//! Read-only: nothing here signs or submits transactions.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::eips::BlockId;
use alloy::network::ReceiptResponse;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use tokio::time::{timeout, Instant};

use crate::blockchain::types::{
    DependencyControl, DependencyError, DependencyHealth, DependencyProbe, DependencyResult,
};
use crate::config::DependencyConfig;
use crate::health::types::{OperationFailure, ProbeError};
use crate::observability::metrics;
use crate::resilience::TokenBucket;

struct Endpoint {
    url: String,
    provider: Arc<dyn Provider + Send + Sync>,
}

/// Dependency RPC client wrapper with failover support.
pub struct ChainClient {
    name: String,
    endpoints: Vec<Endpoint>,
    active: AtomicUsize,
    timeout_duration: Duration,
    scan_blocks: u64,
    bucket: Mutex<TokenBucket>,
}

impl ChainClient {
    /// Create a new client. Fails only if the primary URL is invalid.
    pub fn new(config: &DependencyConfig) -> DependencyResult<Self> {
        let mut endpoints = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            DependencyError::InvalidEndpoint(format!("'{}': {}", config.rpc_url, e))
        })?;
        endpoints.push(Endpoint {
            url: config.rpc_url.clone(),
            provider: Arc::new(ProviderBuilder::new().connect_http(primary_url)),
        });

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                endpoints.push(Endpoint {
                    url: url_str.clone(),
                    provider: Arc::new(ProviderBuilder::new().connect_http(url)),
                });
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        tracing::info!(
            dependency = %config.name,
            rpc_url = %config.rpc_url,
            failovers = endpoints.len() - 1,
            "Chain client initialized"
        );

        Ok(Self {
            name: config.name.clone(),
            endpoints,
            active: AtomicUsize::new(0),
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            scan_blocks: config.operation_scan_blocks.max(1),
            bucket: Mutex::new(TokenBucket::new(config.burst, config.requests_per_second)),
        })
    }

    /// URL of the endpoint currently in use.
    pub fn active_endpoint(&self) -> &str {
        &self.endpoints[self.active_index()].url
    }

    fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire) % self.endpoints.len()
    }

    /// Wait for a request token.
    async fn throttle(&self) {
        loop {
            let wait = match self.bucket.lock() {
                Ok(mut bucket) => {
                    if bucket.try_acquire() {
                        return;
                    }
                    bucket.time_until_available()
                }
                Err(_) => return,
            };
            tokio::time::sleep(wait).await;
        }
    }

    async fn block_number_at(&self, index: usize) -> DependencyResult<u64> {
        self.throttle().await;
        let provider = &self.endpoints[index].provider;
        match timeout(self.timeout_duration, provider.get_block_number()).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(DependencyError::from_text(e.to_string())),
            Err(_) => Err(DependencyError::Timeout(self.timeout_duration.as_secs())),
        }
    }

    async fn failed_receipts_in(
        &self,
        provider: &(dyn Provider + Send + Sync),
        block: u64,
        from: Address,
    ) -> Result<Vec<OperationFailure>, ProbeError> {
        self.throttle().await;
        let receipts = match timeout(
            self.timeout_duration,
            provider.get_block_receipts(BlockId::number(block)),
        )
        .await
        {
            Ok(Ok(receipts)) => receipts.unwrap_or_default(),
            Ok(Err(e)) => return Err(ProbeError::Failed(e.to_string())),
            Err(_) => return Err(ProbeError::Timeout(self.timeout_duration)),
        };

        Ok(receipts
            .iter()
            .filter(|r| r.from == from && !ReceiptResponse::status(*r))
            .map(|r| OperationFailure {
                tx_hash: r.transaction_hash.to_string(),
                block: r.block_number,
                error: "reverted".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl DependencyProbe for ChainClient {
    fn current_endpoint(&self) -> String {
        self.active_endpoint().to_string()
    }

    async fn dependency_health(&self) -> DependencyHealth {
        let index = self.active_index();
        let url = &self.endpoints[index].url;
        let start = Instant::now();
        let result = self.block_number_at(index).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let health = match result {
            Ok(position) => DependencyHealth::healthy(url, position, latency_ms),
            Err(e) => {
                tracing::warn!(dependency = %self.name, endpoint = %url, error = %e, "Dependency check failed");
                DependencyHealth::unhealthy(url, latency_ms, e.to_string())
            }
        };
        metrics::record_dependency_health(&self.name, health.healthy, latency_ms);
        health
    }

    async fn recent_operation_failures(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<OperationFailure>, ProbeError> {
        let from = Address::from_str(address)
            .map_err(|e| ProbeError::Failed(format!("invalid operator address: {}", e)))?;

        let index = self.active_index();
        let latest = self.block_number_at(index).await.map_err(|e| match e {
            DependencyError::Timeout(_) => ProbeError::Timeout(self.timeout_duration),
            other => ProbeError::Failed(other.to_string()),
        })?;

        let provider = self.endpoints[index].provider.as_ref();
        let oldest = latest.saturating_sub(self.scan_blocks - 1);
        let mut failures = Vec::new();
        for block in (oldest..=latest).rev() {
            failures.extend(self.failed_receipts_in(provider, block, from).await?);
            if failures.len() >= limit {
                failures.truncate(limit);
                break;
            }
        }
        Ok(failures)
    }
}

#[async_trait]
impl DependencyControl for ChainClient {
    async fn switch_endpoint(&self) -> DependencyResult<String> {
        if self.endpoints.len() < 2 {
            return Err(DependencyError::NoAlternateEndpoint);
        }

        let current = self.active_index();
        let mut last_error = DependencyError::NoAlternateEndpoint;
        for step in 1..self.endpoints.len() {
            let candidate = (current + step) % self.endpoints.len();
            match self.block_number_at(candidate).await {
                Ok(_) => {
                    self.active.store(candidate, Ordering::Release);
                    let url = self.endpoints[candidate].url.clone();
                    tracing::info!(
                        dependency = %self.name,
                        from = %self.endpoints[current].url,
                        to = %url,
                        "Switched dependency endpoint"
                    );
                    return Ok(url);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %self.endpoints[candidate].url, error = %e, "Alternate endpoint unreachable");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("name", &self.name)
            .field("active_endpoint", &self.active_endpoint())
            .field("endpoints", &self.endpoints.len())
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}
