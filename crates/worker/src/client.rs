// Temporal client wrapper
// Decision: Wrap the temporal-sdk-core gateway behind the Connector/OrchestrationClient seam
// Decision: One gateway connection proves the server is reachable; the worker's core
//           opens its own polling connection bound to the task queue
//
// This module provides:
// - Connection management to the Temporal server
// - Gateway options shared by the client and the workers it creates

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use temporal_sdk_core::{ServerGateway, ServerGatewayOptions, Url};
use tracing::info;

use crate::bootstrap::{Connector, OrchestrationClient};
use crate::config::WorkerConfig;
use crate::worker::TemporalWorker;

/// Long poll timeout for workflow and activity task polling
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Build gateway options for a Temporal endpoint
fn gateway_options(
    address: &str,
    namespace: &str,
    task_queue: &str,
    identity: &str,
) -> Result<ServerGatewayOptions> {
    let target_url =
        Url::parse(&format!("http://{}", address)).context("Invalid Temporal address")?;

    Ok(ServerGatewayOptions {
        target_url,
        namespace: namespace.to_string(),
        task_queue: task_queue.to_string(),
        identity: identity.to_string(),
        worker_binary_id: env!("CARGO_PKG_VERSION").to_string(),
        long_poll_timeout: LONG_POLL_TIMEOUT,
    })
}

/// Dials the Temporal frontend service
#[derive(Debug, Clone)]
pub struct TemporalConnector {
    namespace: String,
    identity: String,
}

impl TemporalConnector {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            namespace: config.temporal_namespace(),
            identity: format!("cart-worker-{}", uuid::Uuid::now_v7()),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

#[async_trait]
impl Connector for TemporalConnector {
    type Client = TemporalClient;

    async fn connect(&self, address: &str) -> Result<TemporalClient> {
        let gateway_opts = gateway_options(address, &self.namespace, "", &self.identity)?;

        let gateway = gateway_opts
            .connect()
            .await
            .context("Failed to connect to Temporal server")?;

        Ok(TemporalClient {
            _gateway: Arc::new(gateway),
            address: address.to_string(),
            namespace: self.namespace.clone(),
            identity: self.identity.clone(),
        })
    }
}

/// Live connection to a Temporal server
///
/// Held for the lifetime of the worker process and released by
/// [`OrchestrationClient::close`].
pub struct TemporalClient {
    _gateway: Arc<ServerGateway>,
    address: String,
    namespace: String,
    identity: String,
}

#[async_trait]
impl OrchestrationClient for TemporalClient {
    type Worker = TemporalWorker;

    fn new_worker(&self, task_queue: &str) -> TemporalWorker {
        let gateway_opts =
            gateway_options(&self.address, &self.namespace, task_queue, &self.identity);
        TemporalWorker::new(task_queue, gateway_opts)
    }

    async fn close(self) {
        info!(
            address = %self.address,
            namespace = %self.namespace,
            "Closing Temporal client"
        );
    }
}
