// Worker bootstrap
// Decision: The bootstrap is generic over the engine seam so ordering can be tested with fakes
// Decision: Strict order connect -> register -> run; a failed step never reaches the next one
// Decision: The interrupt channel is created only when the serve loop starts, like the
//           connection, registration and run calls it follows
//
// Architecture:
// - Connector: dials the engine at <host>:<port>, retried under ExponentialBackoff
// - OrchestrationClient: the live connection; hands out workers and is closed on exit
// - TaskWorker: static registration of the cart workflow and activities, then run()

use std::sync::Arc;

use async_trait::async_trait;
use cart_core::{activity_names, Activities, CartState};
use tokio::sync::watch;
use tracing::{error, info};

use crate::activity_registry::{activity_handler, ActivityHandler};
use crate::backoff::{self, ExponentialBackoff};
use crate::cart_workflow::CartWorkflow;
use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::traits::WorkflowInput;
use crate::workflow_registry::WorkflowFactory;

/// Establishes connections to the orchestration engine
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: OrchestrationClient;

    /// Make one connection attempt to `address`
    async fn connect(&self, address: &str) -> anyhow::Result<Self::Client>;
}

/// A live connection to the orchestration engine
#[async_trait]
pub trait OrchestrationClient: Send + Sync + 'static {
    type Worker: TaskWorker;

    /// Create a worker bound to one task queue
    fn new_worker(&self, task_queue: &str) -> Self::Worker;

    /// Release the connection
    async fn close(self);
}

/// A worker hosting workflows and activities for one task queue
#[async_trait]
pub trait TaskWorker: Send {
    fn register_workflow(&mut self, workflow_type: &'static str, factory: WorkflowFactory);

    fn register_activity(&mut self, activity_type: &'static str, handler: ActivityHandler);

    /// Serve the task queue until `interrupt` carries `true`
    async fn run(self, interrupt: watch::Receiver<bool>) -> anyhow::Result<()>;
}

/// Connect to `address`, retrying every failure until the policy gives up
pub async fn connect_with_backoff<C: Connector>(
    connector: &C,
    address: &str,
    policy: &ExponentialBackoff,
) -> Result<C::Client> {
    backoff::retry(policy, move || connector.connect(address))
        .await
        .map_err(|exhausted| WorkerError::Connect {
            address: address.to_string(),
            attempts: exhausted.attempts,
            source: exhausted.last_error,
        })
}

/// Register the cart workflow and its two activities on `worker`
pub fn register_cart_handlers<W: TaskWorker>(worker: &mut W, activities: Arc<Activities>) {
    let charge = activities.clone();
    worker.register_activity(
        activity_names::CREATE_STRIPE_CHARGE,
        activity_handler(move |cart: CartState| {
            let activities = charge.clone();
            async move {
                activities
                    .create_stripe_charge(cart)
                    .await
                    .map_err(anyhow::Error::from)
            }
        }),
    );

    let email = activities;
    worker.register_activity(
        activity_names::SEND_ABANDONED_CART_EMAIL,
        activity_handler(move |address: String| {
            let activities = email.clone();
            async move {
                activities
                    .send_abandoned_cart_email(address)
                    .await
                    .map_err(anyhow::Error::from)
            }
        }),
    );

    worker.register_workflow(CartWorkflow::WORKFLOW_TYPE, CartWorkflow::factory());
}

/// Connect, register and serve until interrupted
///
/// `interrupt` is invoked once registration is complete and its channel is
/// handed to the worker's serve loop. The client is closed before returning,
/// whether the serve loop ended cleanly or not.
pub async fn run_worker<C, I>(
    connector: &C,
    config: &WorkerConfig,
    policy: &ExponentialBackoff,
    interrupt: I,
) -> Result<()>
where
    C: Connector,
    I: FnOnce() -> watch::Receiver<bool>,
{
    let address = config.temporal_address();
    info!(address = %address, "Connecting to Temporal");

    let client = match connect_with_backoff(connector, &address, policy).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, error_chain = ?error_chain(&e), "Unable to create Temporal client");
            return Err(e);
        }
    };
    info!(address = %address, "Connected to Temporal");

    let task_queue = config.task_queue();
    let mut worker = client.new_worker(task_queue);
    register_cart_handlers(&mut worker, Arc::new(config.activities()));
    info!(task_queue = %task_queue, "Registered cart workflow and activities");

    let result = worker.run(interrupt()).await.map_err(WorkerError::WorkerStart);
    if let Err(e) = &result {
        error!(error = %e, error_chain = ?error_chain(e), "Unable to start worker");
    }

    client.close().await;
    result
}

/// Messages of an error and each of its causes, outermost first
fn error_chain(err: &WorkerError) -> Vec<String> {
    std::iter::successors(Some(err as &dyn std::error::Error), |e| e.source())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_lists_each_cause_once() {
        let err = WorkerError::WorkerStart(
            anyhow::anyhow!("namespace not found").context("Failed to initialize Temporal core"),
        );
        assert_eq!(
            error_chain(&err),
            vec![
                "unable to start worker",
                "Failed to initialize Temporal core",
                "namespace not found",
            ]
        );
    }
}
