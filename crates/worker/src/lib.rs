pub mod activity_registry;
pub mod backoff;
pub mod bootstrap;
pub mod cart_workflow;
pub mod client;
pub mod config;
pub mod error;
pub mod signal;
pub mod traits;
pub mod types;
pub mod worker;
pub mod workflow_registry;

// Re-export main types
pub use activity_registry::{activity_handler, ActivityHandler, ActivityRegistry};
pub use backoff::{ExponentialBackoff, Exhausted};
pub use bootstrap::{
    connect_with_backoff, register_cart_handlers, run_worker, Connector, OrchestrationClient,
    TaskWorker,
};
pub use cart_workflow::{CartPhase, CartWorkflow};
pub use client::{TemporalClient, TemporalConnector};
pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use signal::{interrupt_channel, wait_for_shutdown};
pub use traits::{Workflow, WorkflowInput};
pub use types::{WorkflowAction, TASK_QUEUE};
pub use worker::TemporalWorker;
pub use workflow_registry::{WorkflowFactory, WorkflowRegistry};
