// Error types for the worker bootstrap

use thiserror::Error;

/// Result type alias for bootstrap operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Fatal errors that end the worker process
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Could not reach the orchestration engine before backoff gave up
    #[error("unable to create Temporal client for {address} after {attempts} attempts")]
    Connect {
        address: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The worker failed to start serving its task queue
    #[error("unable to start worker")]
    WorkerStart(#[source] anyhow::Error),
}
