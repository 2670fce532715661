// Worker configuration
// Decision: Read once from the environment at startup; accessors apply defaults
// Decision: Empty variables count as unset, matching how shells export blank values
// Decision: Credentials are opaque strings handed to the activities, never inspected here

use cart_core::Activities;

use crate::types::TASK_QUEUE;

pub const ENV_HOST: &str = "TEMPORAL_HOST";
pub const ENV_PORT: &str = "TEMPORAL_PORT";
pub const ENV_NAMESPACE: &str = "TEMPORAL_NAMESPACE";
pub const ENV_STRIPE_KEY: &str = "STRIPE_PRIVATE_KEY";
pub const ENV_MAILGUN_DOMAIN: &str = "MAILGUN_DOMAIN";
pub const ENV_MAILGUN_KEY: &str = "MAILGUN_PRIVATE_KEY";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "7233";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Configuration for the cart worker
#[derive(Clone, Default)]
pub struct WorkerConfig {
    /// Temporal server host
    pub temporal_host: Option<String>,
    /// Temporal server port
    pub temporal_port: Option<String>,
    /// Temporal namespace
    pub temporal_namespace: Option<String>,
    /// Stripe secret key
    pub stripe_key: String,
    /// Mailgun sending domain
    pub mailgun_domain: String,
    /// Mailgun API key
    pub mailgun_key: String,
}

impl WorkerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            temporal_host: non_empty(ENV_HOST),
            temporal_port: non_empty(ENV_PORT),
            temporal_namespace: non_empty(ENV_NAMESPACE),
            stripe_key: lookup(ENV_STRIPE_KEY).unwrap_or_default(),
            mailgun_domain: lookup(ENV_MAILGUN_DOMAIN).unwrap_or_default(),
            mailgun_key: lookup(ENV_MAILGUN_KEY).unwrap_or_default(),
        }
    }

    /// Get Temporal host with default
    pub fn temporal_host(&self) -> &str {
        self.temporal_host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Get Temporal port with default
    pub fn temporal_port(&self) -> &str {
        self.temporal_port.as_deref().unwrap_or(DEFAULT_PORT)
    }

    /// Get Temporal address (`host:port`)
    pub fn temporal_address(&self) -> String {
        format!("{}:{}", self.temporal_host(), self.temporal_port())
    }

    /// Get Temporal namespace with default
    pub fn temporal_namespace(&self) -> String {
        self.temporal_namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    /// Task queue the worker serves
    pub fn task_queue(&self) -> &'static str {
        TASK_QUEUE
    }

    /// Build the activity set with this configuration's credentials
    pub fn activities(&self) -> Activities {
        Activities::new(
            self.stripe_key.clone(),
            self.mailgun_domain.clone(),
            self.mailgun_key.clone(),
        )
    }
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("temporal_host", &self.temporal_host)
            .field("temporal_port", &self.temporal_port)
            .field("temporal_namespace", &self.temporal_namespace)
            .field("stripe_key", &"<redacted>")
            .field("mailgun_domain", &self.mailgun_domain)
            .field("mailgun_key", &"<redacted>")
            .finish()
    }
}
