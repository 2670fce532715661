// Activity registry for dispatching activity tasks by type
// Decision: Handlers take and return JSON so the poller stays independent of activity types
// Decision: activity_handler() adapts a typed async fn, mirroring WorkflowInput::factory()

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Future returned by an activity handler
pub type ActivityFuture = BoxFuture<'static, Result<serde_json::Value>>;

/// Handler executing one activity invocation from JSON input
pub type ActivityHandler = Arc<dyn Fn(serde_json::Value) -> ActivityFuture + Send + Sync>;

/// Wrap a typed async function as an [`ActivityHandler`]
///
/// The input is deserialized before the function runs; its output is
/// serialized back to JSON.
pub fn activity_handler<I, O, F, Fut>(f: F) -> ActivityHandler
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    Arc::new(move |value: serde_json::Value| {
        match serde_json::from_value::<I>(value) {
            Ok(input) => {
                let fut = f(input);
                async move {
                    let output = fut.await?;
                    serde_json::to_value(output).context("Failed to serialize activity output")
                }
                .boxed()
            }
            Err(e) => future::ready(Err(anyhow!("Failed to parse activity input: {}", e))).boxed(),
        }
    })
}

/// Registry that maps activity type names to their handlers.
#[derive(Default, Clone)]
pub struct ActivityRegistry {
    handlers: HashMap<&'static str, ActivityHandler>,
}

impl ActivityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an activity type
    pub fn register(&mut self, activity_type: &'static str, handler: ActivityHandler) {
        self.handlers.insert(activity_type, handler);
    }

    /// Execute an activity by type
    ///
    /// # Errors
    ///
    /// Returns an error if the activity type is not registered or the
    /// activity itself fails.
    pub async fn execute(
        &self,
        activity_type: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let handler = self.handlers.get(activity_type).cloned().ok_or_else(|| {
            anyhow!(
                "Unknown activity type: '{}'. Registered activities: {:?}. \
                This may indicate a workflow bug or version mismatch.",
                activity_type,
                self.types()
            )
        })?;

        handler(input)
            .await
            .with_context(|| format!("Activity '{}' failed", activity_type))
    }

    /// Get all registered activity types
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activity_types", &self.types())
            .finish()
    }
}
