// Workflow registry for dynamic workflow creation
// Decision: Factory functions allow runtime workflow creation from JSON input
// Decision: WorkflowInput::factory() supplies the factory for typed workflows

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::traits::Workflow;

/// Factory function for creating workflow instances from JSON input.
pub type WorkflowFactory =
    Box<dyn Fn(serde_json::Value) -> Result<Box<dyn Workflow>> + Send + Sync>;

/// Registry that maps workflow type names to their factory functions.
///
/// # Example
///
/// ```ignore
/// let mut registry = WorkflowRegistry::new();
/// registry.register(CartWorkflow::WORKFLOW_TYPE, CartWorkflow::factory());
///
/// let workflow = registry.create("CartWorkflow", input_json)?;
/// ```
#[derive(Default)]
pub struct WorkflowRegistry {
    factories: HashMap<&'static str, WorkflowFactory>,
}

impl WorkflowRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow factory for a workflow type
    pub fn register(&mut self, workflow_type: &'static str, factory: WorkflowFactory) {
        self.factories.insert(workflow_type, factory);
    }

    /// Create a workflow instance from JSON input
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The workflow type is not registered
    /// - The input JSON cannot be parsed for this workflow type
    pub fn create(
        &self,
        workflow_type: &str,
        input: serde_json::Value,
    ) -> Result<Box<dyn Workflow>> {
        let factory = self.factories.get(workflow_type).ok_or_else(|| {
            anyhow!(
                "Unknown workflow type: '{}'. Registered types: {:?}",
                workflow_type,
                self.types()
            )
        })?;

        factory(input)
    }

    /// Get all registered workflow types
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.types())
            .finish()
    }
}
