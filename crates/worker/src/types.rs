// Workflow command and naming definitions
//
// Workflows never talk to Temporal directly: they return WorkflowAction values
// which the worker turns into core commands. All payloads are JSON.

use std::time::Duration;

/// Task queue the cart worker polls
pub const TASK_QUEUE: &str = "CART_TASK_QUEUE";

/// Constants for workflow names
pub mod workflow_names {
    pub const CART_WORKFLOW: &str = "CartWorkflow";
}

/// Result from processing a workflow activation
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    /// Schedule an activity on the worker's task queue
    ScheduleActivity {
        activity_id: String,
        activity_type: String,
        input: serde_json::Value,
        start_to_close_timeout: Duration,
    },
    /// Start a durable timer
    StartTimer { timer_id: String, fire_after: Duration },
    /// Complete the workflow successfully
    CompleteWorkflow { result: Option<serde_json::Value> },
}
