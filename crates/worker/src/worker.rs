// Temporal worker implementation
// Decision: Use the temporal-sdk-core's Core trait for polling and completion
// Decision: Core is initialised inside run() so a startup failure surfaces as a run() error
// Decision: A poller that exits before the interrupt ends run() with an error
//
// This worker:
// 1. Polls for workflow tasks and drives workflow state machines
// 2. Polls for activity tasks and executes registered activities
// 3. Stops both pollers and shuts the core down when interrupted

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use temporal_sdk_core::protos::coresdk::{
    activity_result::{self, ActivityResult},
    activity_task::{activity_task, ActivityTask},
    common::{Payload, UserCodeFailure},
    workflow_activation::{wf_activation_job, WfActivation},
    workflow_commands::{
        workflow_command, CompleteWorkflowExecution, ScheduleActivity, StartTimer,
        WorkflowCommand,
    },
    workflow_completion::{self, WfActivationCompletion},
    ActivityTaskCompletion,
};
use temporal_sdk_core::{
    Core, CoreInitOptions, PollActivityError, PollWfError, ServerGatewayOptions,
};
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::activity_registry::{ActivityHandler, ActivityRegistry};
use crate::bootstrap::TaskWorker;
use crate::signal::wait_for_shutdown;
use crate::traits::Workflow;
use crate::types::WorkflowAction;
use crate::workflow_registry::{WorkflowFactory, WorkflowRegistry};

/// Maximum workflow tasks held by the core at once
const MAX_OUTSTANDING_WORKFLOW_TASKS: usize = 100;
/// Maximum activity tasks held by the core at once
const MAX_OUTSTANDING_ACTIVITIES: usize = 100;
/// Pause after a failed poll before polling again
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Workflow instances cached per run id
type WorkflowCache = Arc<Mutex<HashMap<String, Box<dyn Workflow>>>>;

/// Temporal worker that processes workflow and activity tasks
pub struct TemporalWorker {
    /// Task queue this worker polls
    task_queue: String,
    /// Gateway options for the core; an invalid address is reported by run()
    gateway_opts: Result<ServerGatewayOptions>,
    /// Registered workflow types
    workflows: WorkflowRegistry,
    /// Registered activity types
    activities: ActivityRegistry,
}

impl TemporalWorker {
    pub fn new(task_queue: &str, gateway_opts: Result<ServerGatewayOptions>) -> Self {
        Self {
            task_queue: task_queue.to_string(),
            gateway_opts,
            workflows: WorkflowRegistry::new(),
            activities: ActivityRegistry::new(),
        }
    }
}

#[async_trait]
impl TaskWorker for TemporalWorker {
    fn register_workflow(&mut self, workflow_type: &'static str, factory: WorkflowFactory) {
        debug!(workflow_type = %workflow_type, "Registering workflow");
        self.workflows.register(workflow_type, factory);
    }

    fn register_activity(&mut self, activity_type: &'static str, handler: ActivityHandler) {
        debug!(activity_type = %activity_type, "Registering activity");
        self.activities.register(activity_type, handler);
    }

    /// Run the worker, processing tasks until interrupted
    async fn run(self, mut interrupt: watch::Receiver<bool>) -> Result<()> {
        let gateway_opts = self.gateway_opts?;

        if self.workflows.is_empty() && self.activities.is_empty() {
            return Err(anyhow!(
                "No workflows or activities registered for task queue '{}'",
                self.task_queue
            ));
        }

        info!(
            task_queue = %self.task_queue,
            workflows = ?self.workflows.types(),
            activities = ?self.activities.types(),
            "Starting Temporal worker"
        );

        let init_opts = CoreInitOptions {
            gateway_opts,
            evict_after_pending_cleared: true,
            max_outstanding_workflow_tasks: MAX_OUTSTANDING_WORKFLOW_TASKS,
            max_outstanding_activities: MAX_OUTSTANDING_ACTIVITIES,
        };

        let core: Arc<dyn Core> = Arc::new(
            temporal_sdk_core::init(init_opts)
                .await
                .context("Failed to initialize Temporal core")?,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut workflow_handle = spawn_workflow_poller(
            core.clone(),
            Arc::new(self.workflows),
            self.task_queue.clone(),
            shutdown_rx.clone(),
        );
        let mut activity_handle =
            spawn_activity_poller(core.clone(), Arc::new(self.activities), shutdown_rx);

        info!(task_queue = %self.task_queue, "Temporal worker started, polling for tasks...");

        let outcome =
            supervise_pollers(&mut interrupt, &mut workflow_handle, &mut activity_handle).await;

        let _ = shutdown_tx.send(true);
        workflow_handle.abort();
        activity_handle.abort();

        core.shutdown().await;

        info!("Temporal worker stopped");
        outcome
    }
}

/// Wait for the interrupt while both pollers are alive
///
/// Returns `Ok` once interrupted, or an error as soon as either poller ends on its own.
async fn supervise_pollers(
    interrupt: &mut watch::Receiver<bool>,
    workflow_handle: &mut JoinHandle<()>,
    activity_handle: &mut JoinHandle<()>,
) -> Result<()> {
    tokio::select! {
        _ = wait_for_shutdown(interrupt) => {
            info!("Shutdown signal received, stopping pollers");
            Ok(())
        }
        exit = workflow_handle => Err(poller_exited("Workflow", exit)),
        exit = activity_handle => Err(poller_exited("Activity", exit)),
    }
}

fn poller_exited(poller: &str, exit: std::result::Result<(), JoinError>) -> anyhow::Error {
    let err = match exit {
        Err(e) if e.is_panic() => anyhow!("{} poller panicked", poller),
        Err(e) => anyhow!("{} poller was cancelled: {}", poller, e),
        Ok(()) => anyhow!("{} poller stopped unexpectedly", poller),
    };
    error!(error = %err, "Poller exited before shutdown");
    err
}

/// Spawn workflow task polling loop
fn spawn_workflow_poller(
    core: Arc<dyn Core>,
    registry: Arc<WorkflowRegistry>,
    task_queue: String,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let workflows: WorkflowCache = Arc::new(Mutex::new(HashMap::new()));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Workflow poller shutting down");
                    break;
                }
                result = poll_and_process_workflow_task(core.as_ref(), &registry, &task_queue, workflows.clone()) => {
                    if let Err(e) = result {
                        match e.downcast_ref::<PollWfError>() {
                            Some(PollWfError::ShutDown) => {
                                info!("Workflow poller received shutdown");
                                break;
                            }
                            _ => {
                                error!(error = %e, "Workflow task processing error");
                                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Spawn activity task polling loop
fn spawn_activity_poller(
    core: Arc<dyn Core>,
    registry: Arc<ActivityRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Activity poller shutting down");
                    break;
                }
                result = poll_and_process_activity_task(core.as_ref(), &registry) => {
                    if let Err(e) = result {
                        match e.downcast_ref::<PollActivityError>() {
                            Some(PollActivityError::ShutDown) => {
                                info!("Activity poller received shutdown");
                                break;
                            }
                            _ => {
                                error!(error = %e, "Activity task processing error");
                                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Poll and process a single workflow task
async fn poll_and_process_workflow_task(
    core: &dyn Core,
    registry: &WorkflowRegistry,
    task_queue: &str,
    workflows: WorkflowCache,
) -> Result<()> {
    let task = core.poll_workflow_task().await?;

    debug!(
        run_id = %task.run_id,
        jobs = task.jobs.len(),
        "Received workflow task"
    );

    if let Some(completion) = handle_activation(task, registry, task_queue, workflows).await {
        core.complete_workflow_task(completion).await?;
    }

    Ok(())
}

/// Turn one activation into its completion
///
/// Eviction-only activations are answered with no completion. A run is
/// dropped from the cache when evicted or once its workflow has completed.
async fn handle_activation(
    task: WfActivation,
    registry: &WorkflowRegistry,
    task_queue: &str,
    workflows: WorkflowCache,
) -> Option<WfActivationCompletion> {
    let evict = task.jobs.iter().any(|j| {
        matches!(
            j.variant,
            Some(wf_activation_job::Variant::RemoveFromCache(_))
        )
    });

    if evict && task.jobs.len() == 1 {
        debug!(run_id = %task.run_id, "Handling eviction-only task");
        workflows.lock().await.remove(&task.run_id);
        return None;
    }

    let commands = process_workflow_activation(&task, registry, task_queue, workflows.clone()).await;

    let completion = match commands {
        Ok(commands) => {
            let variants: Vec<workflow_command::Variant> =
                commands.into_iter().filter_map(|cmd| cmd.variant).collect();
            WfActivationCompletion::ok_from_cmds(variants, task.task_token)
        }
        Err(e) => {
            error!(run_id = %task.run_id, error = %e, "Workflow activation failed");
            WfActivationCompletion {
                task_token: task.task_token,
                status: Some(
                    workflow_completion::wf_activation_completion::Status::Failed(
                        workflow_completion::Failure {
                            failure: Some(UserCodeFailure {
                                message: format!("{:#}", e),
                                ..Default::default()
                            }),
                        },
                    ),
                ),
            }
        }
    };

    let mut workflows_guard = workflows.lock().await;
    let finished = workflows_guard
        .get(&task.run_id)
        .is_some_and(|workflow| workflow.is_completed());
    if evict || finished {
        debug!(run_id = %task.run_id, finished, "Dropping workflow from cache");
        workflows_guard.remove(&task.run_id);
    }

    Some(completion)
}

/// Decode the first payload as JSON; absent or empty payloads decode to `default`
fn decode_payload(payloads: &[Payload], default: serde_json::Value) -> Result<serde_json::Value> {
    match payloads.first() {
        Some(payload) if !payload.data.is_empty() => {
            serde_json::from_slice(&payload.data).context("Failed to parse payload as JSON")
        }
        _ => Ok(default),
    }
}

/// Process workflow activation and return commands
async fn process_workflow_activation(
    task: &WfActivation,
    registry: &WorkflowRegistry,
    task_queue: &str,
    workflows: WorkflowCache,
) -> Result<Vec<WorkflowCommand>> {
    let mut workflows_guard = workflows.lock().await;
    let mut actions = vec![];

    for job in &task.jobs {
        match &job.variant {
            Some(wf_activation_job::Variant::StartWorkflow(start)) => {
                info!(
                    workflow_id = %start.workflow_id,
                    workflow_type = %start.workflow_type,
                    "Starting workflow"
                );

                let input = decode_payload(&start.arguments, serde_json::json!({}))
                    .context("Failed to parse workflow input")?;

                let mut workflow = registry
                    .create(&start.workflow_type, input)
                    .context("Failed to create workflow")?;

                actions.extend(workflow.on_start());
                workflows_guard.insert(task.run_id.clone(), workflow);
            }

            Some(wf_activation_job::Variant::SignalWorkflow(signal)) => {
                let workflow = workflows_guard.get_mut(&task.run_id).ok_or_else(|| {
                    anyhow!("Workflow {} not found in cache for signal", task.run_id)
                })?;

                debug!(
                    run_id = %task.run_id,
                    signal = %signal.signal_name,
                    "Delivering signal"
                );

                match decode_payload(&signal.input, serde_json::Value::Null) {
                    Ok(payload) => actions.extend(workflow.on_signal(&signal.signal_name, payload)),
                    Err(e) => warn!(
                        signal = %signal.signal_name,
                        error = %e,
                        "Dropping signal with undecodable payload"
                    ),
                }
            }

            Some(wf_activation_job::Variant::FireTimer(fired)) => {
                let workflow = workflows_guard.get_mut(&task.run_id).ok_or_else(|| {
                    anyhow!("Workflow {} not found in cache for timer", task.run_id)
                })?;

                debug!(run_id = %task.run_id, timer_id = %fired.timer_id, "Timer fired");
                actions.extend(workflow.on_timer_fired(&fired.timer_id));
            }

            Some(wf_activation_job::Variant::ResolveActivity(resolve)) => {
                let workflow = workflows_guard.get_mut(&task.run_id).ok_or_else(|| {
                    anyhow!(
                        "Workflow {} not found in cache for activity {}",
                        task.run_id,
                        resolve.activity_id
                    )
                })?;

                let resolved = match &resolve.result {
                    Some(ActivityResult {
                        status: Some(activity_result::activity_result::Status::Completed(success)),
                    }) => {
                        let result = success
                            .result
                            .as_ref()
                            .and_then(|p| serde_json::from_slice(&p.data).ok())
                            .unwrap_or_default();
                        debug!(activity_id = %resolve.activity_id, "Activity completed");
                        workflow.on_activity_completed(&resolve.activity_id, result)
                    }
                    Some(ActivityResult {
                        status: Some(activity_result::activity_result::Status::Failed(failure)),
                    }) => {
                        let error = failure
                            .failure
                            .as_ref()
                            .map(|f| f.message.clone())
                            .unwrap_or_else(|| "Unknown error".to_string());
                        warn!(
                            activity_id = %resolve.activity_id,
                            error = %error,
                            "Activity failed"
                        );
                        workflow.on_activity_failed(&resolve.activity_id, &error)
                    }
                    Some(ActivityResult {
                        status: Some(activity_result::activity_result::Status::Canceled(_)),
                    }) => workflow.on_activity_failed(&resolve.activity_id, "Activity canceled"),
                    _ => {
                        warn!(
                            activity_id = %resolve.activity_id,
                            "Unexpected activity result status"
                        );
                        vec![]
                    }
                };

                actions.extend(resolved);
            }

            Some(wf_activation_job::Variant::RemoveFromCache(_)) => {
                debug!(run_id = %task.run_id, "RemoveFromCache job received (deferring removal)");
            }

            other => {
                warn!(job = ?other, "Unhandled workflow activation job");
            }
        }
    }

    Ok(actions
        .into_iter()
        .map(|action| action_to_command(action, task_queue))
        .collect())
}

fn json_payload(value: &serde_json::Value) -> Payload {
    Payload {
        data: serde_json::to_vec(value).unwrap_or_default(),
        metadata: Default::default(),
    }
}

/// Convert WorkflowAction to Temporal command
fn action_to_command(action: WorkflowAction, task_queue: &str) -> WorkflowCommand {
    let variant = match action {
        WorkflowAction::ScheduleActivity {
            activity_id,
            activity_type,
            input,
            start_to_close_timeout,
        } => workflow_command::Variant::ScheduleActivity(ScheduleActivity {
            activity_id,
            activity_type,
            task_queue: task_queue.to_string(),
            arguments: vec![json_payload(&input)],
            start_to_close_timeout: Some(start_to_close_timeout.into()),
            ..Default::default()
        }),
        WorkflowAction::StartTimer {
            timer_id,
            fire_after,
        } => workflow_command::Variant::StartTimer(StartTimer {
            timer_id,
            start_to_fire_timeout: Some(fire_after.into()),
        }),
        WorkflowAction::CompleteWorkflow { result } => {
            workflow_command::Variant::CompleteWorkflowExecution(CompleteWorkflowExecution {
                result: result.as_ref().map(json_payload),
            })
        }
    };

    WorkflowCommand {
        variant: Some(variant),
    }
}

/// Poll and process a single activity task
async fn poll_and_process_activity_task(core: &dyn Core, registry: &ActivityRegistry) -> Result<()> {
    let task = core.poll_activity_task().await?;

    if task.task_token.is_empty() {
        warn!("Received activity task with empty task token, skipping");
        return Ok(());
    }

    let result = process_activity(&task, registry).await;

    let completion = ActivityTaskCompletion {
        task_token: task.task_token,
        result: Some(result),
    };

    core.complete_activity_task(completion).await?;

    Ok(())
}

fn failed_result(message: String) -> ActivityResult {
    ActivityResult {
        status: Some(activity_result::activity_result::Status::Failed(
            activity_result::Failure {
                failure: Some(UserCodeFailure {
                    message,
                    ..Default::default()
                }),
            },
        )),
    }
}

/// Process an activity task and return the result
async fn process_activity(task: &ActivityTask, registry: &ActivityRegistry) -> ActivityResult {
    match &task.variant {
        Some(activity_task::Variant::Start(start)) => {
            info!(
                activity_type = %start.activity_type,
                workflow_type = %start.workflow_type,
                "Executing activity"
            );

            let input = match decode_payload(&start.input, serde_json::Value::Null) {
                Ok(input) => input,
                Err(e) => return failed_result(format!("{:#}", e)),
            };

            match registry.execute(&start.activity_type, input).await {
                Ok(output) => ActivityResult::ok(json_payload(&output)),
                Err(e) => {
                    let error_chain: Vec<String> = e.chain().map(|err| err.to_string()).collect();
                    error!(
                        error = %e,
                        error_chain = ?error_chain,
                        activity_type = %start.activity_type,
                        workflow_type = %start.workflow_type,
                        "Activity failed"
                    );
                    failed_result(format!("{:#}", e))
                }
            }
        }
        Some(activity_task::Variant::Cancel(_)) => {
            warn!("Activity cancellation requested");
            ActivityResult {
                status: Some(activity_result::activity_result::Status::Canceled(
                    activity_result::Cancelation { details: None },
                )),
            }
        }
        None => {
            error!("Activity task has no variant");
            failed_result("Activity task has no variant".to_string())
        }
    }
}
