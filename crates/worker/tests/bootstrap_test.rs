// Bootstrap tests against an in-memory engine
// Run with: cargo test -p cart-worker --test bootstrap_test

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cart_worker::{
    run_worker, wait_for_shutdown, ActivityHandler, Connector, ExponentialBackoff,
    OrchestrationClient, TaskWorker, WorkerConfig, WorkerError, WorkflowFactory, TASK_QUEUE,
};
use tokio::sync::watch;

type Log = Arc<Mutex<Vec<String>>>;
type Invocations = Arc<AtomicU32>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

struct FakeConnector {
    log: Log,
    invocations: Invocations,
    failures_left: AtomicU32,
    start_error: Option<&'static str>,
}

impl FakeConnector {
    fn new(log: Log) -> Self {
        Self {
            log,
            invocations: Invocations::default(),
            failures_left: AtomicU32::new(0),
            start_error: None,
        }
    }

    fn failing(self, times: u32) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    fn failing_start(mut self, message: &'static str) -> Self {
        self.start_error = Some(message);
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Client = FakeClient;

    async fn connect(&self, address: &str) -> anyhow::Result<FakeClient> {
        record(&self.log, format!("connect {address}"));

        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("connection refused");
        }

        Ok(FakeClient {
            log: self.log.clone(),
            invocations: self.invocations.clone(),
            start_error: self.start_error,
        })
    }
}

struct FakeClient {
    log: Log,
    invocations: Invocations,
    start_error: Option<&'static str>,
}

#[async_trait]
impl OrchestrationClient for FakeClient {
    type Worker = FakeWorker;

    fn new_worker(&self, task_queue: &str) -> FakeWorker {
        record(&self.log, format!("new_worker {task_queue}"));
        FakeWorker {
            log: self.log.clone(),
            invocations: self.invocations.clone(),
            start_error: self.start_error,
            activities: Vec::new(),
        }
    }

    async fn close(self) {
        record(&self.log, "close");
    }
}

struct FakeWorker {
    log: Log,
    invocations: Invocations,
    start_error: Option<&'static str>,
    activities: Vec<ActivityHandler>,
}

#[async_trait]
impl TaskWorker for FakeWorker {
    fn register_workflow(&mut self, workflow_type: &'static str, _factory: WorkflowFactory) {
        record(&self.log, format!("register_workflow {workflow_type}"));
    }

    fn register_activity(&mut self, activity_type: &'static str, handler: ActivityHandler) {
        record(&self.log, format!("register_activity {activity_type}"));
        let invocations = self.invocations.clone();
        let counted: ActivityHandler = Arc::new(move |input| {
            invocations.fetch_add(1, Ordering::SeqCst);
            handler(input)
        });
        self.activities.push(counted);
    }

    async fn run(self, mut interrupt: watch::Receiver<bool>) -> anyhow::Result<()> {
        record(&self.log, "run");
        if let Some(message) = self.start_error {
            anyhow::bail!(message);
        }
        wait_for_shutdown(&mut interrupt).await;
        record(&self.log, "stopped");
        Ok(())
    }
}

fn fired_interrupt() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    rx
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_bootstrap_order() {
    let log: Log = Arc::default();
    let connector = FakeConnector::new(log.clone());

    run_worker(
        &connector,
        &WorkerConfig::default(),
        &ExponentialBackoff::default(),
        fired_interrupt,
    )
    .await
    .unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "connect 127.0.0.1:7233".to_string(),
            format!("new_worker {TASK_QUEUE}"),
            "register_activity CreateStripeCharge".to_string(),
            "register_activity SendAbandonedCartEmail".to_string(),
            "register_workflow CartWorkflow".to_string(),
            "run".to_string(),
            "stopped".to_string(),
            "close".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_address_from_config() {
    let log: Log = Arc::default();
    let connector = FakeConnector::new(log.clone());
    let config = WorkerConfig {
        temporal_host: Some("temporal.internal".to_string()),
        temporal_port: Some("7000".to_string()),
        ..Default::default()
    };

    run_worker(
        &connector,
        &config,
        &ExponentialBackoff::default(),
        fired_interrupt,
    )
    .await
    .unwrap();

    assert_eq!(entries(&log)[0], "connect temporal.internal:7000");
}

#[tokio::test(start_paused = true)]
async fn test_transient_connect_failures_are_retried() {
    let log: Log = Arc::default();
    let connector = FakeConnector::new(log.clone()).failing(2);

    run_worker(
        &connector,
        &WorkerConfig::default(),
        &ExponentialBackoff::default(),
        fired_interrupt,
    )
    .await
    .unwrap();

    let log = entries(&log);
    let connects = log.iter().filter(|e| e.starts_with("connect ")).count();
    assert_eq!(connects, 3);
    assert!(log.contains(&"run".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_backoff() {
    let log: Log = Arc::default();
    let connector = FakeConnector::new(log.clone()).failing(u32::MAX);
    let policy = ExponentialBackoff::default()
        .with_initial_interval(Duration::from_millis(100))
        .with_multiplier(2.0)
        .with_jitter(0.0)
        .with_max_elapsed_time(Some(Duration::from_secs(1)));

    let err = run_worker(&connector, &WorkerConfig::default(), &policy, fired_interrupt)
        .await
        .unwrap_err();

    match err {
        WorkerError::Connect {
            address, attempts, ..
        } => {
            assert_eq!(address, "127.0.0.1:7233");
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected error: {other}"),
    }

    let log = entries(&log);
    assert!(log.iter().all(|e| e.starts_with("connect ")));
}

#[tokio::test]
async fn test_interrupt_while_idle_stops_cleanly() {
    let log: Log = Arc::default();
    let connector = FakeConnector::new(log.clone());
    let invocations = connector.invocations.clone();
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let config = WorkerConfig::default();
        let policy = ExponentialBackoff::default();
        let result = run_worker(&connector, &config, &policy, move || rx).await;
        result
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());
    assert!(!entries(&log).contains(&"close".to_string()));

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker should stop after interrupt")
        .unwrap()
        .unwrap();

    let log = entries(&log);
    assert_eq!(log[log.len() - 2..], ["stopped".to_string(), "close".to_string()]);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_worker_start_failure_closes_client() {
    let log: Log = Arc::default();
    let connector = FakeConnector::new(log.clone()).failing_start("namespace not found");

    let err = run_worker(
        &connector,
        &WorkerConfig::default(),
        &ExponentialBackoff::default(),
        fired_interrupt,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WorkerError::WorkerStart(_)));
    let source = std::error::Error::source(&err).map(ToString::to_string);
    assert_eq!(source.as_deref(), Some("namespace not found"));

    let log = entries(&log);
    assert!(!log.contains(&"stopped".to_string()));
    assert_eq!(log.last().map(String::as_str), Some("close"));
}
