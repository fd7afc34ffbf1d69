// Alert dispatch toward the external sink
//
// Fire-and-forget from the pipeline's perspective: alerts go into a bounded
// in-memory queue drained by one background task. Delivery is retried with
// exponential backoff; when the queue is full the oldest entry is dropped
// with a logged warning. Dispatch never blocks or fails an ingestion call.

use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::Alert;
use crate::errors::EngineError;

/// External sink contract. Implementations must be time-bounded; a hung
/// sink only ever stalls the dispatch task, never ingestion.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

struct DispatchState {
    queue: Mutex<VecDeque<Alert>>,
    wakeup: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// Handle for enqueueing alerts; owns the background delivery task.
pub struct AlertDispatcher {
    state: Arc<DispatchState>,
    config: DispatchConfig,
    worker: Option<JoinHandle<()>>,
}

impl AlertDispatcher {
    /// Spawn the delivery task on the current tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, config: DispatchConfig) -> Self {
        let state = Arc::new(DispatchState {
            queue: Mutex::new(VecDeque::with_capacity(config.queue_capacity)),
            wakeup: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        });

        let worker_state = Arc::clone(&state);
        let worker = tokio::spawn(async move {
            run_worker(worker_state, notifier, config).await;
        });

        Self {
            state,
            config,
            worker: Some(worker),
        }
    }

    /// Enqueue an alert for delivery. Never blocks: a full queue sheds its
    /// oldest entry with a warning.
    pub fn dispatch(&self, alert: Alert) {
        {
            let mut queue = self.state.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.len() >= self.config.queue_capacity {
                if let Some(dropped) = queue.pop_front() {
                    self.state.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        key = %dropped.key,
                        "Alert queue full, dropping oldest entry"
                    );
                }
            }
            queue.push_back(alert);
        }
        self.state.wakeup.notify_one();
    }

    /// Alerts shed because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.state.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting work and drain the queue before returning.
    pub async fn shutdown(mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.wakeup.notify_one();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "Alert dispatch task terminated abnormally");
            }
        }
    }
}

async fn run_worker(
    state: Arc<DispatchState>,
    notifier: Arc<dyn Notifier>,
    config: DispatchConfig,
) {
    loop {
        let next = {
            let mut queue = state.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.pop_front()
        };

        match next {
            Some(alert) => deliver(&*notifier, &alert, &config).await,
            None => {
                if state.closed.load(Ordering::SeqCst) {
                    break;
                }
                state.wakeup.notified().await;
            }
        }
    }
}

/// Attempt delivery with exponential backoff and jitter. After the final
/// retry the alert is dropped with a warning; the engine never fails over a
/// sink outage.
async fn deliver(notifier: &dyn Notifier, alert: &Alert, config: &DispatchConfig) {
    let mut backoff = config.initial_backoff;
    for attempt in 0..=config.max_retries {
        match notifier.notify(alert).await {
            Ok(()) => {
                tracing::debug!(key = %alert.key, "Alert delivered");
                return;
            }
            Err(err) if attempt < config.max_retries => {
                tracing::warn!(
                    key = %alert.key,
                    attempt = attempt + 1,
                    error = %err,
                    "Alert delivery failed, retrying"
                );
                let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 4);
                tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
                backoff *= 2;
            }
            Err(err) => {
                tracing::warn!(
                    key = %alert.key,
                    error = %err,
                    "Alert delivery failed after retries, dropping"
                );
            }
        }
    }
}

/// POSTs alerts as JSON to a webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), EngineError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(alert)
            .send()
            .await
            .map_err(|e| EngineError::NotifierUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::NotifierUnavailable(format!(
                "sink returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
