//! Event notifier implementations and the per-flow dispatch queue.

use reasoning_engine_sdk::{async_trait, EngineEvent, EventNotifier, NotifierError};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl EventNotifier for TracingNotifier {
    async fn notify(&self, event: &EngineEvent) -> Result<(), NotifierError> {
        match event {
            EngineEvent::TaskFinished {
                task_id,
                status,
                error,
                duration_ms,
            } => info!(task_id = %task_id, %status, ?error, duration_ms, "Task finished"),
            other => info!(task_id = other.task_id(), event = ?other, "Task event"),
        }
        Ok(())
    }
}

/// Fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventNotifier for BroadcastNotifier {
    async fn notify(&self, event: &EngineEvent) -> Result<(), NotifierError> {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Discards every event
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl EventNotifier for NoopNotifier {
    async fn notify(&self, _event: &EngineEvent) -> Result<(), NotifierError> {
        Ok(())
    }
}

/// Non-blocking, order-preserving queue in front of a notifier.
///
/// `emit` never waits; a background task delivers events one at a time and
/// logs delivery failures.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    /// Spawn the delivery task. Must be called inside a Tokio runtime.
    pub fn spawn(notifier: Arc<dyn EventNotifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = notifier.notify(&event).await {
                    warn!(task_id = event.task_id(), error = %e, "Event notification failed");
                }
            }
        });

        Self { tx }
    }

    pub fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event dispatcher stopped; dropping notification");
        }
    }
}
