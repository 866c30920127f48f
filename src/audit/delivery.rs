// Audit delivery strategies
// Durable: the write completes (or fails the call) before returning.
// Streaming: events go through a bounded queue to a background worker; sink failures stay local.

use super::storage::{AuditSink, SinkError};
use super::types::AuditEvent;
use crate::metrics::AuditMetrics;
use crate::models::DeliveryMode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Delivery policy chosen once per deployment
pub enum AuditDelivery {
    Durable(DurableDelivery),
    Streaming(StreamingDelivery),
}

impl AuditDelivery {
    pub fn mode(&self) -> DeliveryMode {
        match self {
            AuditDelivery::Durable(_) => DeliveryMode::Durable,
            AuditDelivery::Streaming(_) => DeliveryMode::Streaming,
        }
    }

    /// Hand an event to the active strategy.
    ///
    /// Only the durable strategy ever returns an error.
    pub async fn deliver(&self, event: AuditEvent) -> Result<(), SinkError> {
        match self {
            AuditDelivery::Durable(durable) => durable.deliver(&event).await,
            AuditDelivery::Streaming(streaming) => {
                streaming.enqueue(event);
                Ok(())
            }
        }
    }

    /// Flush and stop background delivery. No-op for the durable strategy.
    pub async fn shutdown(&self) {
        if let AuditDelivery::Streaming(streaming) = self {
            streaming.shutdown().await;
        }
    }
}

/// Synchronous write-ahead delivery with a bounded write time
pub struct DurableDelivery {
    sink: Arc<dyn AuditSink>,
    write_timeout: Duration,
    metrics: Arc<AuditMetrics>,
}

impl DurableDelivery {
    pub fn new(
        sink: Arc<dyn AuditSink>,
        write_timeout: Duration,
        metrics: Arc<AuditMetrics>,
    ) -> Self {
        Self {
            sink,
            write_timeout,
            metrics,
        }
    }

    async fn deliver(&self, event: &AuditEvent) -> Result<(), SinkError> {
        let outcome = match timeout(self.write_timeout, self.sink.emit(event)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(self.write_timeout.as_millis() as u64)),
        };

        if let Err(ref e) = outcome {
            self.metrics.record_sink_failure(DeliveryMode::Durable.as_str());
            error!(
                event_id = %event.event_id(),
                correlation_id = %event.correlation_id(),
                "Durable audit write failed: {}",
                e
            );
        }

        outcome
    }
}

/// Fire-and-forget delivery through a bounded queue
pub struct StreamingDelivery {
    sender: Mutex<Option<mpsc::Sender<AuditEvent>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<AuditMetrics>,
}

impl StreamingDelivery {
    /// Start the background worker draining into `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize, metrics: Arc<AuditMetrics>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(receiver, sink, metrics.clone()));
        info!("Streaming audit delivery started (queue capacity {})", capacity);

        Self {
            sender: Mutex::new(Some(sender)),
            worker: tokio::sync::Mutex::new(Some(worker)),
            metrics,
        }
    }

    /// Queue an event without waiting; drops it when the queue is full or closed
    fn enqueue(&self, event: AuditEvent) {
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Audit queue lock poisoned: {}", e);
                None
            }
        };

        let Some(sender) = sender else {
            self.metrics.audit_events_dropped_total.inc();
            warn!(
                event_id = %event.event_id(),
                "Audit delivery closed, dropping {} event",
                event.event_type()
            );
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.metrics.audit_events_dropped_total.inc();
                warn!(
                    event_id = %event.event_id(),
                    correlation_id = %event.correlation_id(),
                    "Audit queue full, dropping {} event",
                    event.event_type()
                );
            }
            Err(TrySendError::Closed(event)) => {
                self.metrics.audit_events_dropped_total.inc();
                error!(
                    event_id = %event.event_id(),
                    "Audit worker stopped, dropping {} event",
                    event.event_type()
                );
            }
        }
    }

    /// Close the queue and wait for queued events to drain
    pub async fn shutdown(&self) {
        match self.sender.lock() {
            Ok(mut guard) => {
                guard.take();
            }
            Err(e) => error!("Audit queue lock poisoned: {}", e),
        }

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Audit worker terminated abnormally: {}", e);
            }
            info!("Streaming audit delivery stopped");
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<AuditEvent>,
    sink: Arc<dyn AuditSink>,
    metrics: Arc<AuditMetrics>,
) {
    while let Some(event) = receiver.recv().await {
        match sink.emit(&event).await {
            Ok(()) => debug!(event_id = %event.event_id(), "Audit event delivered"),
            Err(e) => {
                metrics.record_sink_failure(DeliveryMode::Streaming.as_str());
                error!(
                    event_id = %event.event_id(),
                    correlation_id = %event.correlation_id(),
                    "Failed to store audit event: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::context::AuditContext;
    use crate::audit::storage::MemoryAuditSink;
    use crate::audit::types::AuditAction;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn emit(&self, _event: &AuditEvent) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("disk full".to_string()))
        }
    }

    struct SlowSink;

    #[async_trait]
    impl AuditSink for SlowSink {
        async fn emit(&self, _event: &AuditEvent) -> Result<(), SinkError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    /// Holds every write until a permit is released
    struct GatedSink {
        gate: Semaphore,
        inner: MemoryAuditSink,
    }

    #[async_trait]
    impl AuditSink for GatedSink {
        async fn emit(&self, event: &AuditEvent) -> Result<(), SinkError> {
            let permit = self.gate.acquire().await.map_err(|_| SinkError::Closed)?;
            permit.forget();
            self.inner.emit(event).await
        }
    }

    fn event() -> AuditEvent {
        let ctx = AuditContext::new("admin", "EHRViewer", "UserService");
        AuditEvent::builder(&ctx, AuditAction::Add)
            .resource("user/P-1")
            .success("Added user: John Doe")
            .build()
    }

    fn metrics() -> Arc<AuditMetrics> {
        Arc::new(AuditMetrics::new().unwrap())
    }

    #[tokio::test]
    async fn test_durable_writes_before_returning() {
        let sink = Arc::new(MemoryAuditSink::new());
        let delivery = AuditDelivery::Durable(DurableDelivery::new(
            sink.clone(),
            Duration::from_secs(1),
            metrics(),
        ));

        delivery.deliver(event()).await.unwrap();
        assert_eq!(sink.len().await, 1);
        assert_eq!(delivery.mode(), DeliveryMode::Durable);
    }

    #[tokio::test]
    async fn test_durable_propagates_sink_failure() {
        let metrics = metrics();
        let delivery = AuditDelivery::Durable(DurableDelivery::new(
            Arc::new(FailingSink),
            Duration::from_secs(1),
            metrics.clone(),
        ));

        let result = delivery.deliver(event()).await;
        assert_eq!(
            result,
            Err(SinkError::Unavailable("disk full".to_string()))
        );
        assert_eq!(metrics.sink_failures("durable"), 1);
    }

    #[tokio::test]
    async fn test_durable_times_out_slow_sink() {
        let delivery = AuditDelivery::Durable(DurableDelivery::new(
            Arc::new(SlowSink),
            Duration::from_millis(20),
            metrics(),
        ));

        let result = delivery.deliver(event()).await;
        assert_eq!(result, Err(SinkError::Timeout(20)));
    }

    #[tokio::test]
    async fn test_streaming_delivers_in_background() {
        let sink = Arc::new(MemoryAuditSink::new());
        let delivery =
            AuditDelivery::Streaming(StreamingDelivery::spawn(sink.clone(), 16, metrics()));

        for _ in 0..5 {
            delivery.deliver(event()).await.unwrap();
        }
        delivery.shutdown().await;

        assert_eq!(sink.len().await, 5);
        assert_eq!(delivery.mode(), DeliveryMode::Streaming);
    }

    #[tokio::test]
    async fn test_streaming_swallows_sink_failure() {
        let metrics = metrics();
        let delivery = AuditDelivery::Streaming(StreamingDelivery::spawn(
            Arc::new(FailingSink),
            16,
            metrics.clone(),
        ));

        assert!(delivery.deliver(event()).await.is_ok());
        assert!(delivery.deliver(event()).await.is_ok());
        delivery.shutdown().await;

        assert_eq!(metrics.sink_failures("streaming"), 2);
    }

    #[tokio::test]
    async fn test_streaming_drops_when_queue_full() {
        let metrics = metrics();
        let sink = Arc::new(GatedSink {
            gate: Semaphore::new(0),
            inner: MemoryAuditSink::new(),
        });
        let delivery = AuditDelivery::Streaming(StreamingDelivery::spawn(
            sink.clone(),
            1,
            metrics.clone(),
        ));

        for _ in 0..10 {
            delivery.deliver(event()).await.unwrap();
        }

        let dropped = metrics.audit_events_dropped_total.get();
        assert!(dropped >= 8, "expected most events dropped, got {}", dropped);

        sink.gate.add_permits(10);
        delivery.shutdown().await;

        assert_eq!(sink.inner.len().await as u64 + dropped, 10);
    }

    #[tokio::test]
    async fn test_streaming_after_shutdown_drops() {
        let metrics = metrics();
        let sink = Arc::new(MemoryAuditSink::new());
        let delivery =
            AuditDelivery::Streaming(StreamingDelivery::spawn(sink.clone(), 4, metrics.clone()));

        delivery.shutdown().await;
        assert!(delivery.deliver(event()).await.is_ok());

        assert_eq!(metrics.audit_events_dropped_total.get(), 1);
        assert!(sink.is_empty().await);
    }
}
