// Audit logger implementation

use super::context::{AuditContext, AuditScope};
use super::delivery::{AuditDelivery, DurableDelivery, StreamingDelivery};
use super::storage::{AuditSink, FileAuditSink, SinkError};
use super::types::{AuditAction, AuditEvent};
use crate::metrics::AuditMetrics;
use crate::models::{AppConfig, DeliveryMode};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_APPLICATION_NAME: &str = "EHRViewer";
pub const DEFAULT_COMPONENT_NAME: &str = "UserService";

/// Audit logger for recording directory access and authentication events
pub struct AuditLogger {
    delivery: AuditDelivery,
    metrics: Arc<AuditMetrics>,
    application_name: String,
    component_name: String,
}

impl AuditLogger {
    /// Create a new audit logger with the specified delivery strategy
    pub fn new(
        delivery: AuditDelivery,
        metrics: Arc<AuditMetrics>,
        application_name: impl Into<String>,
        component_name: impl Into<String>,
    ) -> Self {
        Self {
            delivery,
            metrics,
            application_name: application_name.into(),
            component_name: component_name.into(),
        }
    }

    /// Durable-synchronous logger writing to `sink`
    pub fn durable(
        sink: Arc<dyn AuditSink>,
        write_timeout: Duration,
    ) -> Result<Self, prometheus::Error> {
        let metrics = Arc::new(AuditMetrics::new()?);
        let delivery =
            AuditDelivery::Durable(DurableDelivery::new(sink, write_timeout, metrics.clone()));
        Ok(Self::new(
            delivery,
            metrics,
            DEFAULT_APPLICATION_NAME,
            DEFAULT_COMPONENT_NAME,
        ))
    }

    /// Streaming-asynchronous logger draining into `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn streaming(
        sink: Arc<dyn AuditSink>,
        queue_capacity: usize,
    ) -> Result<Self, prometheus::Error> {
        let metrics = Arc::new(AuditMetrics::new()?);
        let delivery = AuditDelivery::Streaming(StreamingDelivery::spawn(
            sink,
            queue_capacity,
            metrics.clone(),
        ));
        Ok(Self::new(
            delivery,
            metrics,
            DEFAULT_APPLICATION_NAME,
            DEFAULT_COMPONENT_NAME,
        ))
    }

    /// Build the logger described by `config`, backed by the file-system sink
    pub async fn from_config(
        config: &AppConfig,
        metrics: Arc<AuditMetrics>,
    ) -> Result<Self, SinkError> {
        let settings = &config.audit;
        let sink: Arc<dyn AuditSink> = Arc::new(
            FileAuditSink::open(&settings.log_directory, settings.auto_create_directory).await?,
        );

        let delivery = match settings.delivery {
            DeliveryMode::Durable => AuditDelivery::Durable(DurableDelivery::new(
                sink,
                Duration::from_millis(settings.write_timeout_ms),
                metrics.clone(),
            )),
            DeliveryMode::Streaming => AuditDelivery::Streaming(StreamingDelivery::spawn(
                sink,
                settings.queue_capacity,
                metrics.clone(),
            )),
        };

        info!(
            "Audit logger writing to {} ({} delivery)",
            settings.log_directory,
            settings.delivery.as_str()
        );

        Ok(Self::new(
            delivery,
            metrics,
            config.application_name.clone(),
            config.component_name.clone(),
        ))
    }

    /// Establish a fresh context for one audited call
    pub fn begin(&self, acting_user_id: &str, action: AuditAction) -> AuditScope {
        let context = AuditContext::new(
            acting_user_id,
            self.application_name.as_str(),
            self.component_name.as_str(),
        );
        AuditScope::open(context, action, self.metrics.audit_contexts_active.clone())
    }

    /// Log an audit event through the active delivery strategy
    pub async fn log(&self, event: AuditEvent) -> Result<(), SinkError> {
        info!(
            correlation_id = %event.correlation_id(),
            "Audit: {} {} by {} - {}",
            event.action().as_str(),
            event.resource(),
            event.acting_user_id(),
            event.result().as_str()
        );
        self.metrics
            .record_event(event.action().as_str(), event.result().as_str());

        self.delivery.deliver(event).await
    }

    pub fn mode(&self) -> DeliveryMode {
        self.delivery.mode()
    }

    pub fn metrics(&self) -> &Arc<AuditMetrics> {
        &self.metrics
    }

    /// Audited calls currently holding a context
    pub fn active_contexts(&self) -> i64 {
        self.metrics.audit_contexts_active.get()
    }

    /// Flush pending events and stop background delivery
    pub async fn shutdown(&self) {
        self.delivery.shutdown().await;
    }
}
