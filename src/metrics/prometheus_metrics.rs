use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Audit trail and directory metrics.
///
/// Each service owns its own registry so independent instances never share counters.
pub struct AuditMetrics {
    pub registry: Registry,

    // Audit delivery
    pub audit_events_total: IntCounterVec,
    pub audit_sink_failures_total: IntCounterVec,
    pub audit_events_dropped_total: IntCounter,

    // Live state
    pub audit_contexts_active: IntGauge,
    pub directory_records: IntGauge,
}

impl AuditMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let audit_events_total = IntCounterVec::new(
            Opts::new("audit_events_total", "Total number of audit events dispatched"),
            &["action", "result"],
        )?;

        let audit_sink_failures_total = IntCounterVec::new(
            Opts::new(
                "audit_sink_failures_total",
                "Total number of audit events the sink failed to accept",
            ),
            &["strategy"],
        )?;

        let audit_events_dropped_total = IntCounter::new(
            "audit_events_dropped_total",
            "Audit events dropped because the streaming queue was full or closed",
        )?;

        let audit_contexts_active = IntGauge::new(
            "audit_contexts_active",
            "Audited operations currently in flight",
        )?;

        let directory_records = IntGauge::new(
            "directory_records",
            "Number of identity records in the directory",
        )?;

        registry.register(Box::new(audit_events_total.clone()))?;
        registry.register(Box::new(audit_sink_failures_total.clone()))?;
        registry.register(Box::new(audit_events_dropped_total.clone()))?;
        registry.register(Box::new(audit_contexts_active.clone()))?;
        registry.register(Box::new(directory_records.clone()))?;

        Ok(Self {
            registry,
            audit_events_total,
            audit_sink_failures_total,
            audit_events_dropped_total,
            audit_contexts_active,
            directory_records,
        })
    }

    pub fn record_event(&self, action: &str, result: &str) {
        self.audit_events_total
            .with_label_values(&[action, result])
            .inc();
    }

    pub fn record_sink_failure(&self, strategy: &str) {
        self.audit_sink_failures_total
            .with_label_values(&[strategy])
            .inc();
    }

    pub fn sink_failures(&self, strategy: &str) -> u64 {
        self.audit_sink_failures_total
            .with_label_values(&[strategy])
            .get()
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
