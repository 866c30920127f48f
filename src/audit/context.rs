// Per-call audit context
// Passed explicitly through each audited operation; never shared between calls

use super::types::{AuditAction, AuditEventBuilder, AuditEvent};
use prometheus::IntGauge;
use tracing::{Span, debug, info_span};
use uuid::Uuid;

/// Attribution for one logical operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    acting_user_id: String,
    application_name: String,
    component_name: String,
    correlation_id: String,
}

impl AuditContext {
    /// Create a context with a freshly generated correlation id
    pub fn new(
        acting_user_id: impl Into<String>,
        application_name: impl Into<String>,
        component_name: impl Into<String>,
    ) -> Self {
        Self {
            acting_user_id: acting_user_id.into(),
            application_name: application_name.into(),
            component_name: component_name.into(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn acting_user_id(&self) -> &str {
        &self.acting_user_id
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Scoped ownership of an [`AuditContext`].
///
/// Opening a scope establishes the context; dropping it releases the context on
/// every exit path, including early returns and unwinding.
pub struct AuditScope {
    context: AuditContext,
    action: AuditAction,
    span: Span,
    active: IntGauge,
}

impl AuditScope {
    pub(crate) fn open(context: AuditContext, action: AuditAction, active: IntGauge) -> Self {
        let span = info_span!(
            "audit",
            correlation_id = %context.correlation_id(),
            acting_user = %context.acting_user_id(),
            action = action.as_str(),
        );
        active.inc();
        debug!(parent: &span, "Audit context established");

        Self {
            context,
            action,
            span,
            active,
        }
    }

    pub fn context(&self) -> &AuditContext {
        &self.context
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    /// Tracing span covering the audited call
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Start an event for this scope's action
    pub fn event(&self) -> AuditEventBuilder {
        AuditEvent::builder(&self.context, self.action)
    }
}

impl Drop for AuditScope {
    fn drop(&mut self) {
        self.active.dec();
        debug!(parent: &self.span, "Audit context released");
    }
}
