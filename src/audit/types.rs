// Audit event types and structures

use super::context::AuditContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Instrumented directory actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Add,
    Remove,
    View,
    ViewAll,
    Login,
    Logout,
}

impl AuditAction {
    /// Get a string representation of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Add => "ADD",
            AuditAction::Remove => "REMOVE",
            AuditAction::View => "VIEW",
            AuditAction::ViewAll => "VIEW_ALL",
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
        }
    }

    /// Event type recorded alongside the action
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditAction::Add => "USER_ADD",
            AuditAction::Remove => "USER_REMOVE",
            AuditAction::View => "USER_VIEW",
            AuditAction::ViewAll => "USER_VIEW_ALL",
            AuditAction::Login => "USER_LOGIN",
            AuditAction::Logout => "USER_LOGOUT",
        }
    }
}

/// Outcome of an instrumented action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Success,
    Failure,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Success => "SUCCESS",
            AuditResult::Failure => "FAILURE",
        }
    }
}

/// Immutable record of one instrumented action.
///
/// Context fields are copied from the [`AuditContext`] at build time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    event_id: String,
    timestamp: DateTime<Utc>,
    event_type: String,
    action: AuditAction,
    resource: String,
    result: AuditResult,
    message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    details: BTreeMap<String, Value>,
    acting_user_id: String,
    application_name: String,
    component_name: String,
    correlation_id: String,
}

impl AuditEvent {
    /// Start building an event for `action` under `context`
    pub fn builder(context: &AuditContext, action: AuditAction) -> AuditEventBuilder {
        AuditEventBuilder {
            action,
            acting_user_id: context.acting_user_id().to_string(),
            application_name: context.application_name().to_string(),
            component_name: context.component_name().to_string(),
            correlation_id: context.correlation_id().to_string(),
            resource: None,
            result: None,
            message: None,
            details: BTreeMap::new(),
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn result(&self) -> AuditResult {
        self.result
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &BTreeMap<String, Value> {
        &self.details
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

/// Builder for creating audit events
pub struct AuditEventBuilder {
    action: AuditAction,
    acting_user_id: String,
    application_name: String,
    component_name: String,
    correlation_id: String,
    resource: Option<String>,
    result: Option<AuditResult>,
    message: Option<String>,
    details: BTreeMap<String, Value>,
}

impl AuditEventBuilder {
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn success(mut self, message: impl Into<String>) -> Self {
        self.result = Some(AuditResult::Success);
        self.message = Some(message.into());
        self
    }

    pub fn failure(mut self, reason: impl Into<String>) -> Self {
        self.result = Some(AuditResult::Failure);
        self.message = Some(reason.into());
        self
    }

    /// Override the attribution recorded in the context
    pub fn acting_user(mut self, acting_user_id: impl Into<String>) -> Self {
        self.acting_user_id = acting_user_id.into();
        self
    }

    /// Attach a scalar detail
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> AuditEvent {
        AuditEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: self.action.event_type().to_string(),
            action: self.action,
            resource: self.resource.unwrap_or_else(|| "user".to_string()),
            result: self.result.unwrap_or(AuditResult::Success),
            message: self.message.unwrap_or_default(),
            details: self.details,
            acting_user_id: self.acting_user_id,
            application_name: self.application_name,
            component_name: self.component_name,
            correlation_id: self.correlation_id,
        }
    }
}
