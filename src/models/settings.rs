use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name stamped on every audit event
    #[serde(default = "default_application_name")]
    pub application_name: String,
    /// Component name stamped on every audit event
    #[serde(default = "default_component_name")]
    pub component_name: String,
    #[serde(default)]
    pub audit: AuditSettings,
    #[serde(default)]
    pub directory: DirectorySettings,
}

/// How audit events reach their sink.
///
/// Selected once per deployment; never mixed within a process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Written before the call returns; sink failures fail the call
    Durable,
    /// Queued for a background worker; sink failures are only logged
    Streaming,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Durable => "durable",
            DeliveryMode::Streaming => "streaming",
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    #[serde(default = "default_delivery")]
    pub delivery: DeliveryMode,
    /// Directory holding the daily audit log files
    #[serde(default = "default_log_directory")]
    pub log_directory: String,
    #[serde(default = "default_true")]
    pub auto_create_directory: bool,
    /// Upper bound on a durable sink write (milliseconds)
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Bounded queue size for streaming delivery
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Identity directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Pre-populate the directory with the sample identities
    #[serde(default = "default_true")]
    pub seed_sample_users: bool,
}

fn default_application_name() -> String {
    "EHRViewer".to_string()
}

fn default_component_name() -> String {
    "UserService".to_string()
}

fn default_delivery() -> DeliveryMode {
    DeliveryMode::Durable
}

fn default_log_directory() -> String {
    "./ehr-audit-logs".to_string()
}

fn default_true() -> bool {
    true
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            component_name: default_component_name(),
            audit: AuditSettings::default(),
            directory: DirectorySettings::default(),
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            delivery: default_delivery(),
            log_directory: default_log_directory(),
            auto_create_directory: true,
            write_timeout_ms: default_write_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            seed_sample_users: true,
        }
    }
}

impl AppConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.trim().is_empty() {
            return Err("application_name must not be empty".to_string());
        }
        if self.component_name.trim().is_empty() {
            return Err("component_name must not be empty".to_string());
        }
        if self.audit.log_directory.trim().is_empty() {
            return Err("audit.log_directory must not be empty".to_string());
        }
        if self.audit.write_timeout_ms == 0 {
            return Err("audit.write_timeout_ms must be greater than zero".to_string());
        }
        if self.audit.queue_capacity == 0 {
            return Err("audit.queue_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}
