// Audited user management service
// The surface the presentation layer calls; every operation is instrumented

pub mod users;

pub use users::UserService;

use crate::audit::SinkError;
use crate::config::ConfigError;
use crate::directory::DirectoryError;

/// Errors surfaced to callers of [`UserService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Local validation failure; never retried
    Validation(DirectoryError),
    /// Durable audit delivery failed; the operation did not take effect
    SinkFault(SinkError),
}

impl ServiceError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Validation(_))
    }

    pub fn is_sink_fault(&self) -> bool {
        matches!(self, ServiceError::SinkFault(_))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Validation(e) => write!(f, "{}", e),
            ServiceError::SinkFault(e) => write!(f, "Audit trail unavailable: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Validation(e) => Some(e),
            ServiceError::SinkFault(e) => Some(e),
        }
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(e: DirectoryError) -> Self {
        ServiceError::Validation(e)
    }
}

impl From<SinkError> for ServiceError {
    fn from(e: SinkError) -> Self {
        ServiceError::SinkFault(e)
    }
}

/// Errors raised while assembling the service
#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    Sink(SinkError),
    Directory(DirectoryError),
    Metrics(prometheus::Error),
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "{}", e),
            StartupError::Sink(e) => write!(f, "{}", e),
            StartupError::Directory(e) => write!(f, "Failed to seed directory: {}", e),
            StartupError::Metrics(e) => write!(f, "Failed to register metrics: {}", e),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

impl From<SinkError> for StartupError {
    fn from(e: SinkError) -> Self {
        StartupError::Sink(e)
    }
}

impl From<DirectoryError> for StartupError {
    fn from(e: DirectoryError) -> Self {
        StartupError::Directory(e)
    }
}

impl From<prometheus::Error> for StartupError {
    fn from(e: prometheus::Error) -> Self {
        StartupError::Metrics(e)
    }
}
