// Audit sinks
// Where a dispatched audit event finally lands

use super::types::AuditEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Trait for audit sink backends
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Accept one audit event
    async fn emit(&self, event: &AuditEvent) -> Result<(), SinkError>;
}

/// Audit delivery faults
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Sink could not accept the event
    Unavailable(String),
    /// Durable write exceeded its deadline (milliseconds)
    Timeout(u64),
    Serialization(String),
    /// Delivery path has been shut down
    Closed,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Unavailable(msg) => write!(f, "Audit sink unavailable: {}", msg),
            SinkError::Timeout(ms) => write!(f, "Audit sink write timed out after {}ms", ms),
            SinkError::Serialization(msg) => write!(f, "Audit serialization error: {}", msg),
            SinkError::Closed => write!(f, "Audit delivery closed"),
        }
    }
}

impl std::error::Error for SinkError {}

/// In-memory audit sink.
/// Suitable for development and testing
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every event accepted so far, in arrival order
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn emit(&self, event: &AuditEvent) -> Result<(), SinkError> {
        let mut events = self.events.write().await;
        debug!("Storing audit event: {}", event.event_type());
        events.push(event.clone());
        Ok(())
    }
}

/// File-system audit sink.
///
/// Appends one JSON line per event to `audit-<YYYY-MM-DD>.log` and syncs the
/// file before acknowledging the write.
pub struct FileAuditSink {
    directory: PathBuf,
    // Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl FileAuditSink {
    /// Open a sink rooted at `directory`, creating it when `auto_create` is set
    pub async fn open(directory: impl Into<PathBuf>, auto_create: bool) -> Result<Self, SinkError> {
        let directory = directory.into();

        match fs::metadata(&directory).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(SinkError::Unavailable(format!(
                    "'{}' is not a directory",
                    directory.display()
                )));
            }
            Err(_) if auto_create => {
                fs::create_dir_all(&directory).await.map_err(|e| {
                    SinkError::Unavailable(format!(
                        "failed to create '{}': {}",
                        directory.display(),
                        e
                    ))
                })?;
                info!("Created audit log directory {}", directory.display());
            }
            Err(e) => {
                return Err(SinkError::Unavailable(format!(
                    "'{}': {}",
                    directory.display(),
                    e
                )));
            }
        }

        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Log file receiving events stamped at `timestamp`
    pub fn file_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.directory
            .join(format!("audit-{}.log", timestamp.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn emit(&self, event: &AuditEvent) -> Result<(), SinkError> {
        let mut line =
            serde_json::to_string(event).map_err(|e| SinkError::Serialization(e.to_string()))?;
        line.push('\n');

        let path = self.file_for(event.timestamp());
        let unavailable =
            |e: std::io::Error| SinkError::Unavailable(format!("'{}': {}", path.display(), e));

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(unavailable)?;
        file.write_all(line.as_bytes()).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)?;
        file.sync_data().await.map_err(unavailable)?;

        debug!("Wrote audit event {} to {}", event.event_id(), path.display());
        Ok(())
    }
}
