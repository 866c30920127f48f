// Audit trail for compliance tracking
// Every directory read, write and authentication produces exactly one audit event

pub mod context;
pub mod delivery;
pub mod logger;
pub mod storage;
pub mod types;

pub use context::{AuditContext, AuditScope};
pub use delivery::{AuditDelivery, DurableDelivery, StreamingDelivery};
pub use logger::AuditLogger;
pub use storage::{AuditSink, FileAuditSink, MemoryAuditSink, SinkError};
pub use types::{AuditAction, AuditEvent, AuditEventBuilder, AuditResult};
