pub mod settings;
pub mod user;

pub use settings::{AppConfig, AuditSettings, DeliveryMode, DirectorySettings};
pub use user::{User, UserType, resource_for, sample_users};
