// Identity directory abstraction
// Concurrent registry of identity records keyed by their unique identifier

pub mod memory;

pub use memory::MemoryDirectory;

use crate::models::User;
use async_trait::async_trait;
use std::collections::HashMap;

/// Storage contract for the identity directory.
///
/// Single-key operations are atomic with respect to each other; callers need
/// no external locking.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Insert a new record, failing if the id or username is already present
    async fn insert(&self, user: User) -> Result<User, DirectoryError>;

    /// Delete a record and return its prior value
    async fn remove(&self, id: &str) -> Result<User, DirectoryError>;

    /// Point lookup by id
    async fn get(&self, id: &str) -> Result<User, DirectoryError>;

    /// Point-in-time copy of every record, keyed by id
    async fn list(&self) -> HashMap<String, User>;

    /// Match username and secret exactly; `None` when nothing matches
    async fn authenticate(&self, username: &str, secret: &str) -> Option<User>;

    /// Lookup by username
    async fn find_by_username(&self, username: &str) -> Option<User>;

    /// Remove the record only if the stored value is identical to `user`.
    ///
    /// Returns whether anything was removed.
    async fn retract(&self, user: &User) -> bool;

    /// Number of live records
    async fn len(&self) -> usize;
}

/// Directory validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    AlreadyExists(String),
    NotFound(String),
    UsernameTaken(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::AlreadyExists(id) => write!(f, "User already exists: {}", id),
            DirectoryError::NotFound(id) => write!(f, "User not found: {}", id),
            DirectoryError::UsernameTaken(username) => {
                write!(f, "Username already taken: {}", username)
            }
        }
    }
}

impl std::error::Error for DirectoryError {}
