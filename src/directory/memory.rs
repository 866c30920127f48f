// In-memory directory backend
// Records and the username index share one RwLock so every check-then-write is atomic

use super::{Directory, DirectoryError};
use crate::models::User;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Records {
    by_id: HashMap<String, User>,
    /// username -> id
    by_username: HashMap<String, String>,
}

impl Records {
    fn insert(&mut self, user: User) -> Result<User, DirectoryError> {
        if self.by_id.contains_key(&user.id) {
            return Err(DirectoryError::AlreadyExists(user.id));
        }
        if self.by_username.contains_key(&user.username) {
            return Err(DirectoryError::UsernameTaken(user.username));
        }

        self.by_username
            .insert(user.username.clone(), user.id.clone());
        self.by_id.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn remove(&mut self, id: &str) -> Option<User> {
        let user = self.by_id.remove(id)?;
        self.by_username.remove(&user.username);
        Some(user)
    }
}

/// In-memory identity directory.
/// Lives for the lifetime of the process.
pub struct MemoryDirectory {
    records: RwLock<Records>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Records::default()),
        }
    }

    /// Build a directory pre-populated with `users`
    pub fn with_users(users: Vec<User>) -> Result<Self, DirectoryError> {
        let mut records = Records::default();
        for user in users {
            records.insert(user)?;
        }
        debug!("Seeded directory with {} record(s)", records.by_id.len());

        Ok(Self {
            records: RwLock::new(records),
        })
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn insert(&self, user: User) -> Result<User, DirectoryError> {
        let mut records = self.records.write().await;
        let stored = records.insert(user)?;
        debug!("Inserted user {}", stored.id);
        Ok(stored)
    }

    async fn remove(&self, id: &str) -> Result<User, DirectoryError> {
        let mut records = self.records.write().await;
        let removed = records
            .remove(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        debug!("Removed user {}", id);
        Ok(removed)
    }

    async fn get(&self, id: &str) -> Result<User, DirectoryError> {
        let records = self.records.read().await;
        records
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }

    async fn list(&self) -> HashMap<String, User> {
        let records = self.records.read().await;
        records.by_id.clone()
    }

    async fn authenticate(&self, username: &str, secret: &str) -> Option<User> {
        let records = self.records.read().await;
        let id = records.by_username.get(username)?;
        records
            .by_id
            .get(id)
            .filter(|u| u.credential_secret == secret)
            .cloned()
    }

    async fn find_by_username(&self, username: &str) -> Option<User> {
        let records = self.records.read().await;
        let id = records.by_username.get(username)?;
        records.by_id.get(id).cloned()
    }

    async fn retract(&self, user: &User) -> bool {
        let mut records = self.records.write().await;
        if records.by_id.get(&user.id) != Some(user) {
            return false;
        }
        records.remove(&user.id).is_some()
    }

    async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }
}
